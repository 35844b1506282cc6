//! Routes the sub-queries of a [`DataRequest`] to the data sources that
//! answer them and assembles one response from all of them.

pub mod error;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use viz_api::{Data, DataRequest, DataSeriesRequest, Filters, ResponseAssembler, VizError};

pub use error::DispatchError;

// ═══════════════════════════════════════════════════════════════
//  DataSource
// ═══════════════════════════════════════════════════════════════

/// A backend able to answer a fixed set of named queries.
///
/// `handle` receives every sub-query of one request routed to this source
/// and may be called concurrently with other sources' `handle` on the same
/// assembler. Long-running handlers should watch `ctx` and return early once
/// it is cancelled.
pub trait DataSource: Send + Sync {
    /// Query names this source answers.
    fn supported_queries(&self) -> Vec<String>;

    fn handle<'a>(
        &'a self,
        ctx: CancellationToken,
        global_filters: &'a Filters,
        assembler: &'a ResponseAssembler,
        requests: &'a [DataSeriesRequest],
    ) -> Pin<Box<dyn Future<Output = Result<(), VizError>> + Send + 'a>>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

// ═══════════════════════════════════════════════════════════════
//  QueryDispatcher
// ═══════════════════════════════════════════════════════════════

type WorkerOutput = (String, Result<(), VizError>);

/// Source tasks of one dispatch. Never aborted: if the dispatch is dropped
/// before they settle they are cancelled through the token and detached.
struct Workers {
    set: JoinSet<WorkerOutput>,
    token: CancellationToken,
}

impl Drop for Workers {
    fn drop(&mut self) {
        if !self.set.is_empty() {
            tracing::debug!(pending = self.set.len(), "dispatch dropped, cancelling sources");
            self.token.cancel();
            self.set.detach_all();
        }
    }
}

/// Registry of data sources keyed by the query names they answer.
pub struct QueryDispatcher {
    sources: Vec<Arc<dyn DataSource>>,
    by_query: HashMap<String, usize>,
}

impl QueryDispatcher {
    /// Fails if two sources claim the same query name.
    pub fn new<I>(sources: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = Arc<dyn DataSource>>,
    {
        let sources: Vec<Arc<dyn DataSource>> = sources.into_iter().collect();
        let mut by_query = HashMap::new();
        for (idx, source) in sources.iter().enumerate() {
            for query in source.supported_queries() {
                if by_query.insert(query.clone(), idx).is_some() {
                    return Err(DispatchError::DuplicateQuery { query });
                }
            }
            tracing::debug!(source = source.name(), "data source registered");
        }
        Ok(Self { sources, by_query })
    }

    /// Every registered query name, sorted.
    pub fn supported_queries(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_query.keys().cloned().collect();
        names.sort();
        names
    }

    /// Answer `request`, all or nothing.
    ///
    /// Each implicated source runs in its own task under a child of `ctx`.
    /// The first failure cancels that child token; every task is still
    /// awaited before returning. Dropping the returned future cancels the
    /// token and leaves the tasks running until they observe it.
    pub async fn dispatch(
        &self,
        ctx: &CancellationToken,
        request: DataRequest,
    ) -> Result<Data, DispatchError> {
        let DataRequest { global_filters, series_requests } = request;

        let mut groups: BTreeMap<usize, Vec<DataSeriesRequest>> = BTreeMap::new();
        for req in series_requests {
            let idx = *self
                .by_query
                .get(&req.query_name)
                .ok_or_else(|| DispatchError::UnsupportedQuery(req.query_name.clone()))?;
            groups.entry(idx).or_default().push(req);
        }

        let assembler = Arc::new(ResponseAssembler::new());
        let filters = Arc::new(global_filters);
        let token = ctx.child_token();
        tracing::debug!(sources = groups.len(), "dispatching request");

        let mut workers = Workers { set: JoinSet::new(), token: token.clone() };
        for (idx, requests) in groups {
            let source = Arc::clone(&self.sources[idx]);
            let assembler = Arc::clone(&assembler);
            let filters = Arc::clone(&filters);
            let token = token.clone();
            workers.set.spawn(async move {
                let name = source.name().to_string();
                let result = source.handle(token, &filters, &assembler, &requests).await;
                (name, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.set.join_next().await {
            let err = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((source_name, Err(error))) => {
                    tracing::warn!(source = %source_name, error = %error, "data source failed");
                    DispatchError::Source { source_name, error }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "data source worker failed");
                    DispatchError::Worker(e.to_string())
                }
            };
            if first_error.is_none() {
                token.cancel();
                first_error = Some(err);
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        Ok(assembler.finish()?)
    }
}
