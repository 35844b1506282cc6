use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use query_dispatcher::DataSource;
use viz_api::{Data, DataSeriesRequest, Filters, ResponseAssembler, VizError};

use crate::config::SourceConfig;
use crate::error::QueryError;

// ═══════════════════════════════════════════════════════════════
//  ReplaySource — answers queries from stored responses
// ═══════════════════════════════════════════════════════════════

/// Answers each configured query with the first series of a stored
/// response, re-interned into the response being assembled.
pub struct ReplaySource {
    name: String,
    fixtures: HashMap<String, Data>,
}

impl ReplaySource {
    /// Read and decode every fixture named by `config`.
    pub fn load(config: &SourceConfig) -> Result<Self, QueryError> {
        let mut fixtures = HashMap::new();
        for entry in &config.queries {
            if fixtures.contains_key(&entry.query) {
                return Err(QueryError::Config {
                    context: "fixture",
                    detail: format!(
                        "query '{}' configured twice in source '{}'",
                        entry.query, config.name
                    ),
                });
            }
            let path = entry.fixture.display();
            let json = std::fs::read_to_string(&entry.fixture).map_err(|e| QueryError::Config {
                context: "fixture",
                detail: format!("'{path}': {e}"),
            })?;
            let data = Data::from_json(&json).map_err(|e| QueryError::Config {
                context: "fixture",
                detail: format!("'{path}': {e}"),
            })?;
            tracing::info!(
                source = %config.name,
                query = %entry.query,
                fixture = %path,
                series = data.data_series.len(),
                "loaded fixture"
            );
            fixtures.insert(entry.query.clone(), data);
        }
        Ok(Self { name: config.name.clone(), fixtures })
    }

    fn replay(&self, assembler: &ResponseAssembler, req: &DataSeriesRequest) -> Result<(), VizError> {
        let data = self
            .fixtures
            .get(&req.query_name)
            .ok_or_else(|| VizError::source(format!("no fixture for query '{}'", req.query_name)))?;
        let series = data.data_series.first().ok_or_else(|| {
            VizError::source(format!("fixture for query '{}' has no series", req.query_name))
        })?;
        assembler.series_for(req).import(&series.root, &data.string_table);
        Ok(())
    }
}

impl DataSource for ReplaySource {
    fn supported_queries(&self) -> Vec<String> {
        self.fixtures.keys().cloned().collect()
    }

    fn handle<'a>(
        &'a self,
        ctx: CancellationToken,
        _global_filters: &'a Filters,
        assembler: &'a ResponseAssembler,
        requests: &'a [DataSeriesRequest],
    ) -> Pin<Box<dyn Future<Output = Result<(), VizError>> + Send + 'a>> {
        Box::pin(async move {
            for req in requests {
                if ctx.is_cancelled() {
                    return Err(VizError::source("cancelled"));
                }
                self.replay(assembler, req)?;
                tracing::debug!(source = %self.name, series = %req.series_name, "replayed series");
                tokio::task::yield_now().await;
            }
            Ok(())
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
