pub mod queries;
pub mod run;

use std::sync::Arc;

use query_dispatcher::{DataSource, QueryDispatcher};

use crate::config::QueryConfig;
use crate::error::QueryError;
use crate::replay::ReplaySource;

/// Load every configured source and register it.
pub fn build_dispatcher(config: &QueryConfig) -> Result<QueryDispatcher, QueryError> {
    let mut sources: Vec<Arc<dyn DataSource>> = Vec::with_capacity(config.sources.len());
    for source in &config.sources {
        sources.push(Arc::new(ReplaySource::load(source)?));
    }
    Ok(QueryDispatcher::new(sources)?)
}
