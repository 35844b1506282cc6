use viz_api::{ResponseError, VizError};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("more than one data source supports query '{query}'")]
    DuplicateQuery { query: String },

    #[error("no data source supports query '{0}'")]
    UnsupportedQuery(String),

    #[error("data source '{source_name}': {error}")]
    Source { source_name: String, error: VizError },

    #[error("data source worker failed: {0}")]
    Worker(String),

    #[error("{0}")]
    Response(#[from] ResponseError),
}
