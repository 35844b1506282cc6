use viz_api::VizError;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("read request: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode request: {0}")]
    Request(VizError),

    #[error("{0}")]
    Dispatch(#[from] query_dispatcher::DispatchError),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("encode response: {0}")]
    Output(VizError),
}
