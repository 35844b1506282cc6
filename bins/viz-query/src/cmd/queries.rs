use crate::config::{QueriesArgs, QueryConfig};
use crate::error::QueryError;

pub fn run(args: QueriesArgs) -> Result<(), QueryError> {
    let config = QueryConfig::load(&args.config)?;
    let dispatcher = super::build_dispatcher(&config)?;
    for query in dispatcher.supported_queries() {
        println!("{query}");
    }
    Ok(())
}
