use std::io::Read;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use query_dispatcher::QueryDispatcher;
use viz_api::DataRequest;

use crate::config::{QueryConfig, RunArgs};
use crate::error::QueryError;

pub async fn run(args: RunArgs) -> Result<(), QueryError> {
    let config = QueryConfig::load(&args.config)?;
    tracing::info!(config = %args.config, sources = config.sources.len(), "loaded config");
    let dispatcher = super::build_dispatcher(&config)?;

    let source = args.request.clone();
    let request = tokio::task::spawn_blocking(move || read_request(&source))
        .await
        .map_err(|e| QueryError::Io(std::io::Error::other(e)))??;

    let output = respond(&dispatcher, config.timeout_ms, &request, args.pretty).await?;
    println!("{output}");
    Ok(())
}

/// Request body from a file, or stdin for `-`.
fn read_request(source: &str) -> Result<String, QueryError> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

/// Decode `request`, dispatch it under a deadline and encode the response.
pub async fn respond(
    dispatcher: &QueryDispatcher,
    timeout_ms: u64,
    request: &str,
    pretty: bool,
) -> Result<String, QueryError> {
    let request = DataRequest::from_json(request).map_err(QueryError::Request)?;
    tracing::info!(series = request.series_requests.len(), "dispatching request");

    let token = CancellationToken::new();
    let dispatch = dispatcher.dispatch(&token, request);
    tokio::pin!(dispatch);
    let settled = tokio::select! {
        result = &mut dispatch => Some(result),
        _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => None,
    };
    let data = match settled {
        Some(result) => result?,
        None => {
            tracing::warn!(timeout_ms, "deadline elapsed, cancelling sources");
            token.cancel();
            // Let the sources observe the cancel and settle.
            if let Err(e) = dispatch.await {
                tracing::debug!(error = %e, "cancelled dispatch settled");
            }
            return Err(QueryError::Timeout(timeout_ms));
        }
    };

    let encoded = if pretty {
        serde_json::to_string_pretty(&data).map_err(|e| QueryError::Output(e.into()))?
    } else {
        data.to_json().map_err(QueryError::Output)?
    };
    tracing::info!(
        series = data.data_series.len(),
        strings = data.string_table.len(),
        "request answered"
    );
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use query_dispatcher::DataSource;
    use viz_api::{Data, DataSeriesRequest, Filters, PropertyUpdate, ResponseAssembler, VizError};

    use super::*;
    use crate::cmd::build_dispatcher;

    fn write_config(dir: &std::path::Path) -> QueryConfig {
        let asm = ResponseAssembler::new();
        asm.series("stored").with(PropertyUpdate::integers("ids", [1, 2, 3]));
        std::fs::write(dir.join("ids.json"), asm.finish().unwrap().to_json().unwrap()).unwrap();

        let path = dir.join("viz-query.toml");
        std::fs::write(
            &path,
            r#"
timeout_ms = 1000

[[sources]]
name = "ids"

[[sources.queries]]
query = "Ids"
fixture = "ids.json"
"#,
        )
        .unwrap();
        QueryConfig::load(path.to_str().unwrap()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn answers_request_from_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let dispatcher = build_dispatcher(&config).unwrap();

        let out = respond(
            &dispatcher,
            config.timeout_ms,
            r#"{"SeriesRequests": [{"QueryName": "Ids", "SeriesName": "a"}, {"QueryName": "Ids", "SeriesName": "b"}]}"#,
            false,
        )
        .await
        .unwrap();

        let data = Data::from_json(&out).unwrap();
        assert_eq!(data.string_table, ["ids"]);
        assert_eq!(data.data_series.len(), 2);
        for name in ["a", "b"] {
            assert_eq!(
                data.series(name).unwrap().root.properties[&0],
                viz_api::Value::Ints(vec![1, 2, 3])
            );
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path());
        let dispatcher = build_dispatcher(&config).unwrap();

        let err = respond(&dispatcher, 1000, "{\"GlobalFilters\": {\"x\": [42, 1]}}", false)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Request(_)), "{err}");

        let err = respond(
            &dispatcher,
            1000,
            r#"{"SeriesRequests": [{"QueryName": "Nope", "SeriesName": "a"}]}"#,
            true,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "no data source supports query 'Nope'");
    }

    #[derive(Default)]
    struct Stalled {
        saw_cancel: AtomicBool,
    }

    impl DataSource for Stalled {
        fn supported_queries(&self) -> Vec<String> {
            vec!["Stalled".into()]
        }

        fn handle<'a>(
            &'a self,
            ctx: CancellationToken,
            _global_filters: &'a Filters,
            _assembler: &'a ResponseAssembler,
            _requests: &'a [DataSeriesRequest],
        ) -> Pin<Box<dyn Future<Output = Result<(), VizError>> + Send + 'a>> {
            Box::pin(async move {
                ctx.cancelled().await;
                self.saw_cancel.store(true, Ordering::SeqCst);
                Err(VizError::source("cancelled"))
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn times_out_stalled_sources() {
        let stalled = Arc::new(Stalled::default());
        let dispatcher =
            QueryDispatcher::new([Arc::clone(&stalled) as Arc<dyn DataSource>]).unwrap();
        let err = respond(
            &dispatcher,
            20,
            r#"{"SeriesRequests": [{"QueryName": "Stalled", "SeriesName": "s"}]}"#,
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, QueryError::Timeout(20)), "{err}");
        // The timeout cancels cooperatively and waits for the source.
        assert!(stalled.saw_cancel.load(Ordering::SeqCst));
    }

    #[test]
    fn reads_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, "{}").unwrap();
        assert_eq!(read_request(path.to_str().unwrap()).unwrap(), "{}");
        let err = read_request(dir.path().join("missing.json").to_str().unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Io(_)), "{err}");
    }
}
