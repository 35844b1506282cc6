use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::QueryError;

#[derive(Parser)]
#[command(name = "viz-query", about = "Answer visualization data requests from configured sources")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dispatch one request and print the response as JSON
    Run(RunArgs),
    /// List the query names the configured sources answer
    Queries(QueriesArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "viz-query.toml", env = "VIZ_QUERY_CONFIG")]
    pub config: String,

    /// Request JSON file, or `-` for stdin
    #[arg(long, default_value = "-")]
    pub request: String,

    /// Indent the response JSON
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Args, Clone, Debug)]
pub struct QueriesArgs {
    /// Path to the TOML config file
    #[arg(long, default_value = "viz-query.toml", env = "VIZ_QUERY_CONFIG")]
    pub config: String,
}

// ---- TOML Config ----

#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    /// Deadline for one request, after which sources are cancelled.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default)]
    pub queries: Vec<FixtureConfig>,
}

/// One query answered by replaying a stored response.
#[derive(Debug, Deserialize)]
pub struct FixtureConfig {
    pub query: String,
    pub fixture: PathBuf,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl QueryConfig {
    /// Load `path`, resolving relative fixture paths against its directory.
    pub fn load(path: &str) -> Result<Self, QueryError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        let mut config: QueryConfig = toml::from_str(&content)
            .map_err(|e| QueryError::Config { context: "parse", detail: format!("'{path}': {e}") })?;
        let base = Path::new(path).parent().unwrap_or(Path::new(""));
        config.resolve_fixtures(base);
        Ok(config)
    }

    fn resolve_fixtures(&mut self, base: &Path) {
        for fixture in self.sources.iter_mut().flat_map(|s| s.queries.iter_mut()) {
            if fixture.fixture.is_relative() {
                fixture.fixture = base.join(&fixture.fixture);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sources_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viz-query.toml");
        std::fs::write(
            &path,
            r#"
[[sources]]
name = "scheduler"

[[sources.queries]]
query = "ThreadIntervals"
fixture = "fixtures/threads.json"

[[sources.queries]]
query = "CPUIntervals"
fixture = "/abs/cpus.json"
"#,
        )
        .unwrap();

        let config = QueryConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.sources.len(), 1);
        let queries = &config.sources[0].queries;
        assert_eq!(queries[0].query, "ThreadIntervals");
        assert_eq!(queries[0].fixture, dir.path().join("fixtures/threads.json"));
        assert_eq!(queries[1].fixture, PathBuf::from("/abs/cpus.json"));
    }

    #[test]
    fn reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timeout_ms = \"soon\"").unwrap();
        let err = QueryConfig::load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::Config { context: "parse", .. }), "{err}");
    }

    #[test]
    fn reports_missing_file() {
        let err = QueryConfig::load("/nonexistent/viz-query.toml").unwrap_err();
        assert!(matches!(err, QueryError::Config { context: "read", .. }), "{err}");
    }
}
