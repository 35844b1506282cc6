#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use query_dispatcher::DataSource;
use viz_api::{DataSeriesRequest, Filters, PropertyUpdate, ResponseAssembler, Value, VizError};

/// Configurable source: creates one series per sub-query, optionally
/// waiting on or signalling a gate, optionally failing.
#[derive(Default)]
pub struct TestSource {
    pub label: String,
    pub queries: Vec<String>,
    pub wait_for: Option<Arc<Notify>>,
    pub signal: Option<Arc<Notify>>,
    pub fail_with: Option<String>,
    pub decorate: bool,
    pub calls: AtomicUsize,
    pub requests_seen: AtomicUsize,
}

impl TestSource {
    pub fn new(label: &str, queries: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            queries: queries.iter().map(|q| q.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn waiting_for(mut self, gate: &Arc<Notify>) -> Self {
        self.wait_for = Some(Arc::clone(gate));
        self
    }

    pub fn signalling(mut self, gate: &Arc<Notify>) -> Self {
        self.signal = Some(Arc::clone(gate));
        self
    }

    pub fn failing(mut self, msg: &str) -> Self {
        self.fail_with = Some(msg.to_string());
        self
    }

    pub fn decorated(mut self) -> Self {
        self.decorate = true;
        self
    }
}

impl DataSource for TestSource {
    fn supported_queries(&self) -> Vec<String> {
        self.queries.clone()
    }

    fn handle<'a>(
        &'a self,
        _ctx: CancellationToken,
        global_filters: &'a Filters,
        assembler: &'a ResponseAssembler,
        requests: &'a [DataSeriesRequest],
    ) -> Pin<Box<dyn Future<Output = Result<(), VizError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests_seen.fetch_add(requests.len(), Ordering::SeqCst);
            if global_filters.get("collection_name") == Some(&Value::string("error")) {
                return Err(VizError::source(format!("{} refused collection", self.label)));
            }
            for req in requests {
                let root = assembler.series_for(req);
                if self.decorate {
                    root.apply([
                        PropertyUpdate::string("source", &self.label),
                        PropertyUpdate::string("query", &req.query_name),
                    ]);
                }
            }
            if let Some(gate) = &self.wait_for {
                gate.notified().await;
            }
            if let Some(gate) = &self.signal {
                gate.notify_one();
            }
            match &self.fail_with {
                Some(msg) => Err(VizError::source(msg.clone())),
                None => Ok(()),
            }
        })
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Source that blocks until its context is cancelled.
#[derive(Default)]
pub struct PatientSource {
    pub saw_cancel: AtomicBool,
}

impl DataSource for PatientSource {
    fn supported_queries(&self) -> Vec<String> {
        vec!["Patient".to_string()]
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
                assembler.series_for(req).with(PropertyUpdate::integer("partial", 1));
            }
            ctx.cancelled().await;
            self.saw_cancel.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

pub fn shared<S: DataSource + 'static>(source: S) -> Arc<S> {
    Arc::new(source)
}

pub fn as_dyn<S: DataSource + 'static>(source: &Arc<S>) -> Arc<dyn DataSource> {
    Arc::clone(source) as Arc<dyn DataSource>
}
