use std::sync::{Arc, Mutex, PoisonError};

use crate::builder::{render, DatumBuilder, NodeRef};
use crate::data::{Data, DataSeries, DataSeriesRequest};
use crate::error::{ResponseError, VizError};
use crate::string_table::StringTable;

// ═══════════════════════════════════════════════════════════════
//  ErrorSink
// ═══════════════════════════════════════════════════════════════

/// Append-only record of every failure during one response.
#[derive(Debug, Default)]
pub(crate) struct ErrorSink {
    errors: Mutex<Vec<VizError>>,
}

impl ErrorSink {
    pub(crate) fn push(&self, err: VizError) {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).push(err);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.errors.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }

    fn to_error(&self) -> Option<ResponseError> {
        let errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        if errors.is_empty() {
            None
        } else {
            Some(ResponseError::new(errors.clone()))
        }
    }
}

/// State every builder of one response shares.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) strings: StringTable,
    pub(crate) errors: ErrorSink,
}

// ═══════════════════════════════════════════════════════════════
//  ResponseAssembler
// ═══════════════════════════════════════════════════════════════

/// Owns the string table, error sink and series roots of one response.
///
/// `series` may be called concurrently from independent workers; each
/// returned builder owns a disjoint subtree.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    shared: Arc<Shared>,
    series: Mutex<Vec<(String, NodeRef)>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new series and return a builder for its root.
    pub fn series(&self, name: impl Into<String>) -> DatumBuilder {
        let root = NodeRef::default();
        self.series
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((name.into(), Arc::clone(&root)));
        DatumBuilder::new(root, Arc::clone(&self.shared))
    }

    /// Start the series answering `request`.
    pub fn series_for(&self, request: &DataSeriesRequest) -> DatumBuilder {
        self.series(request.series_name.clone())
    }

    /// Record a failure that did not come from a property update.
    pub fn record_error(&self, err: VizError) {
        self.shared.errors.push(err);
    }

    pub fn has_errors(&self) -> bool {
        !self.shared.errors.is_empty()
    }

    pub fn string_table(&self) -> &StringTable {
        &self.shared.strings
    }

    /// Snapshot of the forest so far, whatever errors were recorded.
    pub fn render(&self) -> Data {
        let roots: Vec<(String, NodeRef)> =
            self.series.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let data_series = roots
            .iter()
            .map(|(name, root)| DataSeries {
                series_name: name.clone(),
                root: render(root),
            })
            .collect();
        Data {
            string_table: self.shared.strings.snapshot(),
            data_series,
        }
    }

    /// The finished response, or every recorded error joined.
    pub fn finish(&self) -> Result<Data, ResponseError> {
        if let Some(err) = self.shared.errors.to_error() {
            tracing::debug!(errors = err.errors().len(), "response failed");
            return Err(err);
        }
        let data = self.render();
        tracing::debug!(
            series = data.data_series.len(),
            strings = data.string_table.len(),
            "response assembled"
        );
        Ok(data)
    }
}
