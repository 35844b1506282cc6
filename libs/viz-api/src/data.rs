use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::datum::Datum;
use crate::error::VizError;
use crate::value::Value;

/// Named option or filter values attached to a request.
pub type Filters = BTreeMap<String, Value>;

// ═══════════════════════════════════════════════════════════════
//  Requests
// ═══════════════════════════════════════════════════════════════

/// One named sub-query. Opaque to the core beyond its query name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSeriesRequest {
    pub query_name: String,
    pub series_name: String,
    #[serde(default)]
    pub options: Filters,
}

impl DataSeriesRequest {
    pub fn new(query_name: impl Into<String>, series_name: impl Into<String>) -> Self {
        Self {
            query_name: query_name.into(),
            series_name: series_name.into(),
            options: Filters::new(),
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: Value) -> Self {
        self.options.insert(name.into(), value);
        self
    }
}

/// A batch of sub-queries plus filters shared by all of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataRequest {
    #[serde(default)]
    pub global_filters: Filters,
    #[serde(default)]
    pub series_requests: Vec<DataSeriesRequest>,
}

impl DataRequest {
    /// Decode a request; shape errors are [`crate::ErrorKind::Wire`].
    pub fn from_json(json: &str) -> Result<Self, VizError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Responses
// ═══════════════════════════════════════════════════════════════

/// A named root answering one sub-query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataSeries {
    pub series_name: String,
    pub root: Datum,
}

/// A finished response: the string table every index refers to, plus the
/// series forest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Data {
    pub string_table: Vec<String>,
    pub data_series: Vec<DataSeries>,
}

impl Data {
    pub fn from_json(json: &str) -> Result<Self, VizError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, VizError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn series(&self, name: &str) -> Option<&DataSeries> {
        self.data_series.iter().find(|s| s.series_name == name)
    }
}
