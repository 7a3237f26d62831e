// Chart series domain models
use super::bucket::BucketKey;
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: BucketKey,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(time: BucketKey, value: f64) -> Self {
        Self { time, value }
    }
}

/// Ascending, gap-free points for one metric of one panel and phase
pub type Series = Vec<SeriesPoint>;

/// Per-bucket merge of several panels' power.
///
/// `total_power` is always the sum of `panels` at this bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedPowerPoint {
    pub time: BucketKey,
    pub panels: Vec<(String, f64)>,
    pub total_power: f64,
}

impl CombinedPowerPoint {
    pub fn new(time: BucketKey, panels: Vec<(String, f64)>) -> Self {
        let total_power = panels.iter().map(|(_, value)| value).sum();
        Self {
            time,
            panels,
            total_power,
        }
    }

    #[cfg(test)]
    pub fn panel_value(&self, key: &str) -> Option<f64> {
        self.panels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| *value)
    }
}

impl Serialize for CombinedPowerPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.panels.len() + 2))?;
        map.serialize_entry("time", &self.time)?;
        for (key, value) in &self.panels {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry("totalPower", &self.total_power)?;
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    Range,
    Latest,
}

/// What was asked of the reading source while answering a request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub panel: String,
    pub kind: QueryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub rows: usize,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeriesResponse {
    pub data: Series,
    pub debug_queries: Vec<QueryDescriptor>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalPowerResponse {
    pub data: Vec<CombinedPowerPoint>,
    pub debug_queries: Vec<QueryDescriptor>,
}
