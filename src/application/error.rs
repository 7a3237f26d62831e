// Errors raised while building series
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("reading source unavailable: {0}")]
    DataSourceUnavailable(String),
    #[error("lookup for panel {panel} window {window} failed: {reason}")]
    PartialBucketFailure {
        panel: String,
        window: String,
        reason: String,
    },
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid granularity: {0}")]
    InvalidGranularity(String),
    #[error("invalid metric: {0}")]
    InvalidMetric(String),
    #[error("invalid phase: {0}")]
    InvalidPhase(String),
    #[error("unknown panel: {0}")]
    UnknownPanel(String),
}
