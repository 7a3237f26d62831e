// Reading source trait for panel telemetry access
use crate::domain::reading::Reading;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Most recent reading stored for a panel, if any
    async fn latest_reading(&self, panel_id: &str) -> anyhow::Result<Option<Reading>>;

    /// All readings for a panel with `start <= timestamp < end`.
    /// May return a subset when the store is partially available.
    async fn readings_in_range(
        &self,
        panel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Reading>>;
}
