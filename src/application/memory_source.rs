// In-memory reading source for tests
use crate::application::reading_source::ReadingSource;
use crate::domain::reading::Reading;
use anyhow::bail;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct MemorySource {
    readings: Vec<Reading>,
    unavailable: bool,
    failing_windows: Vec<DateTime<Utc>>,
    slow_windows: Vec<(DateTime<Utc>, Duration)>,
    stalled_latest: bool,
    range_calls: AtomicUsize,
    latest_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self {
            readings,
            ..Default::default()
        }
    }

    /// Every call fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    /// Range queries starting exactly at `start` fail
    pub fn failing_window(mut self, start: DateTime<Utc>) -> Self {
        self.failing_windows.push(start);
        self
    }

    /// Range queries starting exactly at `start` answer only after `delay`
    pub fn slow_window(mut self, start: DateTime<Utc>, delay: Duration) -> Self {
        self.slow_windows.push((start, delay));
        self
    }

    /// Latest reading lookups never complete
    pub fn stalled_latest(mut self) -> Self {
        self.stalled_latest = true;
        self
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    pub fn latest_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadingSource for MemorySource {
    async fn latest_reading(&self, panel_id: &str) -> anyhow::Result<Option<Reading>> {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            bail!("connection refused");
        }
        if self.stalled_latest {
            futures::future::pending::<()>().await;
        }

        Ok(self
            .readings
            .iter()
            .filter(|r| r.panel_id == panel_id)
            .max_by_key(|r| r.timestamp)
            .cloned())
    }

    async fn readings_in_range(
        &self,
        panel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Reading>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            bail!("connection refused");
        }
        if self.failing_windows.contains(&start) {
            bail!("query timed out");
        }
        if let Some((_, delay)) = self.slow_windows.iter().find(|(s, _)| *s == start) {
            tokio::time::sleep(*delay).await;
        }

        Ok(self
            .readings
            .iter()
            .filter(|r| r.panel_id == panel_id && r.timestamp >= start && r.timestamp < end)
            .cloned()
            .collect())
    }
}
