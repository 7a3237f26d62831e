// Series service - Use case for building chart series from panel readings
use crate::application::aggregation::{
    assemble_series, combine_panels, current_day_cutoff, truncate_after,
};
use crate::application::clock::Clock;
use crate::application::error::SeriesError;
use crate::application::reading_source::ReadingSource;
use crate::domain::bucket::{day_window, Granularity};
use crate::domain::reading::{Metric, Phase, Reading};
use crate::domain::series::{
    MetricSeriesResponse, QueryDescriptor, QueryKind, Series, TotalPowerResponse,
};
use crate::infrastructure::config::{DashboardSettings, FetchMode, PanelConfig};
use anyhow::anyhow;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SeriesSettings {
    pub timezone: Tz,
    pub panels: Vec<PanelConfig>,
    pub total_phase: Phase,
    pub fetch_mode: FetchMode,
    pub query_timeout: std::time::Duration,
}

impl SeriesSettings {
    pub fn from_config(dashboard: &DashboardSettings) -> anyhow::Result<Self> {
        let total_phase = dashboard
            .total_phase
            .parse::<Phase>()
            .map_err(|p| anyhow!("invalid dashboard total_phase: {}", p))?;

        Ok(Self {
            timezone: dashboard.parse_timezone()?,
            panels: dashboard.panels.clone(),
            total_phase,
            fetch_mode: dashboard.fetch_mode,
            query_timeout: std::time::Duration::from_millis(dashboard.sub_query_timeout_ms),
        })
    }
}

/// Readings of one panel for one day plus what it took to get them
struct DayReadings {
    readings: Vec<Reading>,
    queries: Vec<QueryDescriptor>,
}

#[derive(Clone)]
pub struct SeriesService {
    source: Arc<dyn ReadingSource>,
    clock: Arc<dyn Clock>,
    settings: SeriesSettings,
}

impl SeriesService {
    pub fn new(source: Arc<dyn ReadingSource>, clock: Arc<dyn Clock>, settings: SeriesSettings) -> Self {
        Self {
            source,
            clock,
            settings,
        }
    }

    /// Parse `YYYY-MM-DD`, or the local date of `now` when absent
    pub fn resolve_date(
        &self,
        date: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<NaiveDate, SeriesError> {
        match date {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| SeriesError::InvalidDate(raw.to_string())),
            None => Ok(self.local_date(now)),
        }
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.settings.timezone).date_naive()
    }

    fn panel(&self, panel_id: Option<&str>) -> Result<&PanelConfig, SeriesError> {
        match panel_id {
            Some(id) => self
                .settings
                .panels
                .iter()
                .find(|p| p.id == id)
                .ok_or_else(|| SeriesError::UnknownPanel(id.to_string())),
            None => self
                .settings
                .panels
                .first()
                .ok_or_else(|| SeriesError::UnknownPanel(String::new())),
        }
    }

    pub async fn metric_series(
        &self,
        metric: Metric,
        phase: Phase,
        panel_id: Option<&str>,
        date: Option<&str>,
        granularity: Granularity,
    ) -> Result<MetricSeriesResponse, SeriesError> {
        // One clock read per request so date resolution and truncation agree
        let now = self.clock.now();
        let panel = self.panel(panel_id)?;
        let date = self.resolve_date(date, now)?;
        let tz = self.settings.timezone;

        let day = self.fetch_day(&panel.id, date).await?;
        let mut debug_queries = day.queries;

        let series = assemble_series(&day.readings, date, &tz, granularity, metric, phase);

        let (latest, latest_queries) = self.latest_for_today(&[panel], date, now).await?;
        debug_queries.extend(latest_queries);
        let cutoff = current_day_cutoff(date, now, &tz, granularity, latest);
        let data = truncate_after(series, cutoff);

        tracing::debug!(
            "Built {} series for panel {} phase {} on {}: {} points from {} readings",
            metric,
            panel.id,
            phase,
            date,
            data.len(),
            day.readings.len()
        );

        Ok(MetricSeriesResponse {
            data,
            debug_queries,
        })
    }

    /// Power of every configured panel combined with their total
    pub async fn total_power(
        &self,
        granularity: Granularity,
        date: Option<&str>,
    ) -> Result<TotalPowerResponse, SeriesError> {
        let now = self.clock.now();
        let date = self.resolve_date(date, now)?;
        let tz = self.settings.timezone;
        let phase = self.settings.total_phase;

        let days = join_all(
            self.settings
                .panels
                .iter()
                .map(|panel| self.fetch_day(&panel.id, date)),
        )
        .await;

        let mut debug_queries = Vec::new();
        let mut per_panel: Vec<(String, Series)> = Vec::with_capacity(days.len());
        for (panel, day) in self.settings.panels.iter().zip(days) {
            let day = day?;
            let series = assemble_series(&day.readings, date, &tz, granularity, Metric::Power, phase);
            debug_queries.extend(day.queries);
            per_panel.push((panel.series_key.clone(), series));
        }

        let combined = combine_panels(&per_panel);

        let panels: Vec<&PanelConfig> = self.settings.panels.iter().collect();
        let (latest, latest_queries) = self.latest_for_today(&panels, date, now).await?;
        debug_queries.extend(latest_queries);
        let cutoff = current_day_cutoff(date, now, &tz, granularity, latest);
        let data = truncate_after(combined, cutoff);

        tracing::debug!(
            "Built total power for {} panels on {}: {} points",
            per_panel.len(),
            date,
            data.len()
        );

        Ok(TotalPowerResponse {
            data,
            debug_queries,
        })
    }

    async fn fetch_day(&self, panel_id: &str, date: NaiveDate) -> Result<DayReadings, SeriesError> {
        let (start, end) = day_window(date, &self.settings.timezone)
            .ok_or_else(|| SeriesError::InvalidDate(date.to_string()))?;

        match self.settings.fetch_mode {
            FetchMode::Range => {
                let (result, descriptor) = self.query_range(panel_id, start, end).await;
                let readings = result.map_err(|e| {
                    tracing::error!("Reading source failed for panel {}: {:#}", panel_id, e);
                    SeriesError::DataSourceUnavailable(format!("{:#}", e))
                })?;
                Ok(DayReadings {
                    readings,
                    queries: vec![descriptor],
                })
            }
            FetchMode::PerHour => self.fetch_day_per_hour(panel_id, start, end).await,
        }
    }

    /// Hourly sub-queries issued together; a failed hour is left empty so it zero-fills
    async fn fetch_day_per_hour(
        &self,
        panel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DayReadings, SeriesError> {
        let windows = hour_windows(start, end);
        let results = join_all(
            windows
                .iter()
                .map(|(from, to)| self.query_range(panel_id, *from, *to)),
        )
        .await;

        let mut readings = Vec::new();
        let mut queries = Vec::with_capacity(results.len());
        let mut failures = 0;
        let mut last_error = None;

        for ((from, to), (result, descriptor)) in windows.iter().zip(results) {
            match result {
                Ok(rows) => readings.extend(rows),
                Err(e) => {
                    failures += 1;
                    let failure = SeriesError::PartialBucketFailure {
                        panel: panel_id.to_string(),
                        window: format!("{}..{}", from.to_rfc3339(), to.to_rfc3339()),
                        reason: format!("{:#}", e),
                    };
                    tracing::warn!("{}; zero-filling", failure);
                    last_error = Some(e);
                }
            }
            queries.push(descriptor);
        }

        if failures == windows.len() {
            let reason = last_error
                .map(|e| format!("{:#}", e))
                .unwrap_or_else(|| "no windows queried".to_string());
            tracing::error!("Every hourly query failed for panel {}: {}", panel_id, reason);
            return Err(SeriesError::DataSourceUnavailable(reason));
        }

        Ok(DayReadings { readings, queries })
    }

    async fn query_range(
        &self,
        panel_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (anyhow::Result<Vec<Reading>>, QueryDescriptor) {
        let started = Instant::now();
        let timeout = self.settings.query_timeout;
        let result = match tokio::time::timeout(
            timeout,
            self.source.readings_in_range(panel_id, start, end),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(anyhow!("query timed out after {:?}", timeout)),
        };

        let descriptor = QueryDescriptor {
            panel: panel_id.to_string(),
            kind: QueryKind::Range,
            start: Some(start),
            end: Some(end),
            rows: result.as_ref().map(Vec::len).unwrap_or(0),
            duration_ms: started.elapsed().as_millis() as u64,
            error: result.as_ref().err().map(|e| format!("{:#}", e)),
        };

        (result, descriptor)
    }

    /// Most recent reading across `panels`, looked up only when `date` is today
    async fn latest_for_today(
        &self,
        panels: &[&PanelConfig],
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(Option<DateTime<Utc>>, Vec<QueryDescriptor>), SeriesError> {
        if date != self.local_date(now) {
            return Ok((None, Vec::new()));
        }

        let timeout = self.settings.query_timeout;
        let lookups = join_all(panels.iter().map(|panel| async move {
            let started = Instant::now();
            let result =
                match tokio::time::timeout(timeout, self.source.latest_reading(&panel.id)).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!("query timed out after {:?}", timeout)),
                };
            (panel, result, started.elapsed())
        }))
        .await;

        let mut latest: Option<DateTime<Utc>> = None;
        let mut queries = Vec::with_capacity(lookups.len());
        let mut failure = None;
        for (panel, result, elapsed) in lookups {
            let mut descriptor = QueryDescriptor {
                panel: panel.id.clone(),
                kind: QueryKind::Latest,
                start: None,
                end: None,
                rows: 0,
                duration_ms: elapsed.as_millis() as u64,
                error: None,
            };

            match result {
                Ok(reading) => {
                    descriptor.rows = usize::from(reading.is_some());
                    if let Some(reading) = reading {
                        latest = latest.max(Some(reading.timestamp));
                    }
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::error!("Latest reading lookup failed for panel {}: {}", panel.id, reason);
                    descriptor.error = Some(reason.clone());
                    failure.get_or_insert(reason);
                }
            }
            queries.push(descriptor);
        }

        if let Some(reason) = failure {
            return Err(SeriesError::DataSourceUnavailable(reason));
        }

        Ok((latest, queries))
    }
}

/// Split `[start, end)` into consecutive hour-long windows, the last one clipped to `end`
fn hour_windows(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut windows = Vec::new();
    let mut from = start;
    while from < end {
        let to = (from + Duration::hours(1)).min(end);
        windows.push((from, to));
        from = to;
    }
    windows
}
