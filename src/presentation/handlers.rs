// HTTP request handlers
use crate::application::error::SeriesError;
use crate::domain::bucket::Granularity;
use crate::domain::reading::{Metric, Phase};
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct MetricSeriesQuery {
    pub panel: Option<String>,
    pub date: Option<String>,
    pub granularity: Option<String>,
}

#[derive(Deserialize)]
pub struct TotalPowerQuery {
    pub date: Option<String>,
    pub granularity: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List monitored panels
pub async fn list_panels(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let panels = state.panel_service.list_panels().await;
    respond(&panels, accepts_brotli(&headers)).await
}

/// One metric of one panel and phase, bucketed over a day
pub async fn metric_series(
    Path((metric, phase)): Path<(String, String)>,
    Query(query): Query<MetricSeriesQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);

    let metric = match metric.parse::<Metric>() {
        Ok(metric) => metric,
        Err(raw) => return SeriesError::InvalidMetric(raw).into_response(),
    };
    let phase = match phase.parse::<Phase>() {
        Ok(phase) => phase,
        Err(raw) => return SeriesError::InvalidPhase(raw).into_response(),
    };
    let granularity = match parse_granularity(query.granularity.as_deref()) {
        Ok(granularity) => granularity,
        Err(e) => return e.into_response(),
    };

    let result = state
        .series_service
        .metric_series(
            metric,
            phase,
            query.panel.as_deref(),
            query.date.as_deref(),
            granularity,
        )
        .await;

    match result {
        Ok(response) => respond(&response, compress).await,
        Err(e) => {
            tracing::warn!("Metric series {}/{} failed: {}", metric, phase, e);
            e.into_response()
        }
    }
}

/// Combined power of all panels with their total
pub async fn total_power(
    Query(query): Query<TotalPowerQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);

    let granularity = match parse_granularity(query.granularity.as_deref()) {
        Ok(granularity) => granularity,
        Err(e) => return e.into_response(),
    };

    match state
        .series_service
        .total_power(granularity, query.date.as_deref())
        .await
    {
        Ok(response) => respond(&response, compress).await,
        Err(e) => {
            tracing::warn!("Total power failed: {}", e);
            e.into_response()
        }
    }
}

fn parse_granularity(raw: Option<&str>) -> Result<Granularity, SeriesError> {
    match raw {
        Some(raw) => raw
            .parse::<Granularity>()
            .map_err(SeriesError::InvalidGranularity),
        None => Ok(Granularity::Hour),
    }
}

async fn respond<T: Serialize>(data: &T, compress: bool) -> Response {
    match json_response(data, compress).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
