use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{health_check, list_panels, metric_series, total_power};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/panels", get(list_panels))
        .route("/metric-series/:metric/:phase", get(metric_series))
        .route("/total-power", get(total_power))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
