// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::clock::SystemClock;
use crate::application::panel_service::PanelService;
use crate::application::series_service::{SeriesService, SeriesSettings};
use crate::infrastructure::config::load_config;
use crate::infrastructure::influx_repository::InfluxRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_config()?;
    let series_settings = SeriesSettings::from_config(&config.dashboard)?;

    // Create reading source (infrastructure layer)
    let repository = Arc::new(InfluxRepository::new(&config.influx)?);

    // Create services (application layer)
    let panel_service = PanelService::new(repository.clone(), config.dashboard.panels.clone());
    let series_service = SeriesService::new(repository, Arc::new(SystemClock), series_settings);

    // Create application state
    let state = Arc::new(AppState {
        panel_service,
        series_service,
    });

    // Build router (presentation layer)
    let router = create_router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind address {}", config.server.bind))?;
    tracing::info!(
        "Starting power-telemetry service on {} (timezone {}, {} panels)",
        addr,
        config.dashboard.timezone,
        config.dashboard.panels.len()
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
