// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::application::period_cache::PeriodCache;
use crate::application::series_service::SeriesService;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::http_metrics_repository::HttpMetricsRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::create_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings()?;
    let options = settings.dashboard.aggregation_options()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(HttpMetricsRepository::new(&settings.backend)?);

    // Create cache and services (application layer)
    let cache = PeriodCache::new(repository, settings.dashboard.malformed_records);
    let series_service = SeriesService::new(cache, options);

    // Create application state
    let state = Arc::new(AppState { series_service });

    // Build router (presentation layer)
    let router = create_router(state);

    // Start server
    let addr: SocketAddr = settings
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address '{}'", settings.server.bind))?;
    tracing::info!(
        %addr,
        backend = %settings.backend.base_url,
        "Starting site-metrics service"
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
