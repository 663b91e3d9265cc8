// Route table
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    clear_periods, grouped_series, health_check, invalidate_period, period_status,
};
use axum::{
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/series", get(grouped_series))
        .route("/periods", delete(clear_periods))
        .route(
            "/periods/:year/:half",
            get(period_status).delete(invalidate_period),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
