// HTTP request handlers
use crate::domain::error::MetricsError;
use crate::domain::metric::Metric;
use crate::domain::period::{HalfYear, PeriodKey};
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct SeriesQuery {
    pub metric: String,
    pub year: Option<i32>,
    pub half: Option<u8>,
    #[serde(default)]
    pub refresh: bool,
}

impl SeriesQuery {
    /// Year and half-year default to the period containing today
    fn period(&self) -> Result<PeriodKey, MetricsError> {
        let current = PeriodKey::containing(&chrono::Utc::now().date_naive());
        let year = self.year.unwrap_or(current.year);
        let half = match self.half {
            Some(half) => HalfYear::try_from(half).map_err(MetricsError::InvalidRequest)?,
            None => current.half,
        };
        Ok(PeriodKey::new(year, half))
    }
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        let status = match &self {
            MetricsError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MetricsError::DataUnavailable { .. } | MetricsError::MalformedData { .. } => {
                StatusCode::BAD_GATEWAY
            }
        };
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Grouped series for one metric over a half-year
pub async fn grouped_series(
    query: Result<Query<SeriesQuery>, QueryRejection>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let compress = accepts_brotli(&headers);

    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return MetricsError::InvalidRequest(rejection.body_text()).into_response();
        }
    };
    let parsed = query
        .metric
        .parse::<Metric>()
        .and_then(|metric| query.period().map(|period| (metric, period)));
    let (metric, period) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => return e.into_response(),
    };

    match state
        .series_service
        .get_grouped_series(metric, period, query.refresh)
        .await
    {
        Ok(report) => match json_response(&report, StatusCode::OK, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => {
            tracing::warn!(%period, %metric, error = %e, "Failed to build grouped series");
            e.into_response()
        }
    }
}

fn path_period(
    path: Result<Path<(i32, u8)>, PathRejection>,
) -> Result<PeriodKey, MetricsError> {
    let Path((year, half)) =
        path.map_err(|rejection| MetricsError::InvalidRequest(rejection.body_text()))?;
    let half = HalfYear::try_from(half).map_err(MetricsError::InvalidRequest)?;
    Ok(PeriodKey::new(year, half))
}

/// What the cache currently holds for a period
pub async fn period_status(
    path: Result<Path<(i32, u8)>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let period = match path_period(path) {
        Ok(period) => period,
        Err(e) => return e.into_response(),
    };

    let body = match state.series_service.cached(period) {
        Some(set) => json!({
            "period": period,
            "cached": true,
            "records": set.records.len(),
            "quarantined": set.quarantined,
            "fetchedAt": set.fetched_at,
        }),
        None => json!({ "period": period, "cached": false }),
    };
    axum::Json(body).into_response()
}

/// Drop the cached records of a period
pub async fn invalidate_period(
    path: Result<Path<(i32, u8)>, PathRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let period = match path_period(path) {
        Ok(period) => period,
        Err(e) => return e.into_response(),
    };

    let removed = state.series_service.invalidate(period);
    let cached = state.series_service.cached_periods();
    tracing::info!(%period, removed, cached, "Period cache invalidated");
    StatusCode::NO_CONTENT.into_response()
}

/// Drop every cached period
pub async fn clear_periods(State(state): State<Arc<AppState>>) -> Response {
    let cleared = state.series_service.clear();
    tracing::info!(cleared, "Period cache cleared");
    axum::Json(json!({ "cleared": cleared })).into_response()
}
