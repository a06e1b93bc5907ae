//! Cache statistics, clearing and background prefetch.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::Json;
use grid_cache::{CacheStatsSnapshot, ClearReport, Period};
use serde::{Deserialize, Serialize};

use super::params;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub caches: CacheStatsSnapshot,
    pub hit_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct PrefetchQuery {
    pub period: Option<String>,
    pub subsample: Option<usize>,
    pub mask: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchResponse {
    pub status: &'static str,
    pub period: Period,
    pub days: usize,
}

/// GET /api/cache/stats
pub async fn stats_handler(Extension(state): Extension<Arc<AppState>>) -> Json<StatsResponse> {
    let caches = state.engine.stats();
    Json(StatsResponse {
        hit_rate: caches.hit_rate(),
        caches,
    })
}

/// POST /api/cache/clear
pub async fn clear_handler(Extension(state): Extension<Arc<AppState>>) -> Json<ClearReport> {
    Json(state.engine.clear().await)
}

/// POST /api/prefetch?period= - warm a period in the background
pub async fn prefetch_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PrefetchQuery>,
) -> ApiResult<(StatusCode, Json<PrefetchResponse>)> {
    let period = params::period(query.period.as_deref())?;
    let days = state.engine.day_count(period).await?;

    // Detached; the engine logs completion or the failing day
    drop(state.engine.spawn_prefetch(
        period,
        query.subsample.unwrap_or(params::DEFAULT_SUBSAMPLE),
        query.mask.unwrap_or(true),
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(PrefetchResponse {
            status: "started",
            period,
            days,
        }),
    ))
}
