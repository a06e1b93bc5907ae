//! Period, time axis and day listings.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use grid_cache::{DayInfo, Period};
use serde::{Deserialize, Serialize};

use super::params;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct PeriodsResponse {
    pub periods: Vec<Period>,
    pub reference: Period,
}

#[derive(Serialize)]
pub struct TimesResponse {
    pub period: Period,
    pub times: Vec<String>,
}

#[derive(Serialize)]
pub struct DaysResponse {
    pub period: Period,
    pub days: Vec<DayInfo>,
}

/// GET /api/periods
pub async fn periods_handler(Extension(state): Extension<Arc<AppState>>) -> Json<PeriodsResponse> {
    Json(PeriodsResponse {
        periods: state.engine.periods().await,
        reference: state.engine.config().reference_period,
    })
}

/// GET /api/times?period=YYYYMM - raw sample timestamps
pub async fn times_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<TimesResponse>> {
    let period = params::period(query.period.as_deref())?;
    let times = state
        .engine
        .times(period)
        .await?
        .iter()
        .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
        .collect();
    Ok(Json(TimesResponse { period, times }))
}

/// GET /api/days?period=YYYYMM - one entry per daily tile
pub async fn days_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<DaysResponse>> {
    let period = params::period(query.period.as_deref())?;
    let days = state.engine.days(period).await?;
    Ok(Json(DaysResponse { period, days }))
}
