//! Daily tiles and multi-day aggregates, as JSON or wire frames.

use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use grid_cache::{AggregateTile, DailyTile, Grid, GridBounds, Period, TileFrame, TileStats};
use serde::{Deserialize, Serialize};

use super::params;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct TileQuery {
    pub period: Option<String>,
    /// Day index within the period.
    pub time: Option<usize>,
    pub subsample: Option<usize>,
    pub mask: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub period: Option<String>,
    pub start: usize,
    pub end: usize,
    pub subsample: Option<usize>,
    pub mask: Option<bool>,
    /// `json` (default) or `binary`.
    pub format: Option<String>,
}

/// Colour scale and observed statistics, as the map client reads them.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsBody {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub actual_min: f32,
    pub actual_max: f32,
    pub valid_count: usize,
}

impl From<&TileStats> for StatsBody {
    fn from(stats: &TileStats) -> Self {
        Self {
            min: stats.display_min,
            max: stats.display_max,
            mean: stats.mean,
            actual_min: stats.actual_min,
            actual_max: stats.actual_max,
            valid_count: stats.valid_count,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileResponse {
    pub period: Period,
    pub date: NaiveDate,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub values: Vec<Vec<f32>>,
    pub bounds: GridBounds,
    pub stats: StatsBody,
    pub time_index: usize,
    pub total_times: usize,
    pub raw_start: usize,
    pub raw_end: usize,
    pub masked: bool,
}

impl From<&DailyTile> for TileResponse {
    fn from(tile: &DailyTile) -> Self {
        Self {
            period: tile.key.period,
            date: tile.date,
            lat: tile.grid.lats.clone(),
            lon: tile.grid.lons.clone(),
            values: rows(&tile.grid),
            bounds: tile.bounds,
            stats: StatsBody::from(&tile.stats),
            time_index: tile.key.day,
            total_times: tile.total_days,
            raw_start: tile.raw_start,
            raw_end: tile.raw_end,
            masked: tile.key.apply_mask,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub period: Period,
    pub start: usize,
    pub end: usize,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub values: Vec<Vec<f32>>,
    pub bounds: GridBounds,
    pub stats: StatsBody,
    pub total_times: usize,
    pub raw_start: usize,
    pub raw_end: usize,
}

impl From<&AggregateTile> for AggregateResponse {
    fn from(tile: &AggregateTile) -> Self {
        Self {
            period: tile.period,
            start: tile.start_day,
            end: tile.end_day,
            lat: tile.grid.lats.clone(),
            lon: tile.grid.lons.clone(),
            values: rows(&tile.grid),
            bounds: tile.bounds,
            stats: StatsBody::from(&tile.stats),
            total_times: tile.total_days,
            raw_start: tile.raw_start,
            raw_end: tile.raw_end,
        }
    }
}

/// Row-major values split into one vector per latitude.
fn rows(grid: &Grid) -> Vec<Vec<f32>> {
    let cols = grid.cols();
    if cols == 0 {
        return Vec::new();
    }
    grid.values.chunks(cols).map(<[f32]>::to_vec).collect()
}

fn binary(frame: TileFrame) -> Response {
    ([(header::CONTENT_TYPE, OCTET_STREAM)], frame.encode()).into_response()
}

async fn fetch_tile(state: &AppState, query: &TileQuery) -> ApiResult<Arc<DailyTile>> {
    let period = params::period(query.period.as_deref())?;
    let tile = state
        .engine
        .tile(
            period,
            query.time.unwrap_or(0),
            query.subsample.unwrap_or(params::DEFAULT_SUBSAMPLE),
            query.mask.unwrap_or(true),
        )
        .await?;
    Ok(tile)
}

/// GET /api/precipitation?period=&time=&subsample=&mask=
pub async fn tile_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TileQuery>,
) -> ApiResult<Json<TileResponse>> {
    let tile = fetch_tile(&state, &query).await?;
    Ok(Json(TileResponse::from(tile.as_ref())))
}

/// GET /api/precipitation/binary - same tile as a wire frame
pub async fn tile_binary_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<TileQuery>,
) -> ApiResult<Response> {
    let tile = fetch_tile(&state, &query).await?;
    Ok(binary(TileFrame::from_tile(&tile)))
}

/// GET /api/precipitation/aggregate?period=&start=&end=&subsample=&mask=&format=
pub async fn aggregate_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<AggregateQuery>,
) -> ApiResult<Response> {
    let period = params::period(query.period.as_deref())?;
    let tile = state
        .engine
        .aggregate(
            period,
            query.start,
            query.end,
            query.subsample.unwrap_or(params::DEFAULT_SUBSAMPLE),
            query.mask.unwrap_or(true),
        )
        .await?;

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(AggregateResponse::from(&tile)).into_response()),
        Some("binary") => Ok(binary(TileFrame::from_aggregate(&tile))),
        Some(other) => Err(ApiError::bad_request(format!("unknown format: {other}"))),
    }
}
