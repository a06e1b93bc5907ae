//! Point and region time series.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use grid_cache::{
    aggregate_series, AggregateMode, DailyPoint, Period, Region, SeriesPoint, SeriesStrategy,
    SeriesTarget, TimeSeries,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::params;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    /// One period or a comma separated list.
    pub period: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub subsample: Option<usize>,
    pub mask: Option<bool>,
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegionRequest {
    pub period: Option<String>,
    /// Cache key for the region mask; derived from the geometry if absent.
    pub name: Option<String>,
    /// GeoJSON Polygon, MultiPolygon, Feature or FeatureCollection.
    pub geometry: Value,
    pub subsample: Option<usize>,
    pub mask: Option<bool>,
    pub mode: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub period: Period,
    pub strategy: SeriesStrategy,
    pub days: usize,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum SeriesData {
    Daily(Vec<DailyPoint>),
    Aggregated(Vec<SeriesPoint>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub target: String,
    pub subsample: usize,
    pub masked: bool,
    pub mode: AggregateMode,
    pub segments: Vec<SegmentSummary>,
    pub data: SeriesData,
}

impl SeriesResponse {
    fn build(series: TimeSeries, mode: AggregateMode) -> Self {
        let points = series.points();
        let data = match mode {
            AggregateMode::Daily => SeriesData::Daily(points),
            mode => SeriesData::Aggregated(aggregate_series(&points, mode)),
        };
        Self {
            segments: series
                .segments
                .iter()
                .map(|s| SegmentSummary {
                    period: s.period,
                    strategy: s.strategy,
                    days: s.points.len(),
                })
                .collect(),
            target: series.target,
            subsample: series.subsample,
            masked: series.apply_mask,
            mode,
            data,
        }
    }
}

/// Stable mask cache name for an unnamed geometry.
fn geometry_name(geometry: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    geometry.to_string().hash(&mut hasher);
    format!("geometry-{:016x}", hasher.finish())
}

/// GET /api/timeseries?period=&lat=&lon=&subsample=&mask=&mode=
pub async fn point_series_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PointQuery>,
) -> ApiResult<Json<SeriesResponse>> {
    let periods = params::periods(query.period.as_deref())?;
    let mode = params::mode(query.mode.as_deref())?;
    let target = SeriesTarget::Point {
        lat: params::coordinate(query.lat, "lat")?,
        lon: params::coordinate(query.lon, "lon")?,
    };

    let series = state
        .engine
        .time_series_multi(
            &periods,
            &target,
            query.subsample.unwrap_or(params::DEFAULT_SUBSAMPLE),
            query.mask.unwrap_or(true),
        )
        .await?;
    Ok(Json(SeriesResponse::build(series, mode)))
}

/// POST /api/timeseries/region
pub async fn region_series_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<RegionRequest>,
) -> ApiResult<Json<SeriesResponse>> {
    let periods = params::periods(request.period.as_deref())?;
    let mode = params::mode(request.mode.as_deref())?;

    let region = Region::from_geojson(&request.geometry).map_err(grid_cache::PrecipError::from)?;
    let name = match request.name {
        Some(name) if !name.trim().is_empty() => name,
        Some(_) => return Err(ApiError::bad_request("region name must not be blank")),
        None => geometry_name(&request.geometry),
    };
    let target = SeriesTarget::Region { name, region };

    let series = state
        .engine
        .time_series_multi(
            &periods,
            &target,
            request.subsample.unwrap_or(params::DEFAULT_SUBSAMPLE),
            request.mask.unwrap_or(true),
        )
        .await?;
    Ok(Json(SeriesResponse::build(series, mode)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geometry_name_is_stable() {
        let a = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]});
        let b = json!({"type": "Polygon", "coordinates": [[[0, 0], [2, 0], [2, 2], [0, 0]]]});
        assert_eq!(geometry_name(&a), geometry_name(&a.clone()));
        assert_ne!(geometry_name(&a), geometry_name(&b));
        assert!(geometry_name(&a).starts_with("geometry-"));
    }
}
