//! Landing page: an index of the routes and their parameters.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use grid_cache::Period;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Endpoint {
    pub path: &'static str,
    pub method: &'static str,
    pub params: &'static [&'static str],
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct LandingResponse {
    pub message: &'static str,
    pub periods: Vec<Period>,
    pub endpoints: &'static [Endpoint],
}

pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        path: "/api/periods",
        method: "GET",
        params: &[],
        description: "Known and discovered periods, plus the land mask reference",
    },
    Endpoint {
        path: "/api/times",
        method: "GET",
        params: &["period"],
        description: "Raw sample timestamps of a period",
    },
    Endpoint {
        path: "/api/days",
        method: "GET",
        params: &["period"],
        description: "Day indices and dates of a period",
    },
    Endpoint {
        path: "/api/precipitation",
        method: "GET",
        params: &["period", "time", "subsample", "mask"],
        description: "Daily precipitation tile as JSON (time is the day index)",
    },
    Endpoint {
        path: "/api/precipitation/binary",
        method: "GET",
        params: &["period", "time", "subsample", "mask"],
        description: "Daily precipitation tile as a little-endian binary frame",
    },
    Endpoint {
        path: "/api/precipitation/aggregate",
        method: "GET",
        params: &["period", "start", "end", "subsample", "mask", "format"],
        description: "Mean over a day range, as JSON or binary",
    },
    Endpoint {
        path: "/api/timeseries",
        method: "GET",
        params: &["period", "lat", "lon", "subsample", "mask", "mode"],
        description: "Daily, dekadal or monthly series at a point",
    },
    Endpoint {
        path: "/api/timeseries/region",
        method: "POST",
        params: &["period", "name", "geometry", "subsample", "mask", "mode"],
        description: "Series averaged over a GeoJSON region (JSON body)",
    },
    Endpoint {
        path: "/api/prefetch",
        method: "POST",
        params: &["period", "subsample", "mask"],
        description: "Warm every day tile of a period in the background",
    },
    Endpoint {
        path: "/api/cache/stats",
        method: "GET",
        params: &[],
        description: "Cache sizes and hit/miss counters",
    },
    Endpoint {
        path: "/api/cache/clear",
        method: "POST",
        params: &[],
        description: "Drop cached tiles and masks and close connections",
    },
    Endpoint {
        path: "/health",
        method: "GET",
        params: &[],
        description: "Liveness check",
    },
    Endpoint {
        path: "/metrics",
        method: "GET",
        params: &[],
        description: "Prometheus metrics",
    },
];

/// GET / - Endpoint index
pub async fn landing_handler(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "max-age=300")],
        Json(LandingResponse {
            message: "Precipitation API",
            periods: state.engine.periods().await,
            endpoints: ENDPOINTS,
        }),
    )
}
