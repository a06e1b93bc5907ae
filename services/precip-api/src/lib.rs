//! Precipitation API Service Library
//!
//! Thin HTTP layer over [`grid_cache::PrecipEngine`]: every route parses
//! its parameters, calls one engine operation and renders the result.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the router with every route and middleware layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::landing::landing_handler))
        // Catalog
        .route("/api/periods", get(handlers::periods::periods_handler))
        .route("/api/times", get(handlers::periods::times_handler))
        .route("/api/days", get(handlers::periods::days_handler))
        // Tiles
        .route(
            "/api/precipitation",
            get(handlers::precipitation::tile_handler),
        )
        .route(
            "/api/precipitation/binary",
            get(handlers::precipitation::tile_binary_handler),
        )
        .route(
            "/api/precipitation/aggregate",
            get(handlers::precipitation::aggregate_handler),
        )
        // Time series
        .route(
            "/api/timeseries",
            get(handlers::timeseries::point_series_handler),
        )
        .route(
            "/api/timeseries/region",
            post(handlers::timeseries::region_series_handler),
        )
        // Cache control
        .route("/api/prefetch", post(handlers::cache::prefetch_handler))
        .route("/api/cache/stats", get(handlers::cache::stats_handler))
        .route("/api/cache/clear", post(handlers::cache::clear_handler))
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
