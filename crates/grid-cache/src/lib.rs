//! Caching and aggregation engine for gridded precipitation tiles
//!
//! This crate turns a remote (time, lat, lon) precipitation dataset into
//! consistently shaped daily tiles for map and time-series clients:
//!
//! - **Single-flight caches**: at most one computation per key, failures
//!   are never stored
//! - **Daily averaging**: sub-daily samples are averaged over valid samples
//!   only, with a sentinel where nothing was valid
//! - **Land and region masks**: derived once and reused across requests
//! - **Binary frames**: a fixed little-endian layout for large grids
//!
//! # Architecture
//!
//! ```text
//! PrecipEngine::tile(period, day, subsample, mask)
//!      │
//!      ├─► PeriodCatalog::validate
//!      │
//!      └─► TileCache ──miss──► ConnectionCache::get(period)
//!               │                   │
//!               │                   └─► GridSource::open (once per period)
//!               │
//!               ├─► read day's raw slices, average valid samples
//!               │
//!               └─► LandMaskCache::get(subsample) (reference period)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_cache::{EngineConfig, PrecipEngine, SeriesTarget};
//!
//! let engine = PrecipEngine::new(source, EngineConfig::from_env(), periods)?;
//! let tile = engine.tile(period, 0, 2, true).await?;
//! let bytes = grid_cache::TileFrame::from_tile(&tile).encode();
//!
//! let series = engine
//!     .time_series(period, &SeriesTarget::Point { lat: -6.2, lon: 106.8 }, 2, true)
//!     .await?;
//! ```

pub mod aggregate;
pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;
pub mod timeseries;
pub mod types;

// Re-export commonly used types at crate root
pub use aggregate::{aggregate_series, mean_of_days, AggregateMode, DailyPoint, SeriesPoint};
pub use cache::{
    ConnectionCache, FlightCache, FlightStats, LandMaskCache, RegionKey, RegionMaskCache,
    TileCache,
};
pub use catalog::PeriodCatalog;
pub use codec::{CodecError, FrameHeader, TileFrame};
pub use config::{EngineConfig, WarmProbe};
pub use engine::{CacheStatsSnapshot, ClearReport, DayInfo, PrecipEngine};
pub use error::{PrecipError, Result};
pub use source::{FillConvention, GridHandle, GridSource};
pub use timeseries::{SeriesSegment, SeriesStrategy, SeriesTarget, TimeSeries};
pub use types::{
    AggregateTile, DailyTile, Grid, GridBounds, Mask, TileKey, TileStats, SENTINEL,
};

pub use precip_common::{Period, Region};
