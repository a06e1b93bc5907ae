//! Caching layers.
//!
//! - [`ConnectionCache`]: open dataset handles per period, never evicted
//! - [`LandMaskCache`]: land/ocean masks per subsampling factor
//! - [`RegionMaskCache`]: polygon masks per (region, grid shape)
//! - [`TileCache`]: bounded LRU of processed daily tiles
//!
//! All of them sit on [`FlightCache`], which runs at most one computation per
//! key at a time.

pub mod connection;
pub mod daily_tile;
pub mod flight;
pub mod land_mask;
pub mod region_mask;

pub use connection::ConnectionCache;
pub use daily_tile::{day_count, day_range, DayAccumulator, TileCache};
pub use flight::{FlightCache, FlightStats, Lookup};
pub use land_mask::LandMaskCache;
pub use region_mask::{RegionKey, RegionMaskCache};
