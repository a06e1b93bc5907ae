//! Common types shared across the precipitation tile services.

pub mod bbox;
pub mod period;
pub mod polygon;

pub use bbox::BoundingBox;
pub use period::{Period, PeriodParseError};
pub use polygon::{GeometryError, Polygon, PreparedRegion, Region, RegionGeometry};
