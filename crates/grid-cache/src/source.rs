//! Grid Source abstraction: the remote dataset, opened per period.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use precip_common::Period;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opens dataset handles by period.
///
/// Opening is expensive; the connection cache makes sure it happens at most
/// once per period.
#[async_trait]
pub trait GridSource: Send + Sync {
    /// Open the dataset for a period.
    ///
    /// Fails with `UpstreamUnavailable` if the period cannot be reached.
    async fn open(&self, period: Period) -> Result<Arc<dyn GridHandle>>;
}

/// An open dataset exposing a (time, lat, lon) precipitation variable.
#[async_trait]
pub trait GridHandle: Send + Sync {
    /// Latitude coordinates of the full grid.
    fn latitudes(&self) -> &[f64];

    /// Longitude coordinates of the full grid.
    fn longitudes(&self) -> &[f64];

    /// Timestamp of each raw sample.
    fn times(&self) -> &[NaiveDateTime];

    /// Number of raw samples on the time axis.
    fn time_count(&self) -> usize {
        self.times().len()
    }

    /// Read one time slice as a row-major (lat, lon) array.
    ///
    /// Fails with `MissingVariable` if the precipitation variable is absent
    /// and `InvalidIndex` if `time_index` is outside the time axis.
    async fn read_slice(&self, time_index: usize) -> Result<Vec<f32>>;

    /// Release the handle. Called once by the connection cache on clear.
    async fn close(&self) {}
}

/// Fill-value convention of a dataset variant.
///
/// Fill values appear as extreme magnitudes, very negative in some variants
/// and very positive in others. A reading is valid iff it is finite, lies
/// strictly inside `(lower, upper)` and is non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillConvention {
    pub lower: f32,
    pub upper: f32,
}

impl Default for FillConvention {
    fn default() -> Self {
        Self {
            lower: -1e30,
            upper: 1e30,
        }
    }
}

impl FillConvention {
    pub fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }

    /// Whether a raw reading is a real measurement.
    #[inline]
    pub fn is_valid(&self, value: f32) -> bool {
        value.is_finite() && value > self.lower && value < self.upper && value >= 0.0
    }
}
