//! Shared test utilities for the precipitation workspace.
//!
//! This crate provides common testing infrastructure including:
//! - An in-memory Grid Source with call counters and artificial latency
//! - Axis, time axis and rainfall slice generators
//! - Common fixtures (fill values, periods, region geometries)
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{FakeDataset, FakeSource, fixtures};
//! ```

pub mod fake_source;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fake_source::{FakeDataset, FakeSource};
pub use generators::*;

/// Assert two rainfall values agree within a tolerance.
///
/// Both sides are widened to `f64`, so grid values (`f32`) can be compared
/// against literals directly. The two-argument form uses a tolerance of
/// `1e-4` mm/day.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(tile.stats.mean, 3.0);
/// assert_approx_eq!(grid.get(0, 1).unwrap(), 10.0, 1e-3);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr) => {
        $crate::assert_approx_eq!($actual, $expected, 1e-4)
    };
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let actual = $actual as f64;
        let expected = $expected as f64;
        let tolerance = $tolerance as f64;
        if !((actual - expected).abs() <= tolerance) {
            panic!(
                "values differ: `{}` = {} but expected {} (tolerance {})",
                stringify!($actual),
                actual,
                expected,
                tolerance
            );
        }
    }};
}
