//! Synthetic axes, time axes and precipitation slices.
//!
//! Raw values are precipitation flux (kg m-2 s-1), the unit the engine
//! multiplies by 86400 to get mm/day.

use chrono::{Duration, NaiveDateTime};
use precip_common::Period;

use crate::fixtures::fill;

/// `n` coordinates from `start` with a fixed `step`.
///
/// # Example
///
/// ```
/// use test_utils::axis;
///
/// assert_eq!(axis(-10.0, 0.5, 3), vec![-10.0, -9.5, -9.0]);
/// ```
pub fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// `n` timestamps every `hours` hours from the period's first midnight.
pub fn sample_times(period: Period, n: usize, hours: i64) -> Vec<NaiveDateTime> {
    let start = period.first_day().and_hms_opt(0, 0, 0).unwrap_or_default();
    (0..n)
        .map(|i| start + Duration::hours(hours * i as i64))
        .collect()
}

/// Raw flux that converts to `mm_per_day`.
pub fn flux(mm_per_day: f32) -> f32 {
    mm_per_day / 86_400.0
}

/// Deterministic rainfall slice in raw flux units.
///
/// Most pixels are dry; roughly one in four receives up to 50 mm/day.
pub fn precipitation_slice(rows: usize, cols: usize, seed: u32) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let hash = simple_hash(col as u32, row as u32, seed);
            let mm = if hash % 4 == 0 {
                (hash % 5000) as f32 / 100.0
            } else {
                0.0
            };
            data.push(flux(mm));
        }
    }
    data
}

/// Constant slice with ocean fill in the given columns.
///
/// Alternates the negative and positive fill conventions so both are
/// exercised.
pub fn slice_with_ocean(rows: usize, cols: usize, raw: f32, ocean_cols: &[usize]) -> Vec<f32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            if ocean_cols.contains(&col) {
                data.push(if row % 2 == 0 { fill::NEGATIVE } else { fill::POSITIVE });
            } else {
                data.push(raw);
            }
        }
    }
    data
}

fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_times_six_hourly() {
        let times = sample_times(Period::ym(2025, 1), 5, 6);
        assert_eq!(times.len(), 5);
        assert_eq!(times[0].to_string(), "2025-01-01 00:00:00");
        assert_eq!(times[4].to_string(), "2025-01-02 00:00:00");
    }

    #[test]
    fn test_precipitation_slice_deterministic() {
        let a = precipitation_slice(8, 8, 42);
        let b = precipitation_slice(8, 8, 42);
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| (0.0..=flux(50.0)).contains(&v)));
    }

    #[test]
    fn test_slice_with_ocean() {
        let slice = slice_with_ocean(2, 3, 1.0, &[0]);
        assert_eq!(slice[0], fill::NEGATIVE);
        assert_eq!(slice[3], fill::POSITIVE);
        assert_eq!(slice[1], 1.0);
    }
}
