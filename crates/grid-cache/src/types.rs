//! Core types for tiles, masks and grids.

use chrono::NaiveDate;
use precip_common::Period;
use serde::Serialize;

/// Value marking "no valid data" at a pixel. Distinct from a valid zero.
pub const SENTINEL: f32 = -999.0;

/// Whether a processed value is a real reading.
#[inline]
pub fn is_present(value: f32) -> bool {
    value != SENTINEL
}

/// Coordinate axes plus a row-major (lat, lon) value array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub lats: Vec<f64>,
    pub lons: Vec<f64>,
    pub values: Vec<f32>,
}

impl Grid {
    pub fn rows(&self) -> usize {
        self.lats.len()
    }

    pub fn cols(&self) -> usize {
        self.lons.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.rows() && col < self.cols() {
            self.values.get(row * self.cols() + col).copied()
        } else {
            None
        }
    }

    /// Indices of the pixel whose coordinates are closest to (lat, lon).
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        Some((nearest_index(&self.lats, lat)?, nearest_index(&self.lons, lon)?))
    }
}

/// Index of the axis value closest to `target`.
pub fn nearest_index(axis: &[f64], target: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (*a - target)
                .abs()
                .partial_cmp(&(*b - target).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
}

/// Boolean 2-D array aligned to a grid. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Mask {
    /// Build a mask; `cells` must hold `rows * cols` entries.
    pub fn new(rows: usize, cols: usize, cells: Vec<bool>) -> Self {
        debug_assert_eq!(cells.len(), rows * cols);
        Self { rows, cols, cells }
    }

    pub fn filled(rows: usize, cols: usize, value: bool) -> Self {
        Self::new(rows, cols, vec![value; rows * cols])
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    /// Number of `true` cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    pub fn all(&self) -> bool {
        self.cells.iter().all(|&c| c)
    }

    pub fn none(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }
}

/// Extent of the full, unsubsampled source grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GridBounds {
    pub fn from_axes(lats: &[f64], lons: &[f64]) -> Self {
        let (min_lat, max_lat) = min_max(lats);
        let (min_lon, max_lon) = min_max(lons);
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Display scale plus observed statistics of valid pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TileStats {
    /// Fixed colour-scale minimum, identical for every tile.
    pub display_min: f32,
    /// Fixed colour-scale maximum, identical for every tile.
    pub display_max: f32,
    pub mean: f32,
    pub actual_min: f32,
    pub actual_max: f32,
    pub valid_count: usize,
}

impl TileStats {
    /// Statistics over non-sentinel values. All-zero when nothing is valid.
    pub fn compute(values: &[f32], display_min: f32, display_max: f32) -> Self {
        let mut sum = 0.0f64;
        let mut count = 0usize;
        let mut lo = f32::INFINITY;
        let mut hi = f32::NEG_INFINITY;

        for &v in values.iter().filter(|&&v| is_present(v)) {
            sum += v as f64;
            count += 1;
            lo = lo.min(v);
            hi = hi.max(v);
        }

        if count == 0 {
            return Self {
                display_min,
                display_max,
                mean: 0.0,
                actual_min: 0.0,
                actual_max: 0.0,
                valid_count: 0,
            };
        }

        Self {
            display_min,
            display_max,
            mean: (sum / count as f64) as f32,
            actual_min: lo,
            actual_max: hi,
            valid_count: count,
        }
    }
}

/// Cache key of a daily tile. Four independent axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileKey {
    pub period: Period,
    pub day: usize,
    pub subsample: usize,
    pub apply_mask: bool,
}

impl TileKey {
    /// Build a key; a subsampling factor of 0 is treated as 1.
    pub fn new(period: Period, day: usize, subsample: usize, apply_mask: bool) -> Self {
        Self {
            period,
            day,
            subsample: subsample.max(1),
            apply_mask,
        }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/d{}/s{}/{}",
            self.period,
            self.day,
            self.subsample,
            if self.apply_mask { "masked" } else { "raw" }
        )
    }
}

/// A fully processed single-day tile. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTile {
    pub key: TileKey,
    /// Calendar date of the first raw sample of the day.
    pub date: NaiveDate,
    /// Day-averaged values in mm/day, sentinel where nothing was valid.
    pub grid: Grid,
    /// Valid raw samples per pixel, aligned with `grid.values`.
    pub sample_counts: Vec<u32>,
    pub bounds: GridBounds,
    pub stats: TileStats,
    /// Raw time indices `raw_start..raw_end` that compose the day.
    pub raw_start: usize,
    pub raw_end: usize,
    /// Number of days in the period.
    pub total_days: usize,
}

/// A multi-day grid produced by averaging daily tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTile {
    pub period: Period,
    pub start_day: usize,
    pub end_day: usize,
    pub grid: Grid,
    /// Days with a present value per pixel.
    pub day_counts: Vec<u16>,
    pub bounds: GridBounds,
    pub stats: TileStats,
    pub raw_start: usize,
    pub raw_end: usize,
    pub total_days: usize,
}

/// `n` evenly spaced values from `first` to `last` inclusive.
pub fn linspace(first: f64, last: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![first],
        _ => {
            let step = (last - first) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { last } else { first + step * i as f64 })
                .collect()
        }
    }
}

/// Every `step`-th index of an axis of length `len`, starting at 0.
pub fn subsample_indices(len: usize, step: usize) -> Vec<usize> {
    (0..len).step_by(step.max(1)).collect()
}

/// Subsample an axis and rebuild it as an evenly spaced sequence.
pub fn subsampled_axis(axis: &[f64], step: usize) -> Vec<f64> {
    let idx = subsample_indices(axis.len(), step);
    match (idx.first(), idx.last()) {
        (Some(&first), Some(&last)) => linspace(axis[first], axis[last], idx.len()),
        _ => Vec::new(),
    }
}
