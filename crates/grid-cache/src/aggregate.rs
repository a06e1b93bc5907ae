//! Aggregation of daily tiles into multi-day grids, and of daily series into
//! dekadal or monthly points.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{PrecipError, Result};
use crate::types::{is_present, DailyTile, Grid, TileStats, SENTINEL};

/// Days per dekad window.
pub const DEKAD_DAYS: usize = 10;

/// Per-pixel mean of daily tiles over the days where the pixel is present.
///
/// Pixels present on no day are [`SENTINEL`]. Returns the grid and the
/// number of present days per pixel. All tiles must share one shape.
pub fn mean_of_days<T>(tiles: &[T]) -> Result<(Grid, Vec<u16>)>
where
    T: AsRef<DailyTile>,
{
    let first = match tiles.first() {
        Some(t) => t.as_ref(),
        None => return Err(PrecipError::invalid_index(0, 0)),
    };
    let shape = first.grid.shape();
    let len = first.grid.values.len();

    let mut sums = vec![0.0f64; len];
    let mut counts = vec![0u16; len];

    for tile in tiles {
        let grid = &tile.as_ref().grid;
        if grid.shape() != shape || grid.values.len() != len {
            return Err(PrecipError::ShapeMismatch {
                expected: shape,
                found: grid.shape(),
            });
        }
        for ((sum, count), &v) in sums.iter_mut().zip(counts.iter_mut()).zip(&grid.values) {
            if is_present(v) {
                *sum += v as f64;
                *count += 1;
            }
        }
    }

    let values = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| {
            if count == 0 {
                SENTINEL
            } else {
                (sum / count as f64) as f32
            }
        })
        .collect();

    Ok((
        Grid {
            lats: first.grid.lats.clone(),
            lons: first.grid.lons.clone(),
            values,
        },
        counts,
    ))
}

/// Statistics of an aggregated grid, using the tile display scale.
pub fn aggregate_stats(grid: &Grid, display_min: f32, display_max: f32) -> TileStats {
    TileStats::compute(&grid.values, display_min, display_max)
}

/// One calendar day of a point or region series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPoint {
    pub date: NaiveDate,
    /// mm/day, or the sentinel when nothing was valid.
    pub value: f32,
    /// Valid samples behind the value (raw samples for a point, pixels for
    /// a region).
    pub sample_count: u32,
    pub raw_start: usize,
    pub raw_end: usize,
}

impl DailyPoint {
    pub fn is_present(&self) -> bool {
        is_present(self.value)
    }
}

/// Temporal aggregation mode of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    #[default]
    Daily,
    /// Consecutive 10-day windows from the first day of the series.
    Dekadal,
    /// Calendar months.
    Monthly,
}

impl FromStr for AggregateMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "dekadal" | "dekad" => Ok(Self::Dekadal),
            "monthly" | "month" => Ok(Self::Monthly),
            other => Err(format!("unknown aggregation mode: {}", other)),
        }
    }
}

/// A window of days with both its accumulated total and its daily mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Total over present days (mm), sentinel if none.
    pub sum: f32,
    /// Mean over present days (mm/day), sentinel if none.
    pub average: f32,
    /// Days in the window.
    pub day_count: usize,
    /// Days with a present value.
    pub valid_days: usize,
    pub sample_count: u32,
    pub raw_start: usize,
    pub raw_end: usize,
}

/// Group an ordered daily series by `mode`.
///
/// Absent days contribute to neither the sum nor the average.
pub fn aggregate_series(points: &[DailyPoint], mode: AggregateMode) -> Vec<SeriesPoint> {
    match mode {
        AggregateMode::Daily => points.chunks(1).map(summarize).collect(),
        AggregateMode::Dekadal => points.chunks(DEKAD_DAYS).map(summarize).collect(),
        AggregateMode::Monthly => {
            let mut out = Vec::new();
            let mut start = 0;
            for i in 1..=points.len() {
                let boundary = i == points.len()
                    || month_key(&points[i].date) != month_key(&points[start].date);
                if boundary {
                    out.push(summarize(&points[start..i]));
                    start = i;
                }
            }
            out
        }
    }
}

fn month_key(date: &NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Summarize a non-empty window.
fn summarize(window: &[DailyPoint]) -> SeriesPoint {
    let mut sum = 0.0f64;
    let mut valid_days = 0;
    let mut sample_count = 0;
    for p in window.iter().filter(|p| p.is_present()) {
        sum += p.value as f64;
        valid_days += 1;
        sample_count += p.sample_count;
    }

    let (sum, average) = if valid_days == 0 {
        (SENTINEL, SENTINEL)
    } else {
        (sum as f32, (sum / valid_days as f64) as f32)
    };

    let first = &window[0];
    let last = &window[window.len() - 1];
    SeriesPoint {
        start_date: first.date,
        end_date: last.date,
        sum,
        average,
        day_count: window.len(),
        valid_days,
        sample_count,
        raw_start: window.iter().map(|p| p.raw_start).min().unwrap_or(first.raw_start),
        raw_end: window.iter().map(|p| p.raw_end).max().unwrap_or(last.raw_end),
    }
}
