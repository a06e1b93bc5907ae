//! Point and region time series with a cache-or-direct strategy.
//!
//! A full-period series can be read from the tile cache (fast when every
//! tile of the period is warm) or straight from the source, sample by
//! sample. The choice is made per period by probing the period's last day:
//! prefetch fills tiles in increasing day order, so a warm last day implies
//! a warm period. This is a heuristic. A prefetch that is still running, or
//! one that evicted its own early days, makes the cache path compute the
//! missing tiles itself, which is slower but still correct.

use std::sync::Arc;
use std::time::{Duration, Instant};

use precip_common::{Period, Region};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::DailyPoint;
use crate::cache::daily_tile::{day_count, day_date, day_range, read_checked, DayAccumulator};
use crate::cache::{ConnectionCache, LandMaskCache, RegionMaskCache, TileCache};
use crate::config::{EngineConfig, WarmProbe};
use crate::error::Result;
use crate::source::GridHandle;
use crate::types::{
    is_present, nearest_index, subsample_indices, subsampled_axis, DailyTile, Mask, TileKey,
    SENTINEL,
};

/// Where a series is extracted.
#[derive(Debug, Clone)]
pub enum SeriesTarget {
    /// Nearest pixel of the subsampled grid.
    Point { lat: f64, lon: f64 },
    /// Mean over present pixels inside a named region.
    Region { name: String, region: Region },
}

impl SeriesTarget {
    pub fn describe(&self) -> String {
        match self {
            Self::Point { lat, lon } => format!("point({:.4}, {:.4})", lat, lon),
            Self::Region { name, .. } => format!("region({})", name),
        }
    }
}

/// Path used to build a period's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStrategy {
    Cache,
    Direct,
}

impl SeriesStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Direct => "direct",
        }
    }
}

/// Daily points of one period.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSegment {
    pub period: Period,
    pub strategy: SeriesStrategy,
    pub points: Vec<DailyPoint>,
}

/// A series over one or more consecutive periods.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub target: String,
    pub subsample: usize,
    pub apply_mask: bool,
    pub segments: Vec<SeriesSegment>,
}

impl TimeSeries {
    /// All daily points in period order.
    pub fn points(&self) -> Vec<DailyPoint> {
        self.segments
            .iter()
            .flat_map(|s| s.points.iter().copied())
            .collect()
    }

    /// Strategy of a single-period series.
    pub fn strategy(&self) -> Option<SeriesStrategy> {
        self.segments.first().map(|s| s.strategy)
    }
}

/// Borrowed view of the caches a series is built from.
pub(crate) struct SeriesExtractor<'a> {
    pub connections: &'a ConnectionCache,
    pub tiles: &'a TileCache,
    pub land_masks: &'a LandMaskCache,
    pub region_masks: &'a RegionMaskCache,
    pub config: &'a EngineConfig,
}

impl SeriesExtractor<'_> {
    /// Build one period's segment.
    pub async fn segment(
        &self,
        period: Period,
        target: &SeriesTarget,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<SeriesSegment> {
        let subsample = subsample.max(1);
        let handle = self.connections.get(period).await?;
        let days = day_count(handle.time_count(), self.config.samples_per_day);

        let strategy = if days == 0 {
            SeriesStrategy::Direct
        } else {
            self.probe(TileKey::new(period, days - 1, subsample, apply_mask)).await
        };
        metrics::counter!("precip_timeseries_strategy_total", "strategy" => strategy.as_str())
            .increment(1);

        let start = Instant::now();
        let points = match strategy {
            SeriesStrategy::Cache => self.from_tiles(period, days, target, subsample, apply_mask).await?,
            SeriesStrategy::Direct => {
                self.from_source(handle.as_ref(), period, days, target, subsample, apply_mask)
                    .await?
            }
        };

        info!(
            period = %period,
            target = %target.describe(),
            strategy = strategy.as_str(),
            days,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extracted time series"
        );

        Ok(SeriesSegment {
            period,
            strategy,
            points,
        })
    }

    async fn probe(&self, last: TileKey) -> SeriesStrategy {
        match self.config.warm_probe {
            WarmProbe::Membership => {
                if self.tiles.contains(&last) {
                    SeriesStrategy::Cache
                } else {
                    SeriesStrategy::Direct
                }
            }
            WarmProbe::Latency => {
                let threshold = Duration::from_millis(self.config.warm_threshold_ms);
                let start = Instant::now();
                let result = self.tiles.get(last).await;
                let elapsed = start.elapsed();
                debug!(tile = %last, elapsed_ms = elapsed.as_millis() as u64, "Warm probe");
                match result {
                    Ok(_) if elapsed < threshold => SeriesStrategy::Cache,
                    Ok(_) => SeriesStrategy::Direct,
                    Err(e) => {
                        warn!(tile = %last, error = %e, "Warm probe failed, reading directly");
                        SeriesStrategy::Direct
                    }
                }
            }
        }
    }

    async fn from_tiles(
        &self,
        period: Period,
        days: usize,
        target: &SeriesTarget,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<Vec<DailyPoint>> {
        let mut points = Vec::with_capacity(days);
        let mut selector: Option<TileSelector> = None;

        for day in 0..days {
            let tile = self.tiles.get(TileKey::new(period, day, subsample, apply_mask)).await?;
            let sel = match selector.take() {
                Some(sel) => sel,
                None => self.tile_selector(&tile, target).await?,
            };
            points.push(sel.extract(&tile));
            selector = Some(sel);
        }
        Ok(points)
    }

    async fn tile_selector(&self, tile: &DailyTile, target: &SeriesTarget) -> Result<TileSelector> {
        Ok(match target {
            SeriesTarget::Point { lat, lon } => {
                TileSelector::Pixel(tile.grid.nearest(*lat, *lon).map(|(r, c)| r * tile.grid.cols() + c))
            }
            SeriesTarget::Region { name, region } => {
                let mask = self
                    .region_masks
                    .get(name, &tile.grid.lats, &tile.grid.lons, region)
                    .await?;
                TileSelector::Masked(mask)
            }
        })
    }

    async fn from_source(
        &self,
        handle: &dyn GridHandle,
        period: Period,
        days: usize,
        target: &SeriesTarget,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<Vec<DailyPoint>> {
        let spd = self.config.samples_per_day;
        let full_lats = handle.latitudes();
        let full_lons = handle.longitudes();
        let cols = full_lons.len();
        let rows_idx = subsample_indices(full_lats.len(), subsample);
        let cols_idx = subsample_indices(cols, subsample);
        let sub_cols = cols_idx.len();

        // positions in the subsampled grid
        let mut selected: Vec<usize> = match target {
            SeriesTarget::Point { lat, lon } => {
                let lats = subsampled_axis(full_lats, subsample);
                let lons = subsampled_axis(full_lons, subsample);
                match (nearest_index(&lats, *lat), nearest_index(&lons, *lon)) {
                    (Some(r), Some(c)) => vec![r * sub_cols + c],
                    _ => Vec::new(),
                }
            }
            SeriesTarget::Region { name, region } => {
                let lats = subsampled_axis(full_lats, subsample);
                let lons = subsampled_axis(full_lons, subsample);
                let mask = self.region_masks.get(name, &lats, &lons, region).await?;
                true_cells(&mask)
            }
        };

        if apply_mask {
            let land = self.land_masks.get(subsample).await?;
            if land.shape() == (rows_idx.len(), sub_cols) {
                selected.retain(|&i| land.cells()[i]);
            } else {
                warn!(
                    period = %period,
                    mask_shape = ?land.shape(),
                    "Land mask shape mismatch, reading unmasked series"
                );
            }
        }

        // positions in the full-resolution slice
        let raw_pixels: Vec<usize> = selected
            .iter()
            .map(|&i| rows_idx[i / sub_cols] * cols + cols_idx[i % sub_cols])
            .collect();
        let single = matches!(target, SeriesTarget::Point { .. });

        let mut points = Vec::with_capacity(days);
        for day in 0..days {
            let (raw_start, raw_end) = day_range(day, spd, handle.time_count())?;
            let mut acc = DayAccumulator::new(raw_pixels.len(), self.config.fill, self.config.unit_scale);
            for t in raw_start..raw_end {
                let slice = read_checked(handle, t).await?;
                acc.add(raw_pixels.iter().map(|&i| slice[i]));
            }
            let (values, counts) = acc.finish();

            let (value, sample_count) = if single {
                match (values.first(), counts.first()) {
                    (Some(&v), Some(&n)) if is_present(v) => (v, n as u32),
                    _ => (SENTINEL, 0),
                }
            } else {
                region_mean(values.iter().copied())
            };

            points.push(DailyPoint {
                date: day_date(handle, raw_start, period.first_day(), day),
                value,
                sample_count,
                raw_start,
                raw_end,
            });
        }
        Ok(points)
    }
}

/// How a tile is reduced to one value.
enum TileSelector {
    Pixel(Option<usize>),
    Masked(Arc<Mask>),
}

impl TileSelector {
    fn extract(&self, tile: &DailyTile) -> DailyPoint {
        let (value, sample_count) = match self {
            Self::Pixel(Some(i)) => match tile.grid.values.get(*i) {
                Some(&v) if is_present(v) => (v, tile.sample_counts.get(*i).copied().unwrap_or(0)),
                _ => (SENTINEL, 0),
            },
            Self::Pixel(None) => (SENTINEL, 0),
            Self::Masked(mask) => region_mean(
                tile.grid
                    .values
                    .iter()
                    .zip(mask.cells())
                    .filter(|&(_, &inside)| inside)
                    .map(|(&v, _)| v),
            ),
        };

        DailyPoint {
            date: tile.date,
            value,
            sample_count,
            raw_start: tile.raw_start,
            raw_end: tile.raw_end,
        }
    }
}

/// Mean over present values and how many there were.
fn region_mean<I: Iterator<Item = f32>>(values: I) -> (f32, u32) {
    let mut sum = 0.0f64;
    let mut n = 0u32;
    for v in values.filter(|&v| is_present(v)) {
        sum += v as f64;
        n += 1;
    }
    if n == 0 {
        (SENTINEL, 0)
    } else {
        ((sum / n as f64) as f32, n)
    }
}

fn true_cells(mask: &Mask) -> Vec<usize> {
    mask.cells()
        .iter()
        .enumerate()
        .filter_map(|(i, &inside)| inside.then_some(i))
        .collect()
}
