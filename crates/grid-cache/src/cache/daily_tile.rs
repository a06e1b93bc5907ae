//! Daily tile cache: day-averaged, unit-converted, optionally land-masked
//! grids keyed by (period, day, subsample, mask flag).

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::cache::connection::ConnectionCache;
use crate::cache::flight::{FlightCache, FlightStats, Lookup};
use crate::cache::land_mask::LandMaskCache;
use crate::config::EngineConfig;
use crate::error::{PrecipError, Result};
use crate::source::{FillConvention, GridHandle};
use crate::types::{
    subsample_indices, subsampled_axis, DailyTile, Grid, GridBounds, TileKey, TileStats, SENTINEL,
};

/// Number of days covered by `time_count` raw samples.
pub fn day_count(time_count: usize, samples_per_day: usize) -> usize {
    let spd = samples_per_day.max(1);
    time_count.div_ceil(spd)
}

/// Raw index range `start..end` composing `day`. The last day may be short.
pub fn day_range(day: usize, samples_per_day: usize, time_count: usize) -> Result<(usize, usize)> {
    let days = day_count(time_count, samples_per_day);
    if day >= days {
        return Err(PrecipError::invalid_index(day, days));
    }
    let start = day * samples_per_day;
    let end = (start + samples_per_day).min(time_count);
    Ok((start, end))
}

/// Calendar date of a day: the date of its first raw sample.
pub fn day_date(handle: &dyn GridHandle, start: usize, fallback: NaiveDate, day: usize) -> NaiveDate {
    match handle.times().get(start) {
        Some(t) => t.date(),
        None => fallback + Duration::days(day as i64),
    }
}

/// Per-pixel running sum and valid-sample count across one day's samples.
///
/// Averages are taken over valid samples only; a pixel that never sees a
/// valid sample becomes [`SENTINEL`].
#[derive(Debug, Clone)]
pub struct DayAccumulator {
    sums: Vec<f64>,
    counts: Vec<u32>,
    fill: FillConvention,
    unit_scale: f32,
}

impl DayAccumulator {
    pub fn new(len: usize, fill: FillConvention, unit_scale: f32) -> Self {
        Self {
            sums: vec![0.0; len],
            counts: vec![0; len],
            fill,
            unit_scale,
        }
    }

    pub fn len(&self) -> usize {
        self.sums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sums.is_empty()
    }

    /// Add one raw sample, aligned with the accumulator's pixels.
    pub fn add<I>(&mut self, raw: I)
    where
        I: IntoIterator<Item = f32>,
    {
        for ((sum, count), v) in self.sums.iter_mut().zip(self.counts.iter_mut()).zip(raw) {
            if self.fill.is_valid(v) {
                *sum += (v * self.unit_scale) as f64;
                *count += 1;
            }
        }
    }

    /// Day-averaged values and the valid sample count of each pixel.
    pub fn finish(self) -> (Vec<f32>, Vec<u32>) {
        let values = self
            .sums
            .iter()
            .zip(&self.counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    SENTINEL
                } else {
                    (sum / count as f64) as f32
                }
            })
            .collect();
        (values, self.counts)
    }
}

/// Pick the subsampled pixels of a row-major slice.
pub fn subsample_slice(slice: &[f32], cols: usize, rows_idx: &[usize], cols_idx: &[usize]) -> Vec<f32> {
    let mut out = Vec::with_capacity(rows_idx.len() * cols_idx.len());
    for &r in rows_idx {
        let row = &slice[r * cols..(r + 1) * cols];
        out.extend(cols_idx.iter().map(|&c| row[c]));
    }
    out
}

/// Read a slice and check it against the grid shape.
pub(crate) async fn read_checked(handle: &dyn GridHandle, time_index: usize) -> Result<Vec<f32>> {
    let slice = handle.read_slice(time_index).await?;
    let expected = handle.latitudes().len() * handle.longitudes().len();
    if slice.len() != expected {
        return Err(PrecipError::upstream(format!(
            "slice {} has {} values, expected {}",
            time_index,
            slice.len(),
            expected
        )));
    }
    Ok(slice)
}

/// Constants a tile computation needs, shared with spawned computations.
#[derive(Debug, Clone, Copy)]
struct TileParams {
    samples_per_day: usize,
    unit_scale: f32,
    display_min: f32,
    display_max: f32,
    fill: FillConvention,
}

/// Bounded LRU cache of [`DailyTile`]s with single-flight misses.
pub struct TileCache {
    tiles: FlightCache<TileKey, Arc<DailyTile>, PrecipError>,
    connections: Arc<ConnectionCache>,
    land_masks: Arc<LandMaskCache>,
    params: TileParams,
}

impl TileCache {
    pub fn new(
        connections: Arc<ConnectionCache>,
        land_masks: Arc<LandMaskCache>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            tiles: FlightCache::bounded(config.tile_cache_capacity),
            connections,
            land_masks,
            params: TileParams {
                samples_per_day: config.samples_per_day,
                unit_scale: config.unit_scale,
                display_min: config.display_min,
                display_max: config.display_max,
                fill: config.fill,
            },
        }
    }

    /// Get a tile, computing it on a miss.
    pub async fn get(&self, key: TileKey) -> Result<Arc<DailyTile>> {
        let connections = Arc::clone(&self.connections);
        let land_masks = Arc::clone(&self.land_masks);
        let params = self.params;

        let (result, lookup) = self
            .tiles
            .get_or_try_insert_tracked(key, move || async move {
                compute_tile(key, &connections, &land_masks, params).await
            })
            .await;

        match lookup {
            Lookup::Hit | Lookup::Joined => {
                metrics::counter!("precip_tile_cache_hits_total").increment(1);
                debug!(tile = %key, "Tile cache hit");
            }
            Lookup::Computed => {
                metrics::counter!("precip_tile_cache_misses_total").increment(1);
            }
        }
        metrics::gauge!("precip_tile_cache_entries").set(self.tiles.len() as f64);

        result
    }

    /// Whether a tile is stored. Does not affect recency or counters.
    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tiles.capacity().unwrap_or_default()
    }

    pub fn clear(&self) {
        self.tiles.clear();
        metrics::gauge!("precip_tile_cache_entries").set(0.0);
    }

    pub fn stats(&self) -> FlightStats {
        self.tiles.stats()
    }
}

async fn compute_tile(
    key: TileKey,
    connections: &ConnectionCache,
    land_masks: &LandMaskCache,
    params: TileParams,
) -> Result<Arc<DailyTile>> {
    let start_time = Instant::now();
    let handle = connections.get(key.period).await?;

    let time_count = handle.time_count();
    let (raw_start, raw_end) = day_range(key.day, params.samples_per_day, time_count)?;
    let total_days = day_count(time_count, params.samples_per_day);

    let full_lats = handle.latitudes();
    let full_lons = handle.longitudes();
    let rows_idx = subsample_indices(full_lats.len(), key.subsample);
    let cols_idx = subsample_indices(full_lons.len(), key.subsample);

    let mut acc = DayAccumulator::new(rows_idx.len() * cols_idx.len(), params.fill, params.unit_scale);
    for t in raw_start..raw_end {
        let slice = read_checked(handle.as_ref(), t).await?;
        acc.add(subsample_slice(&slice, full_lons.len(), &rows_idx, &cols_idx));
    }
    let (mut values, sample_counts) = acc.finish();

    let lats = subsampled_axis(full_lats, key.subsample);
    let lons = subsampled_axis(full_lons, key.subsample);

    if key.apply_mask {
        let mask = land_masks.get(key.subsample).await?;
        if mask.shape() == (lats.len(), lons.len()) {
            for (v, &land) in values.iter_mut().zip(mask.cells()) {
                if !land {
                    *v = SENTINEL;
                }
            }
        } else {
            warn!(
                tile = %key,
                mask_shape = ?mask.shape(),
                grid_shape = ?(lats.len(), lons.len()),
                "Land mask shape mismatch, serving unmasked tile"
            );
        }
    }

    let stats = TileStats::compute(&values, params.display_min, params.display_max);
    let bounds = GridBounds::from_axes(full_lats, full_lons);
    let date = day_date(handle.as_ref(), raw_start, key.period.first_day(), key.day);

    info!(
        tile = %key,
        date = %date,
        samples = raw_end - raw_start,
        valid = stats.valid_count,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Computed daily tile"
    );

    Ok(Arc::new(DailyTile {
        key,
        date,
        grid: Grid { lats, lons, values },
        sample_counts,
        bounds,
        stats,
        raw_start,
        raw_end,
        total_days,
    }))
}
