//! The engine: owns every cache and the period catalog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use precip_common::Period;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::aggregate::{aggregate_stats, mean_of_days};
use crate::cache::daily_tile::day_date;
use crate::cache::{
    day_count, day_range, ConnectionCache, FlightStats, LandMaskCache, RegionMaskCache, TileCache,
};
use crate::catalog::PeriodCatalog;
use crate::config::EngineConfig;
use crate::error::{PrecipError, Result};
use crate::source::GridSource;
use crate::timeseries::{SeriesExtractor, SeriesTarget, TimeSeries};
use crate::types::{AggregateTile, DailyTile, TileKey};

/// One day of a period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayInfo {
    pub index: usize,
    pub date: NaiveDate,
    pub raw_start: usize,
    pub raw_end: usize,
}

/// Point-in-time view of every cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub tiles: FlightStats,
    pub open_connections: usize,
    pub land_masks: usize,
    pub region_masks: usize,
}

impl CacheStatsSnapshot {
    /// Tile cache hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        self.tiles.hit_rate()
    }
}

/// What a clear removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearReport {
    pub tiles: usize,
    pub connections: usize,
    pub land_masks: usize,
    pub region_masks: usize,
}

/// Precipitation tile engine.
///
/// Construct once per process and share behind an `Arc`. Every operation
/// validates its period against the catalog first.
pub struct PrecipEngine {
    config: EngineConfig,
    connections: Arc<ConnectionCache>,
    land_masks: Arc<LandMaskCache>,
    region_masks: RegionMaskCache,
    tiles: TileCache,
    catalog: PeriodCatalog,
}

impl PrecipEngine {
    pub fn new(
        source: Arc<dyn GridSource>,
        config: EngineConfig,
        known_periods: impl IntoIterator<Item = Period>,
    ) -> Result<Self> {
        config.validate().map_err(PrecipError::Config)?;

        let connections = Arc::new(ConnectionCache::new(source));
        let land_masks = Arc::new(LandMaskCache::new(
            Arc::clone(&connections),
            config.reference_period,
            config.fill,
        ));
        let region_masks = RegionMaskCache::with_capacity(config.region_mask_capacity);
        let tiles = TileCache::new(Arc::clone(&connections), Arc::clone(&land_masks), &config);
        let catalog = PeriodCatalog::new(
            known_periods,
            config.reference_period,
            Duration::from_secs(config.discovery_ttl_secs),
            config.discovery_max_probe,
        );

        info!(
            tile_capacity = config.tile_cache_capacity,
            samples_per_day = config.samples_per_day,
            reference = %config.reference_period,
            warm_probe = %config.warm_probe,
            "Precipitation engine initialized"
        );

        Ok(Self {
            config,
            connections,
            land_masks,
            region_masks,
            tiles,
            catalog,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Known and discovered periods.
    pub async fn periods(&self) -> Vec<Period> {
        self.catalog.available(&self.connections).await
    }

    /// Re-run discovery now. Returns the newly found periods.
    pub async fn refresh_periods(&self) -> Vec<Period> {
        self.catalog.refresh(&self.connections).await
    }

    pub async fn validate_period(&self, period: Period) -> Result<()> {
        self.catalog.validate(period, &self.connections).await
    }

    /// Raw sample timestamps of a period.
    pub async fn times(&self, period: Period) -> Result<Vec<NaiveDateTime>> {
        self.validate_period(period).await?;
        let handle = self.connections.get(period).await?;
        Ok(handle.times().to_vec())
    }

    /// Number of days in a period.
    pub async fn day_count(&self, period: Period) -> Result<usize> {
        self.validate_period(period).await?;
        let handle = self.connections.get(period).await?;
        Ok(day_count(handle.time_count(), self.config.samples_per_day))
    }

    /// Every day of a period with its date and raw sample range.
    pub async fn days(&self, period: Period) -> Result<Vec<DayInfo>> {
        self.validate_period(period).await?;
        let handle = self.connections.get(period).await?;
        let spd = self.config.samples_per_day;
        let time_count = handle.time_count();

        (0..day_count(time_count, spd))
            .map(|index| {
                let (raw_start, raw_end) = day_range(index, spd, time_count)?;
                Ok(DayInfo {
                    index,
                    date: day_date(handle.as_ref(), raw_start, period.first_day(), index),
                    raw_start,
                    raw_end,
                })
            })
            .collect()
    }

    /// Daily tile for (period, day, subsample, mask flag).
    pub async fn tile(
        &self,
        period: Period,
        day: usize,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<Arc<DailyTile>> {
        self.validate_period(period).await?;
        self.tiles.get(TileKey::new(period, day, subsample, apply_mask)).await
    }

    /// Per-pixel mean of days `start_day..=end_day`.
    ///
    /// Any failing day aborts the whole aggregate.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn aggregate(
        &self,
        period: Period,
        start_day: usize,
        end_day: usize,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<AggregateTile> {
        let days = self.day_count(period).await?;
        if end_day >= days {
            return Err(PrecipError::invalid_index(end_day, days));
        }
        if start_day > end_day {
            return Err(PrecipError::invalid_index(start_day, end_day + 1));
        }

        let mut tiles = Vec::with_capacity(end_day - start_day + 1);
        for day in start_day..=end_day {
            tiles.push(self.tiles.get(TileKey::new(period, day, subsample, apply_mask)).await?);
        }

        let (grid, day_counts) = mean_of_days(&tiles)?;
        let stats = aggregate_stats(&grid, self.config.display_min, self.config.display_max);
        let first = &tiles[0];
        let last = &tiles[tiles.len() - 1];

        Ok(AggregateTile {
            period,
            start_day,
            end_day,
            bounds: first.bounds,
            raw_start: first.raw_start,
            raw_end: last.raw_end,
            total_days: days,
            grid,
            day_counts,
            stats,
        })
    }

    /// Series of one period.
    pub async fn time_series(
        &self,
        period: Period,
        target: &SeriesTarget,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<TimeSeries> {
        self.time_series_multi(&[period], target, subsample, apply_mask).await
    }

    /// Series over several periods, concatenated in period order.
    pub async fn time_series_multi(
        &self,
        periods: &[Period],
        target: &SeriesTarget,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<TimeSeries> {
        let mut ordered = periods.to_vec();
        ordered.sort();
        ordered.dedup();

        for &period in &ordered {
            self.validate_period(period).await?;
        }

        let extractor = SeriesExtractor {
            connections: &self.connections,
            tiles: &self.tiles,
            land_masks: &self.land_masks,
            region_masks: &self.region_masks,
            config: &self.config,
        };

        let mut segments = Vec::with_capacity(ordered.len());
        for period in ordered {
            segments.push(extractor.segment(period, target, subsample, apply_mask).await?);
        }

        Ok(TimeSeries {
            target: target.describe(),
            subsample: subsample.max(1),
            apply_mask,
            segments,
        })
    }

    /// Warm every tile of a period in increasing day order.
    ///
    /// Stops at the first failing day. Returns the number of tiles warmed.
    pub async fn prefetch_period(
        &self,
        period: Period,
        subsample: usize,
        apply_mask: bool,
    ) -> Result<usize> {
        let days = self.day_count(period).await?;
        let start = Instant::now();

        for day in 0..days {
            if let Err(e) = self.tiles.get(TileKey::new(period, day, subsample, apply_mask)).await {
                warn!(period = %period, day, error = %e, "Prefetch aborted");
                return Err(e);
            }
        }

        info!(
            period = %period,
            days,
            subsample,
            apply_mask,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Prefetched period"
        );
        Ok(days)
    }

    /// Run [`PrecipEngine::prefetch_period`] on a background task.
    pub fn spawn_prefetch(
        self: &Arc<Self>,
        period: Period,
        subsample: usize,
        apply_mask: bool,
    ) -> JoinHandle<Result<usize>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.prefetch_period(period, subsample, apply_mask).await })
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            tiles: self.tiles.stats(),
            open_connections: self.connections.open_count(),
            land_masks: self.land_masks.len(),
            region_masks: self.region_masks.len(),
        }
    }

    /// Drop every cached tile and mask and close every connection.
    pub async fn clear(&self) -> ClearReport {
        let report = ClearReport {
            tiles: self.tiles.len(),
            land_masks: self.land_masks.len(),
            region_masks: self.region_masks.len(),
            connections: 0,
        };
        self.tiles.clear();
        self.land_masks.clear();
        self.region_masks.clear();
        let connections = self.connections.clear_all().await;

        info!(tiles = report.tiles, connections, "Cleared caches");
        ClearReport {
            connections,
            ..report
        }
    }
}
