//! Time series strategies, aggregation and prefetch.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use grid_cache::{
    aggregate_series, AggregateMode, EngineConfig, PrecipError, Region, SeriesStrategy,
    SeriesTarget, WarmProbe, SENTINEL,
};
use test_utils::fixtures::periods::{DEC_2024, JAN_2025};
use test_utils::fixtures::regions;
use test_utils::{assert_approx_eq, flux, FakeDataset, FakeSource};

fn point() -> SeriesTarget {
    SeriesTarget::Point {
        lat: -8.9,
        lon: 102.2,
    }
}

fn covering_region() -> SeriesTarget {
    SeriesTarget::Region {
        name: "box".to_string(),
        region: Region::from_geojson(&regions::covering_box()).unwrap(),
    }
}

/// Each column rains `col` mm/day and day `d` adds `d` mm/day.
fn column_source() -> Arc<FakeSource> {
    let data = FakeDataset::from_fn(JAN_2025, ROWS, COLS, TIME_COUNT, |t, _, c| {
        flux(c as f32 + (t / 4) as f32)
    });
    Arc::new(
        FakeSource::new()
            .with_dataset(test_utils::fixtures::periods::REFERENCE, reference_dataset())
            .with_dataset(JAN_2025, data),
    )
}

// ============================================================================
// Strategy selection
// ============================================================================

#[tokio::test]
async fn test_membership_probe_cold_then_warm() {
    let source = standard_source();
    let engine = engine(&source);

    let cold = engine.time_series(JAN_2025, &point(), 1, false).await.unwrap();
    assert_eq!(cold.strategy(), Some(SeriesStrategy::Direct));
    // the direct path leaves the tile cache untouched
    assert_eq!(engine.stats().tiles.entries, 0);

    let warmed = engine.prefetch_period(JAN_2025, 1, false).await.unwrap();
    assert_eq!(warmed, 3);

    let reads = source.read_calls();
    let warm = engine.time_series(JAN_2025, &point(), 1, false).await.unwrap();
    assert_eq!(warm.strategy(), Some(SeriesStrategy::Cache));
    assert_eq!(source.read_calls(), reads);

    assert_eq!(cold.points(), warm.points());
}

#[tokio::test]
async fn test_latency_probe_uses_threshold() {
    let data = uniform_dataset(JAN_2025, 10.0).with_read_delay(Duration::from_millis(25));
    let source = Arc::new(FakeSource::new().with_dataset(JAN_2025, data));
    let config = EngineConfig {
        warm_probe: WarmProbe::Latency,
        warm_threshold_ms: 20,
        ..EngineConfig::default()
    };
    let engine = engine_with(&source, config);

    // probing computes the last day, which is slow
    let cold = engine.time_series(JAN_2025, &point(), 1, false).await.unwrap();
    assert_eq!(cold.strategy(), Some(SeriesStrategy::Direct));
    assert_eq!(engine.stats().tiles.entries, 1);

    // the last day is now cached, so the probe is fast
    let warm = engine.time_series(JAN_2025, &point(), 1, false).await.unwrap();
    assert_eq!(warm.strategy(), Some(SeriesStrategy::Cache));
    assert_eq!(engine.stats().tiles.entries, 3);
    assert_eq!(cold.points(), warm.points());
}

#[tokio::test]
async fn test_background_prefetch_warms_period() {
    let source = standard_source();
    let engine = engine(&source);

    let handle = engine.spawn_prefetch(JAN_2025, 2, true);
    assert_eq!(handle.await.unwrap().unwrap(), 3);
    assert_eq!(engine.stats().tiles.entries, 3);

    let series = engine.time_series(JAN_2025, &point(), 2, true).await.unwrap();
    assert_eq!(series.strategy(), Some(SeriesStrategy::Cache));
}

#[tokio::test]
async fn test_prefetch_stops_at_first_error() {
    let data = uniform_dataset(JAN_2025, 1.0).without_variable();
    let source = Arc::new(FakeSource::new().with_dataset(JAN_2025, data));
    let engine = engine(&source);

    let err = engine.prefetch_period(JAN_2025, 1, false).await.unwrap_err();
    assert!(matches!(err, PrecipError::MissingVariable(_)));
    // only the first day was attempted
    assert_eq!(source.read_calls(), 1);
}

// ============================================================================
// Point and region values
// ============================================================================

#[tokio::test]
async fn test_point_series_values() {
    let source = column_source();
    let engine = engine(&source);

    // nearest pixel to (-8.9, 102.2) is row 1, col 2
    let series = engine.time_series(JAN_2025, &point(), 1, false).await.unwrap();
    let points = series.points();
    assert_eq!(points.len(), 3);
    for (day, p) in points.iter().enumerate() {
        assert_approx_eq!(p.value, 2.0 + day as f32, 1e-4);
        assert_eq!(p.sample_count, 4);
        assert_eq!((p.raw_start, p.raw_end), (day * 4, day * 4 + 4));
    }
    assert_eq!(points[0].date.to_string(), "2025-01-01");
}

#[tokio::test]
async fn test_region_series_direct_matches_cache() {
    let source = column_source();
    let engine = engine(&source);

    let direct = engine.time_series(JAN_2025, &covering_region(), 1, false).await.unwrap();
    assert_eq!(direct.strategy(), Some(SeriesStrategy::Direct));

    engine.prefetch_period(JAN_2025, 1, false).await.unwrap();
    let cached = engine.time_series(JAN_2025, &covering_region(), 1, false).await.unwrap();
    assert_eq!(cached.strategy(), Some(SeriesStrategy::Cache));

    let points = direct.points();
    // columns 0..5 average to 2
    assert_approx_eq!(points[0].value, 2.0, 1e-4);
    assert_eq!(points[0].sample_count, (ROWS * COLS) as u32);
    for (a, b) in points.iter().zip(cached.points()) {
        assert_approx_eq!(a.value, b.value, 1e-5);
        assert_eq!(a.sample_count, b.sample_count);
    }

    // one region mask, shared by both paths
    assert_eq!(engine.stats().region_masks, 1);
}

#[tokio::test]
async fn test_region_series_with_land_mask() {
    let source = column_source();
    let engine = engine(&source);

    let series = engine.time_series(JAN_2025, &covering_region(), 1, true).await.unwrap();
    let first = series.points()[0];
    // ocean column 0 is excluded: columns 1..5 average to 2.5
    assert_approx_eq!(first.value, 2.5, 1e-4);
    assert_eq!(first.sample_count, (ROWS * (COLS - 1)) as u32);
}

#[tokio::test]
async fn test_point_on_ocean_is_sentinel() {
    let source = standard_source();
    let engine = engine(&source);
    let ocean = SeriesTarget::Point {
        lat: -9.0,
        lon: 100.0,
    };

    let direct = engine.time_series(JAN_2025, &ocean, 1, true).await.unwrap();
    engine.prefetch_period(JAN_2025, 1, true).await.unwrap();
    let cached = engine.time_series(JAN_2025, &ocean, 1, true).await.unwrap();
    assert_eq!(cached.strategy(), Some(SeriesStrategy::Cache));

    for series in [direct, cached] {
        for p in series.points() {
            assert_eq!(p.value, SENTINEL);
            assert_eq!(p.sample_count, 0);
        }
    }
}

#[tokio::test]
async fn test_degenerate_region_yields_sentinel() {
    let source = standard_source();
    let engine = engine(&source);
    let target = SeriesTarget::Region {
        name: "sliver".to_string(),
        region: Region::from_geojson(&regions::degenerate()).unwrap(),
    };

    let series = engine.time_series(JAN_2025, &target, 1, false).await.unwrap();
    assert!(series.points().iter().all(|p| p.value == SENTINEL));
}

#[tokio::test]
async fn test_multi_period_series_in_period_order() {
    let source = standard_source();
    let engine = engine(&source);

    let series = engine
        .time_series_multi(&[JAN_2025, DEC_2024], &point(), 1, false)
        .await
        .unwrap();
    assert_eq!(series.segments.len(), 2);
    assert_eq!(series.segments[0].period, DEC_2024);
    assert_eq!(series.segments[1].period, JAN_2025);

    let points = series.points();
    assert_eq!(points.len(), 6);
    assert_approx_eq!(points[0].value, 4.0, 1e-4);
    assert_approx_eq!(points[5].value, 10.0, 1e-3);
    assert!(points.windows(2).all(|w| w[0].date < w[1].date));
}

#[tokio::test]
async fn test_dekadal_summary_of_series() {
    let data = FakeDataset::from_fn(JAN_2025, 2, 2, 40, |t, _, _| flux((t / 4 + 1) as f32));
    let source = Arc::new(FakeSource::new().with_dataset(JAN_2025, data));
    let engine = engine(&source);

    let target = SeriesTarget::Point {
        lat: -10.0,
        lon: 100.0,
    };
    let series = engine.time_series(JAN_2025, &target, 1, false).await.unwrap();
    let dekads = aggregate_series(&series.points(), AggregateMode::Dekadal);
    assert_eq!(dekads.len(), 1);
    assert_approx_eq!(dekads[0].sum, 55.0, 1e-3);
    assert_approx_eq!(dekads[0].average, 5.5, 1e-4);
    assert_eq!(dekads[0].day_count, 10);
    assert_eq!((dekads[0].raw_start, dekads[0].raw_end), (0, 40));
}

// ============================================================================
// Multi-day grids
// ============================================================================

#[tokio::test]
async fn test_aggregate_averages_days() {
    let source = column_source();
    let engine = engine(&source);

    let agg = engine.aggregate(JAN_2025, 0, 2, 1, false).await.unwrap();
    // column c over days 0..3 averages to c + 1
    assert_approx_eq!(agg.grid.get(0, 0).unwrap(), 1.0, 1e-4);
    assert_approx_eq!(agg.grid.get(3, 4).unwrap(), 5.0, 1e-4);
    assert!(agg.day_counts.iter().all(|&n| n == 3));
    assert_eq!((agg.raw_start, agg.raw_end), (0, 12));
    assert_eq!(agg.total_days, 3);
    assert_eq!(agg.stats.display_max, 100.0);
}

#[tokio::test]
async fn test_aggregate_masked_pixels_stay_sentinel() {
    let source = column_source();
    let engine = engine(&source);

    let agg = engine.aggregate(JAN_2025, 0, 1, 1, true).await.unwrap();
    assert_eq!(agg.grid.get(2, 0), Some(SENTINEL));
    assert_eq!(agg.day_counts[2 * COLS], 0);
}

#[tokio::test]
async fn test_aggregate_range_checked() {
    let source = standard_source();
    let engine = engine(&source);

    assert_eq!(
        engine.aggregate(JAN_2025, 0, 3, 1, false).await.unwrap_err(),
        PrecipError::InvalidIndex { index: 3, len: 3 }
    );
    assert!(engine.aggregate(JAN_2025, 2, 1, 1, false).await.is_err());
}

#[tokio::test]
async fn test_aggregate_aborts_on_failing_day() {
    let data = uniform_dataset(JAN_2025, 1.0).without_variable();
    let source = Arc::new(FakeSource::new().with_dataset(JAN_2025, data));
    let engine = engine(&source);

    let err = engine.aggregate(JAN_2025, 0, 2, 1, false).await.unwrap_err();
    assert!(matches!(err, PrecipError::MissingVariable(_)));
}
