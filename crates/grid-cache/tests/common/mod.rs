//! Shared setup for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use grid_cache::{EngineConfig, GridSource, Period, PrecipEngine};
use test_utils::fixtures::periods::{DEC_2024, JAN_2025, REFERENCE};
use test_utils::{axis, flux, sample_times, slice_with_ocean, FakeDataset, FakeSource};

pub const ROWS: usize = 4;
pub const COLS: usize = 5;

/// Three days of four six-hourly samples.
pub const TIME_COUNT: usize = 12;

/// Reference dataset whose first column is ocean.
pub fn reference_dataset() -> FakeDataset {
    let slice = slice_with_ocean(ROWS, COLS, flux(1.0), &[0]);
    FakeDataset::new(
        axis(-10.0, 1.0, ROWS),
        axis(100.0, 1.0, COLS),
        sample_times(REFERENCE, 4, 6),
        vec![slice; 4],
    )
}

/// Every raw reading of `period` converts to `mm` mm/day.
pub fn uniform_dataset(period: Period, mm: f32) -> FakeDataset {
    FakeDataset::uniform(period, ROWS, COLS, TIME_COUNT, flux(mm))
}

/// Source with the reference period, December 2024 and January 2025.
pub fn standard_source() -> Arc<FakeSource> {
    Arc::new(
        FakeSource::new()
            .with_dataset(REFERENCE, reference_dataset())
            .with_dataset(DEC_2024, uniform_dataset(DEC_2024, 4.0))
            .with_dataset(JAN_2025, uniform_dataset(JAN_2025, 10.0)),
    )
}

pub fn known_periods() -> Vec<Period> {
    vec![DEC_2024, JAN_2025, REFERENCE]
}

pub fn engine(source: &Arc<FakeSource>) -> Arc<PrecipEngine> {
    engine_with(source, EngineConfig::default())
}

pub fn engine_with(source: &Arc<FakeSource>, config: EngineConfig) -> Arc<PrecipEngine> {
    let source: Arc<dyn GridSource> = Arc::clone(source) as Arc<dyn GridSource>;
    Arc::new(PrecipEngine::new(source, config, known_periods()).expect("valid config"))
}
