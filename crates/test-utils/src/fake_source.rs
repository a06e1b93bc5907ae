//! In-memory Grid Source with call counters and artificial latency.
//!
//! Tests build one [`FakeDataset`] per period, register them on a
//! [`FakeSource`], and then check the counters to prove that caching and
//! single-flight actually avoided upstream work.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use grid_cache::{GridHandle, GridSource, PrecipError, Result};
use parking_lot::Mutex;
use precip_common::Period;

use crate::generators::{axis, sample_times};

/// One period's data held in memory.
pub struct FakeDataset {
    lats: Vec<f64>,
    lons: Vec<f64>,
    times: Vec<NaiveDateTime>,
    slices: Vec<Vec<f32>>,
    read_delay: Option<Duration>,
    missing_variable: bool,
    reads: AtomicUsize,
    closed: AtomicBool,
}

impl FakeDataset {
    /// Dataset from explicit axes and slices. Each slice is row-major.
    pub fn new(
        lats: Vec<f64>,
        lons: Vec<f64>,
        times: Vec<NaiveDateTime>,
        slices: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            lats,
            lons,
            times,
            slices,
            read_delay: None,
            missing_variable: false,
            reads: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// `rows` x `cols` grid with `time_count` six-hourly samples where
    /// `value(t, row, col)` gives every raw reading.
    pub fn from_fn<F>(period: Period, rows: usize, cols: usize, time_count: usize, value: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let slices = (0..time_count)
            .map(|t| {
                let mut slice = Vec::with_capacity(rows * cols);
                for r in 0..rows {
                    for c in 0..cols {
                        slice.push(value(t, r, c));
                    }
                }
                slice
            })
            .collect();
        Self::new(
            axis(-10.0, 1.0, rows),
            axis(100.0, 1.0, cols),
            sample_times(period, time_count, 6),
            slices,
        )
    }

    /// Every reading equal to `raw`.
    pub fn uniform(period: Period, rows: usize, cols: usize, time_count: usize, raw: f32) -> Self {
        Self::from_fn(period, rows, cols, time_count, |_, _, _| raw)
    }

    /// Sleep before every slice read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Fail every read with `MissingVariable`.
    pub fn without_variable(mut self) -> Self {
        self.missing_variable = true;
        self
    }

    /// Slice reads so far, including failed ones.
    pub fn read_calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GridHandle for FakeDataset {
    fn latitudes(&self) -> &[f64] {
        &self.lats
    }

    fn longitudes(&self) -> &[f64] {
        &self.lons
    }

    fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    fn time_count(&self) -> usize {
        self.slices.len()
    }

    async fn read_slice(&self, time_index: usize) -> Result<Vec<f32>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if self.missing_variable {
            return Err(PrecipError::missing_variable("pr"));
        }
        self.slices
            .get(time_index)
            .cloned()
            .ok_or_else(|| PrecipError::invalid_index(time_index, self.slices.len()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A Grid Source over registered [`FakeDataset`]s.
///
/// Opening an unregistered or failing period returns `UpstreamUnavailable`.
#[derive(Default)]
pub struct FakeSource {
    datasets: Mutex<HashMap<Period, Arc<FakeDataset>>>,
    failing: Mutex<HashSet<Period>>,
    open_delay: Option<Duration>,
    opens: AtomicUsize,
    opens_by_period: Mutex<HashMap<Period, usize>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, period: Period, dataset: FakeDataset) -> Self {
        self.add_dataset(period, dataset);
        self
    }

    /// Register a dataset on a source that is already shared.
    pub fn add_dataset(&self, period: Period, dataset: FakeDataset) {
        self.datasets.lock().insert(period, Arc::new(dataset));
    }

    /// Sleep before every open.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Make opens of `period` fail until [`FakeSource::recover`] is called.
    pub fn fail(&self, period: Period) {
        self.failing.lock().insert(period);
    }

    pub fn recover(&self, period: Period) {
        self.failing.lock().remove(&period);
    }

    pub fn dataset(&self, period: Period) -> Option<Arc<FakeDataset>> {
        self.datasets.lock().get(&period).cloned()
    }

    /// Open attempts so far, including failed ones.
    pub fn open_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn open_calls_for(&self, period: Period) -> usize {
        self.opens_by_period.lock().get(&period).copied().unwrap_or(0)
    }

    /// Slice reads across every dataset.
    pub fn read_calls(&self) -> usize {
        self.datasets.lock().values().map(|d| d.read_calls()).sum()
    }
}

#[async_trait]
impl GridSource for FakeSource {
    async fn open(&self, period: Period) -> Result<Arc<dyn GridHandle>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.opens_by_period.lock().entry(period).or_insert(0) += 1;

        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(&period) {
            return Err(PrecipError::upstream(format!("{} is failing", period)));
        }

        match self.dataset(period) {
            Some(dataset) => Ok(dataset as Arc<dyn GridHandle>),
            None => Err(PrecipError::upstream(format!("no dataset for {}", period))),
        }
    }
}
