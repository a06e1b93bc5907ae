//! Open dataset handles, one per period, never evicted.

use std::sync::Arc;
use std::time::Instant;

use precip_common::Period;
use tracing::{debug, info};

use crate::cache::flight::{FlightCache, FlightStats};
use crate::error::{PrecipError, Result};
use crate::source::{GridHandle, GridSource};

/// Caches open [`GridHandle`]s per period.
///
/// The first request for a period opens it; concurrent first requests share
/// that single open. Handles are held until [`ConnectionCache::clear_all`].
pub struct ConnectionCache {
    source: Arc<dyn GridSource>,
    handles: FlightCache<Period, Arc<dyn GridHandle>, PrecipError>,
}

impl ConnectionCache {
    pub fn new(source: Arc<dyn GridSource>) -> Self {
        Self {
            source,
            handles: FlightCache::unbounded(),
        }
    }

    /// Get the open handle for a period, opening it on first use.
    pub async fn get(&self, period: Period) -> Result<Arc<dyn GridHandle>> {
        let source = Arc::clone(&self.source);
        let handle = self
            .handles
            .get_or_try_insert_with(period, move || async move {
                let start = Instant::now();
                let handle = source.open(period).await?;
                info!(
                    period = %period,
                    lats = handle.latitudes().len(),
                    lons = handle.longitudes().len(),
                    times = handle.time_count(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Opened dataset"
                );
                metrics::counter!("precip_connections_opened_total").increment(1);
                Ok(handle)
            })
            .await?;
        metrics::gauge!("precip_connections_open").set(self.open_count() as f64);
        Ok(handle)
    }

    /// Whether a period is currently open.
    pub fn is_open(&self, period: &Period) -> bool {
        self.handles.contains(period)
    }

    /// Number of open handles.
    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    /// Close every handle and empty the map. Returns how many were closed.
    ///
    /// Opens still in progress are awaited and their handles closed too,
    /// since they will never be stored.
    pub async fn clear_all(&self) -> usize {
        let (handles, pending) = self.handles.drain();
        let mut closed = 0;
        for handle in handles {
            handle.close().await;
            closed += 1;
        }
        for open in pending {
            if let Ok(handle) = open.await {
                handle.close().await;
                closed += 1;
            }
        }
        debug!(closed, "Closed all dataset connections");
        metrics::gauge!("precip_connections_open").set(0.0);
        closed
    }

    pub fn stats(&self) -> FlightStats {
        self.handles.stats()
    }
}
