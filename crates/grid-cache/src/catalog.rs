//! Known and discovered dataset periods.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use precip_common::Period;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::ConnectionCache;
use crate::error::{PrecipError, Result};

#[derive(Debug, Default)]
struct Discovery {
    periods: BTreeSet<Period>,
    last_run: Option<Instant>,
}

/// The set of periods requests may name.
///
/// Starts from a static list. Later periods are found by opening successive
/// months after the latest one until an open fails, assuming there are no
/// gaps. Confirmed periods are kept for the lifetime of the catalog; the
/// probe itself is repeated once `ttl` has passed.
pub struct PeriodCatalog {
    known: BTreeSet<Period>,
    /// First candidate when no period is known.
    seed: Period,
    ttl: Duration,
    max_probe: usize,
    discovery: Mutex<Discovery>,
}

impl PeriodCatalog {
    pub fn new(
        known: impl IntoIterator<Item = Period>,
        seed: Period,
        ttl: Duration,
        max_probe: usize,
    ) -> Self {
        Self {
            known: known.into_iter().collect(),
            seed,
            ttl,
            max_probe,
            discovery: Mutex::new(Discovery::default()),
        }
    }

    /// The static list.
    pub fn known(&self) -> Vec<Period> {
        self.known.iter().copied().collect()
    }

    /// Known and discovered periods, in chronological order. Re-probes when
    /// the last discovery is older than the TTL.
    pub async fn available(&self, connections: &ConnectionCache) -> Vec<Period> {
        let mut discovery = self.discovery.lock().await;
        let stale = discovery
            .last_run
            .map_or(true, |at| at.elapsed() >= self.ttl);
        if stale {
            self.probe(&mut discovery, connections).await;
        }
        self.known.union(&discovery.periods).copied().collect()
    }

    /// Probe now regardless of the TTL. Returns newly found periods.
    pub async fn refresh(&self, connections: &ConnectionCache) -> Vec<Period> {
        let mut discovery = self.discovery.lock().await;
        self.probe(&mut discovery, connections).await
    }

    /// `InvalidPeriod` unless the period is known or discovered.
    pub async fn validate(&self, period: Period, connections: &ConnectionCache) -> Result<()> {
        if self.known.contains(&period) {
            return Ok(());
        }
        if self.available(connections).await.contains(&period) {
            return Ok(());
        }
        Err(PrecipError::InvalidPeriod(period.to_string()))
    }

    async fn probe(&self, discovery: &mut Discovery, connections: &ConnectionCache) -> Vec<Period> {
        let latest = self.known.iter().chain(&discovery.periods).max().copied();
        let mut candidate = latest.map_or(self.seed, |p| p.next());
        let mut found = Vec::new();

        for _ in 0..self.max_probe {
            match connections.get(candidate).await {
                Ok(_) => {
                    debug!(period = %candidate, "Discovered period");
                    discovery.periods.insert(candidate);
                    found.push(candidate);
                    candidate = candidate.next();
                }
                Err(e) => {
                    debug!(period = %candidate, error = %e, "Discovery stopped");
                    break;
                }
            }
        }

        if found.len() == self.max_probe && self.max_probe > 0 {
            warn!(max_probe = self.max_probe, "Discovery hit its probe limit");
        }
        if let Some(latest) = found.last() {
            info!(count = found.len(), latest = %latest, "Discovered new periods");
        }

        discovery.last_run = Some(Instant::now());
        found
    }
}
