//! Polygon inclusion masks over a coordinate mesh.

use std::sync::Arc;
use std::time::Instant;

use precip_common::{Region, RegionGeometry};
use serde::Serialize;
use tracing::info;

use crate::cache::flight::{FlightCache, FlightStats};
use crate::error::{PrecipError, Result};
use crate::types::Mask;

/// Region masks are keyed by name and grid dimensions, so the same region at
/// another resolution is a separate entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RegionKey {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
}

impl RegionKey {
    pub fn new(name: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            name: name.into(),
            rows,
            cols,
        }
    }
}

impl std::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}x{}", self.name, self.rows, self.cols)
    }
}

/// Region masks held by [`RegionMaskCache::new`].
pub const DEFAULT_REGION_MASK_CAPACITY: usize = 64;

/// Caches region masks. Each is built once and reused for every day of a
/// series or aggregation. Ad-hoc geometries each get their own entry, so
/// the cache is bounded and evicts the least recently used mask.
pub struct RegionMaskCache {
    masks: FlightCache<RegionKey, Arc<Mask>, PrecipError>,
}

impl Default for RegionMaskCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionMaskCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGION_MASK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            masks: FlightCache::bounded(capacity),
        }
    }

    /// Mask of the mesh points of (`lats` x `lons`) inside `region`.
    ///
    /// The mesh scan runs on the blocking pool.
    pub async fn get(
        &self,
        name: &str,
        lats: &[f64],
        lons: &[f64],
        region: &Region,
    ) -> Result<Arc<Mask>> {
        let key = RegionKey::new(name, lats.len(), lons.len());
        let lats = lats.to_vec();
        let lons = lons.to_vec();
        let region = region.clone();
        let log_key = key.clone();

        self.masks
            .get_or_try_insert_with(key, move || async move {
                let start = Instant::now();
                let mask = tokio::task::spawn_blocking(move || {
                    let prepared = region.prepare();
                    build_region_mask(&lats, &lons, &prepared)
                })
                .await?;
                info!(
                    region = %log_key,
                    inside = mask.count(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Region mask built"
                );
                Ok(Arc::new(mask))
            })
            .await
    }

    pub fn contains(&self, key: &RegionKey) -> bool {
        self.masks.contains(key)
    }

    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn clear(&self) {
        self.masks.clear();
    }

    pub fn stats(&self) -> FlightStats {
        self.masks.stats()
    }
}

/// Test every (lat, lon) mesh point against a geometry.
///
/// Rows outside the geometry's latitude range are skipped wholesale, and
/// points outside its bounds never reach the exact test.
pub fn build_region_mask<G: RegionGeometry + ?Sized>(lats: &[f64], lons: &[f64], geometry: &G) -> Mask {
    let rows = lats.len();
    let cols = lons.len();
    let mut cells = vec![false; rows * cols];

    let bounds = geometry.bounds();
    if bounds.is_empty() {
        return Mask::new(rows, cols, cells);
    }

    for (r, &lat) in lats.iter().enumerate() {
        if lat < bounds.min_y || lat > bounds.max_y {
            continue;
        }
        let row = &mut cells[r * cols..(r + 1) * cols];
        for (c, &lon) in lons.iter().enumerate() {
            if lon < bounds.min_x || lon > bounds.max_x {
                continue;
            }
            row[c] = geometry.contains(lon, lat);
        }
    }

    Mask::new(rows, cols, cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use precip_common::Polygon;

    #[test]
    fn test_build_region_mask_partial() {
        let lats = vec![-2.0, -1.0, 0.0, 1.0];
        let lons = vec![100.0, 101.0, 102.0];
        let region = Region::new(vec![Polygon::rectangle(100.5, -1.5, 102.5, 0.5)]).prepare();

        let mask = build_region_mask(&lats, &lons, &region);
        assert_eq!(mask.shape(), (4, 3));
        assert_eq!(
            mask.cells(),
            &[
                false, false, false, //
                false, true, true, //
                false, true, true, //
                false, false, false,
            ]
        );
    }

    #[test]
    fn test_build_region_mask_degenerate() {
        let region = Region::new(vec![Polygon::new(vec![(100.0, 0.0), (101.0, 1.0)])]).prepare();
        let mask = build_region_mask(&[0.0, 0.5], &[100.0, 100.5], &region);
        assert!(mask.none());
    }
}
