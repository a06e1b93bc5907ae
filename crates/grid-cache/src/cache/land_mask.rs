//! Land/ocean masks derived from the reference period.

use std::sync::Arc;

use precip_common::Period;
use tracing::info;

use crate::cache::connection::ConnectionCache;
use crate::cache::flight::{FlightCache, FlightStats};
use crate::error::{PrecipError, Result};
use crate::source::FillConvention;
use crate::types::{subsample_indices, Mask};

/// Caches one land mask per subsampling factor.
///
/// Masks always come from the first time slice of the reference period,
/// whichever period is being served: the reference period has a complete
/// land/ocean boundary while others may carry corrupted validity flags.
pub struct LandMaskCache {
    connections: Arc<ConnectionCache>,
    reference: Period,
    fill: FillConvention,
    masks: FlightCache<usize, Arc<Mask>, PrecipError>,
}

impl LandMaskCache {
    pub fn new(connections: Arc<ConnectionCache>, reference: Period, fill: FillConvention) -> Self {
        Self {
            connections,
            reference,
            fill,
            masks: FlightCache::unbounded(),
        }
    }

    pub fn reference_period(&self) -> Period {
        self.reference
    }

    /// Land mask at a subsampling factor, computed at most once per factor.
    pub async fn get(&self, subsample: usize) -> Result<Arc<Mask>> {
        let subsample = subsample.max(1);
        let connections = Arc::clone(&self.connections);
        let reference = self.reference;
        let fill = self.fill;

        self.masks
            .get_or_try_insert_with(subsample, move || async move {
                let handle = connections.get(reference).await?;
                if handle.time_count() == 0 {
                    return Err(PrecipError::invalid_index(0, 0));
                }

                let slice = handle.read_slice(0).await?;
                let rows = handle.latitudes().len();
                let cols = handle.longitudes().len();
                if slice.len() != rows * cols {
                    return Err(PrecipError::upstream(format!(
                        "reference slice has {} values, expected {}x{}",
                        slice.len(),
                        rows,
                        cols
                    )));
                }

                let mask = build_land_mask(&slice, rows, cols, subsample, &fill);
                info!(
                    reference = %reference,
                    subsample,
                    land = mask.count(),
                    total = mask.rows() * mask.cols(),
                    "Land mask loaded"
                );
                Ok(Arc::new(mask))
            })
            .await
    }

    /// Number of cached masks.
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

/// A pixel is land iff its raw reading satisfies the fill convention.
pub fn build_land_mask(
    slice: &[f32],
    rows: usize,
    cols: usize,
    subsample: usize,
    fill: &FillConvention,
) -> Mask {
    let row_idx = subsample_indices(rows, subsample);
    let col_idx = subsample_indices(cols, subsample);

    let mut cells = Vec::with_capacity(row_idx.len() * col_idx.len());
    for &r in &row_idx {
        for &c in &col_idx {
            cells.push(fill.is_valid(slice[r * cols + c]));
        }
    }
    Mask::new(row_idx.len(), col_idx.len(), cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_land_mask_excludes_fill() {
        // 2x3 grid: ocean fill on the left column, negative fill bottom right
        let slice = vec![-9.0e33, 0.0, 1.0e-5, 9.96e36, 2.0e-5, -9.0e33];
        let mask = build_land_mask(&slice, 2, 3, 1, &FillConvention::default());
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.cells(), &[false, true, true, false, true, false]);
    }

    #[test]
    fn test_build_land_mask_subsampled() {
        let slice: Vec<f32> = (0..16).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mask = build_land_mask(&slice, 4, 4, 2, &FillConvention::default());
        assert_eq!(mask.shape(), (2, 2));
        // columns 0 and 2 are even indices in every row
        assert!(mask.all());
    }
}
