//! Binary tile frames.
//!
//! Layout, all little-endian:
//!
//! ```text
//! offset  size            field
//! 0       4 x i32         lat_count, lon_count, index, total
//! 16      9 x f32         min_lat, max_lat, min_lon, max_lon,
//!                         display_min, display_max, mean, actual_min, actual_max
//! 52      4 x lat_count   latitudes  (f32)
//!         4 x lon_count   longitudes (f32)
//!         4 x lat x lon   values     (f32, row-major)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::types::{AggregateTile, DailyTile, GridBounds, TileStats};

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 4 * 4 + 9 * 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("frame length mismatch: header implies {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("negative count in header: {0}")]
    NegativeCount(i32),
}

/// Fixed header of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameHeader {
    pub lat_count: i32,
    pub lon_count: i32,
    /// Requested day (or start day of an aggregate).
    pub index: i32,
    /// Days in the period.
    pub total: i32,
    pub min_lat: f32,
    pub max_lat: f32,
    pub min_lon: f32,
    pub max_lon: f32,
    pub display_min: f32,
    pub display_max: f32,
    pub mean: f32,
    pub actual_min: f32,
    pub actual_max: f32,
}

impl FrameHeader {
    fn new(
        lat: usize,
        lon: usize,
        index: usize,
        total: usize,
        bounds: &GridBounds,
        stats: &TileStats,
    ) -> Self {
        Self {
            lat_count: lat as i32,
            lon_count: lon as i32,
            index: index as i32,
            total: total as i32,
            min_lat: bounds.min_lat as f32,
            max_lat: bounds.max_lat as f32,
            min_lon: bounds.min_lon as f32,
            max_lon: bounds.max_lon as f32,
            display_min: stats.display_min,
            display_max: stats.display_max,
            mean: stats.mean,
            actual_min: stats.actual_min,
            actual_max: stats.actual_max,
        }
    }
}

/// A header plus coordinate and value arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct TileFrame {
    pub header: FrameHeader,
    pub lats: Vec<f32>,
    pub lons: Vec<f32>,
    pub values: Vec<f32>,
}

/// Total byte length of a frame with the given grid dimensions.
pub fn encoded_len(lat_count: usize, lon_count: usize) -> usize {
    HEADER_LEN + 4 * (lat_count + lon_count + lat_count * lon_count)
}

/// [`encoded_len`] for untrusted dimensions; `None` if it overflows.
pub fn checked_encoded_len(lat_count: usize, lon_count: usize) -> Option<usize> {
    lat_count
        .checked_mul(lon_count)?
        .checked_add(lat_count)?
        .checked_add(lon_count)?
        .checked_mul(4)?
        .checked_add(HEADER_LEN)
}

impl TileFrame {
    pub fn from_tile(tile: &DailyTile) -> Self {
        let grid = &tile.grid;
        Self {
            header: FrameHeader::new(
                grid.rows(),
                grid.cols(),
                tile.key.day,
                tile.total_days,
                &tile.bounds,
                &tile.stats,
            ),
            lats: grid.lats.iter().map(|&v| v as f32).collect(),
            lons: grid.lons.iter().map(|&v| v as f32).collect(),
            values: grid.values.clone(),
        }
    }

    pub fn from_aggregate(tile: &AggregateTile) -> Self {
        let grid = &tile.grid;
        Self {
            header: FrameHeader::new(
                grid.rows(),
                grid.cols(),
                tile.start_day,
                tile.total_days,
                &tile.bounds,
                &tile.stats,
            ),
            lats: grid.lats.iter().map(|&v| v as f32).collect(),
            lons: grid.lons.iter().map(|&v| v as f32).collect(),
            values: grid.values.clone(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        encoded_len(self.lats.len(), self.lons.len())
    }

    pub fn encode(&self) -> Bytes {
        let h = &self.header;
        let mut buf = BytesMut::with_capacity(self.encoded_len());

        buf.put_i32_le(h.lat_count);
        buf.put_i32_le(h.lon_count);
        buf.put_i32_le(h.index);
        buf.put_i32_le(h.total);
        for v in [
            h.min_lat,
            h.max_lat,
            h.min_lon,
            h.max_lon,
            h.display_min,
            h.display_max,
            h.mean,
            h.actual_min,
            h.actual_max,
        ] {
            buf.put_f32_le(v);
        }

        for &v in self.lats.iter().chain(&self.lons).chain(&self.values) {
            buf.put_f32_le(v);
        }

        buf.freeze()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                needed: HEADER_LEN,
                available: data.len(),
            });
        }

        let mut buf = data;
        let lat_count = buf.get_i32_le();
        let lon_count = buf.get_i32_le();
        let index = buf.get_i32_le();
        let total = buf.get_i32_le();

        for count in [lat_count, lon_count] {
            if count < 0 {
                return Err(CodecError::NegativeCount(count));
            }
        }

        let header = FrameHeader {
            lat_count,
            lon_count,
            index,
            total,
            min_lat: buf.get_f32_le(),
            max_lat: buf.get_f32_le(),
            min_lon: buf.get_f32_le(),
            max_lon: buf.get_f32_le(),
            display_min: buf.get_f32_le(),
            display_max: buf.get_f32_le(),
            mean: buf.get_f32_le(),
            actual_min: buf.get_f32_le(),
            actual_max: buf.get_f32_le(),
        };

        let (nlat, nlon) = (lat_count as usize, lon_count as usize);
        let expected = checked_encoded_len(nlat, nlon).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(CodecError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut read = |n: usize| -> Vec<f32> { (0..n).map(|_| buf.get_f32_le()).collect() };
        let lats = read(nlat);
        let lons = read(nlon);
        let values = read(nlat * nlon);

        Ok(Self {
            header,
            lats,
            lons,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> TileFrame {
        TileFrame {
            header: FrameHeader {
                lat_count: 3,
                lon_count: 2,
                index: 4,
                total: 31,
                min_lat: -11.0,
                max_lat: 6.0,
                min_lon: 95.0,
                max_lon: 141.0,
                display_min: 0.0,
                display_max: 100.0,
                mean: 3.25,
                actual_min: 0.0,
                actual_max: 17.5,
            },
            lats: vec![-11.0, -2.5, 6.0],
            lons: vec![95.0, 141.0],
            values: vec![0.0, 1.5, -999.0, 17.5, 2.25, 0.125],
        }
    }

    #[test]
    fn test_round_trip() {
        let frame = sample_frame();
        let bytes = frame.encode();
        assert_eq!(bytes.len(), 52 + 4 * (3 + 2 + 3 * 2));
        assert_eq!(bytes.len(), frame.encoded_len());

        let decoded = TileFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_frame().encode();
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &31i32.to_le_bytes());
        assert_eq!(&bytes[16..20], &(-11.0f32).to_le_bytes());
        // first latitude follows the header
        assert_eq!(&bytes[52..56], &(-11.0f32).to_le_bytes());
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let bytes = sample_frame().encode();
        assert!(matches!(
            TileFrame::decode(&bytes[..20]),
            Err(CodecError::Truncated { needed: 52, available: 20 })
        ));
        assert!(matches!(
            TileFrame::decode(&bytes[..bytes.len() - 4]),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_huge_counts() {
        let mut data = sample_frame().encode().to_vec();
        data[0..4].copy_from_slice(&i32::MAX.to_le_bytes());
        data[4..8].copy_from_slice(&i32::MAX.to_le_bytes());

        let len = data.len();
        assert_eq!(
            TileFrame::decode(&data),
            Err(CodecError::LengthMismatch {
                expected: checked_encoded_len(i32::MAX as usize, i32::MAX as usize)
                    .unwrap_or(usize::MAX),
                actual: len,
            })
        );
        assert_eq!(checked_encoded_len(usize::MAX / 2, 3), None);
        assert_eq!(checked_encoded_len(3, 2), Some(encoded_len(3, 2)));
    }

    #[test]
    fn test_decode_rejects_negative_count() {
        let mut frame = sample_frame();
        frame.header.lon_count = -1;
        let bytes = frame.encode();
        assert_eq!(TileFrame::decode(&bytes), Err(CodecError::NegativeCount(-1)));
    }
}
