//! Common test fixtures for precipitation tests.

/// Fill values seen in the dataset variants.
pub mod fill {
    /// Declared `_FillValue` of the negative-fill variant.
    pub const NEGATIVE: f32 = -9.0e33;

    /// netCDF default fill used by the positive-fill variant.
    pub const POSITIVE: f32 = 9.969_21e36;
}

/// Periods used across the suite.
pub mod periods {
    use precip_common::Period;

    /// Land mask reference period.
    pub const REFERENCE: Period = Period::ym(2025, 8);

    pub const DEC_2024: Period = Period::ym(2024, 12);
    pub const JAN_2025: Period = Period::ym(2025, 1);
    pub const FEB_2025: Period = Period::ym(2025, 2);
}

/// Region geometries.
pub mod regions {
    use serde_json::{json, Value};

    /// GeoJSON polygon covering lon 100..=105, lat -10..=-5 with margin.
    pub fn covering_box() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [99.5, -10.5], [105.5, -10.5], [105.5, -4.5], [99.5, -4.5], [99.5, -10.5]
            ]]
        })
    }

    /// GeoJSON polygon whose edges run exactly along the outer grid lines.
    pub fn exact_box() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [100.0, -10.0], [105.0, -10.0], [105.0, -5.0], [100.0, -5.0], [100.0, -10.0]
            ]]
        })
    }

    /// A two-point ring, which encloses nothing.
    pub fn degenerate() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[100.0, -10.0], [101.0, -9.0]]]
        })
    }
}
