//! Configuration for the precipitation engine.

use precip_common::Period;
use serde::{Deserialize, Serialize};

use crate::source::FillConvention;

/// Configuration for the caches, aggregation constants and warm probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of daily tiles held in the LRU tile cache.
    pub tile_cache_capacity: usize,

    /// Maximum number of region masks held; least recently used go first.
    pub region_mask_capacity: usize,

    /// Raw sub-daily samples that make up one day.
    pub samples_per_day: usize,

    /// Multiplier from flux (per second) to daily accumulation.
    pub unit_scale: f32,

    /// Fixed lower bound of the display colour scale.
    pub display_min: f32,

    /// Fixed upper bound of the display colour scale (mm/day).
    pub display_max: f32,

    /// Period whose first time slice defines the land/ocean mask.
    pub reference_period: Period,

    /// Validity predicate for raw readings.
    pub fill: FillConvention,

    /// How time-series requests decide whether a period is warm.
    pub warm_probe: WarmProbe,

    /// Latency threshold for [`WarmProbe::Latency`], in milliseconds.
    pub warm_threshold_ms: u64,

    /// How long discovered periods are trusted before re-probing.
    pub discovery_ttl_secs: u64,

    /// Maximum candidates probed per discovery run.
    pub discovery_max_probe: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_cache_capacity: 500,
            region_mask_capacity: 64,
            samples_per_day: 4,
            unit_scale: 86_400.0,
            display_min: 0.0,
            display_max: 100.0,
            reference_period: Period::ym(2025, 8),
            fill: FillConvention::default(),
            warm_probe: WarmProbe::Membership,
            warm_threshold_ms: 50,
            discovery_ttl_secs: 3600,
            discovery_max_probe: 24,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PRECIP_TILE_CACHE_CAPACITY") {
            if let Ok(size) = val.parse() {
                config.tile_cache_capacity = size;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_REGION_MASK_CAPACITY") {
            if let Ok(size) = val.parse() {
                config.region_mask_capacity = size;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_SAMPLES_PER_DAY") {
            if let Ok(n) = val.parse() {
                config.samples_per_day = n;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_UNIT_SCALE") {
            if let Ok(scale) = val.parse() {
                config.unit_scale = scale;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_REFERENCE_PERIOD") {
            match val.parse() {
                Ok(period) => config.reference_period = period,
                Err(e) => tracing::warn!(error = %e, "Ignoring PRECIP_REFERENCE_PERIOD"),
            }
        }

        if let Ok(val) = std::env::var("PRECIP_FILL_LOWER") {
            if let Ok(lower) = val.parse() {
                config.fill.lower = lower;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_FILL_UPPER") {
            if let Ok(upper) = val.parse() {
                config.fill.upper = upper;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_WARM_PROBE") {
            config.warm_probe = WarmProbe::from_str(&val);
        }

        if let Ok(val) = std::env::var("PRECIP_WARM_THRESHOLD_MS") {
            if let Ok(ms) = val.parse() {
                config.warm_threshold_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_DISCOVERY_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                config.discovery_ttl_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_DISCOVERY_MAX_PROBE") {
            if let Ok(n) = val.parse() {
                config.discovery_max_probe = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_cache_capacity == 0 {
            return Err("tile_cache_capacity must be > 0".to_string());
        }

        if self.region_mask_capacity == 0 {
            return Err("region_mask_capacity must be > 0".to_string());
        }

        if self.samples_per_day == 0 {
            return Err("samples_per_day must be > 0".to_string());
        }

        if self.unit_scale.is_nan() || self.unit_scale <= 0.0 {
            return Err("unit_scale must be > 0".to_string());
        }

        if self.display_min >= self.display_max {
            return Err("display_min must be below display_max".to_string());
        }

        if self.fill.lower >= self.fill.upper {
            return Err("fill.lower must be below fill.upper".to_string());
        }

        Ok(())
    }
}

/// Strategy for deciding whether a period's tiles are already cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmProbe {
    /// Ask the tile cache whether the last day is present.
    Membership,
    /// Time a fetch of the last day and treat a fast answer as a hit.
    Latency,
}

impl Default for WarmProbe {
    fn default() -> Self {
        Self::Membership
    }
}

impl WarmProbe {
    /// Parse from string (case-insensitive), defaulting to membership.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "latency" | "timing" => Self::Latency,
            _ => Self::Membership,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Membership => "membership",
            Self::Latency => "latency",
        }
    }
}

impl std::fmt::Display for WarmProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
