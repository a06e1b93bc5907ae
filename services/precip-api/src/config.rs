//! Static period list loading.

use std::path::Path;

use anyhow::{Context, Result};
use precip_common::Period;
use serde::Deserialize;

/// First and last month of the built-in period list.
const BUILTIN_FIRST: Period = Period::ym(2024, 12);
const BUILTIN_LAST: Period = Period::ym(2026, 1);

/// Contents of `config/periods.yaml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeriodsConfig {
    /// Known periods, served without probing.
    #[serde(default)]
    pub periods: Vec<Period>,

    /// Overrides the engine's land mask reference period.
    #[serde(default)]
    pub reference: Option<Period>,
}

impl PeriodsConfig {
    /// Load from a YAML file, falling back to the built-in list when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Periods file does not exist, using built-in list"
            );
            return Ok(Self::builtin());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let mut config: PeriodsConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse: {:?}", path))?;
        config.periods.sort();
        config.periods.dedup();

        tracing::info!(
            count = config.periods.len(),
            path = %path.display(),
            "Loaded known periods"
        );
        Ok(config)
    }

    pub fn builtin() -> Self {
        let mut periods = Vec::new();
        let mut period = BUILTIN_FIRST;
        while period <= BUILTIN_LAST {
            periods.push(period);
            period = period.next();
        }
        Self {
            periods,
            reference: None,
        }
    }
}
