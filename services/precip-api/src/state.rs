//! Application state for the precipitation API.

use std::sync::Arc;

use anyhow::{Context, Result};
use grid_cache::{EngineConfig, GridSource, PrecipEngine};
use metrics_exporter_prometheus::PrometheusHandle;
use opendap_source::{DapConfig, DapSource};

use crate::config::PeriodsConfig;

/// Shared application state.
pub struct AppState {
    /// Engine owning every cache.
    pub engine: Arc<PrecipEngine>,

    /// Prometheus renderer; absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(engine: Arc<PrecipEngine>, metrics: Option<PrometheusHandle>) -> Self {
        Self { engine, metrics }
    }

    /// Build the engine over an arbitrary source.
    pub fn with_source(
        source: Arc<dyn GridSource>,
        mut config: EngineConfig,
        periods: PeriodsConfig,
        metrics: Option<PrometheusHandle>,
    ) -> Result<Self> {
        if let Some(reference) = periods.reference {
            config.reference_period = reference;
        }
        let engine = PrecipEngine::new(source, config, periods.periods)
            .context("Failed to create precipitation engine")?;
        Ok(Self::new(Arc::new(engine), metrics))
    }

    /// Build from environment configuration against the DAP server.
    pub fn from_env(periods: PeriodsConfig, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let dap = DapSource::new(DapConfig::from_env()).context("Failed to create DAP source")?;
        tracing::info!(url_template = %dap.config().url_template, "Using DAP source");
        Self::with_source(Arc::new(dap), EngineConfig::from_env(), periods, metrics)
    }
}
