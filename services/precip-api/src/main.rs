//! Precipitation API Server
//!
//! Serves daily precipitation tiles, multi-day aggregates and time series
//! read from a remote OPeNDAP dataset.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use precip_api::config::PeriodsConfig;
use precip_api::handlers::params::DEFAULT_SUBSAMPLE;
use precip_api::state::AppState;
use precip_common::Period;

/// Precipitation API Server
#[derive(Parser, Debug)]
#[command(name = "precip-api")]
#[command(about = "Daily precipitation tile and time-series server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:5000", env = "PRECIP_LISTEN_ADDR")]
    listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Number of worker threads
    #[arg(long, env = "PRECIP_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// YAML file listing the known periods
    #[arg(long, default_value = "config/periods.yaml", env = "PRECIP_PERIODS_FILE")]
    periods_file: String,

    /// Periods to warm in the background at startup (comma separated)
    #[arg(long, env = "PRECIP_PREFETCH_PERIODS", value_delimiter = ',')]
    prefetch: Vec<String>,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;
    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    info!("Starting precipitation API server");

    let periods = PeriodsConfig::load(&args.periods_file)?;
    let state = Arc::new(AppState::from_env(periods, Some(prometheus_handle))?);

    for raw in &args.prefetch {
        match raw.trim().parse::<Period>() {
            Ok(period) => {
                info!(period = %period, "Scheduling startup prefetch");
                drop(state.engine.spawn_prefetch(period, DEFAULT_SUBSAMPLE, true));
            }
            Err(e) => tracing::warn!(period = %raw, error = %e, "Ignoring prefetch period"),
        }
    }

    let app = precip_api::build_router(state);

    // Parse listen address
    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", args.listen))?;

    info!("Precipitation API listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
