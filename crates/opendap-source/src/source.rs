//! [`GridSource`] over HTTP using DAP2 `.dds` and `.ascii` requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime};
use grid_cache::{GridHandle, GridSource, PrecipError, Result};
use precip_common::Period;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::ascii::parse_array;
use crate::config::DapConfig;
use crate::dds::Dds;
use crate::error::{DapError, DapResult};

/// HTTP client with retry and exponential backoff.
#[derive(Debug, Clone)]
struct DapClient {
    http: Client,
    max_retries: u32,
    initial_delay: Duration,
}

impl DapClient {
    fn new(config: &DapConfig) -> DapResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| DapError::Config(e.to_string()))?;

        Ok(Self {
            http,
            max_retries: config.max_retries,
            initial_delay: config.initial_retry_delay(),
        })
    }

    async fn get_text(&self, url: &str) -> DapResult<String> {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        url = %url,
                        error = %e,
                        retry = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "DAP request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> DapResult<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DapError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Opens monthly datasets from a DAP server.
#[derive(Debug, Clone)]
pub struct DapSource {
    client: DapClient,
    config: Arc<DapConfig>,
}

impl DapSource {
    pub fn new(config: DapConfig) -> DapResult<Self> {
        config.validate().map_err(DapError::Config)?;
        let client = DapClient::new(&config)?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &DapConfig {
        &self.config
    }

    /// Read the DDS and coordinate vectors of a period's dataset.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn open_dataset(&self, period: Period) -> DapResult<DapHandle> {
        let start = Instant::now();
        let config = &self.config;
        let url = config.dataset_url(period);

        let dds = Dds::parse(&self.client.get_text(&format!("{url}.dds")).await?)?;
        let rows = dds
            .dimension(&config.lat_name)
            .ok_or_else(|| DapError::parse(format!("no `{}` dimension", config.lat_name)))?;
        let cols = dds
            .dimension(&config.lon_name)
            .ok_or_else(|| DapError::parse(format!("no `{}` dimension", config.lon_name)))?;
        let time_count = dds
            .dimension(&config.time_name)
            .ok_or_else(|| DapError::parse(format!("no `{}` dimension", config.time_name)))?;

        let coords_url = format!("{url}.ascii?{},{}", config.lat_name, config.lon_name);
        let body = self.client.get_text(&coords_url).await?;
        let lats = parse_array(&body, &config.lat_name)?.values;
        let lons = parse_array(&body, &config.lon_name)?.values;
        if lats.len() != rows || lons.len() != cols {
            return Err(DapError::parse(format!(
                "coordinate lengths {}x{} disagree with DDS {rows}x{cols}",
                lats.len(),
                lons.len()
            )));
        }

        let has_variable = match dds.array(&config.variable) {
            Some(decl) if decl.shape() == [time_count, rows, cols] => true,
            Some(decl) => {
                return Err(DapError::parse(format!(
                    "`{}` has shape {:?}, expected [{time_count}, {rows}, {cols}]",
                    config.variable,
                    decl.shape()
                )))
            }
            None => {
                warn!(variable = %config.variable, "Dataset does not declare the variable");
                false
            }
        };

        let times = time_axis(period, time_count, config.sample_interval_hours);

        info!(
            rows,
            cols,
            time_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Opened DAP dataset"
        );

        Ok(DapHandle {
            client: self.client.clone(),
            url,
            variable: config.variable.clone(),
            has_variable,
            lats,
            lons,
            times,
        })
    }
}

#[async_trait]
impl GridSource for DapSource {
    async fn open(&self, period: Period) -> Result<Arc<dyn GridHandle>> {
        let handle = self
            .open_dataset(period)
            .await
            .map_err(|e| PrecipError::upstream(format!("{period}: {e}")))?;
        Ok(Arc::new(handle))
    }
}

/// An opened dataset. Coordinates are read once; slices on demand.
#[derive(Debug)]
pub struct DapHandle {
    client: DapClient,
    url: String,
    variable: String,
    has_variable: bool,
    lats: Vec<f64>,
    lons: Vec<f64>,
    times: Vec<NaiveDateTime>,
}

impl DapHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Constrained request for one full time slice.
    pub fn slice_url(&self, time_index: usize) -> String {
        format!(
            "{}.ascii?{}[{t}:{t}][0:{}][0:{}]",
            self.url,
            self.variable,
            self.lats.len().saturating_sub(1),
            self.lons.len().saturating_sub(1),
            t = time_index,
        )
    }
}

#[async_trait]
impl GridHandle for DapHandle {
    fn latitudes(&self) -> &[f64] {
        &self.lats
    }

    fn longitudes(&self) -> &[f64] {
        &self.lons
    }

    fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    async fn read_slice(&self, time_index: usize) -> Result<Vec<f32>> {
        if time_index >= self.times.len() {
            return Err(PrecipError::invalid_index(time_index, self.times.len()));
        }
        if !self.has_variable {
            return Err(PrecipError::missing_variable(&self.variable));
        }

        let start = Instant::now();
        let body = self.client.get_text(&self.slice_url(time_index)).await?;
        let values = parse_array(&body, &self.variable)?.into_f32();

        let expected = self.lats.len() * self.lons.len();
        if values.len() != expected {
            return Err(PrecipError::upstream(format!(
                "slice {time_index} has {} values, expected {expected}",
                values.len()
            )));
        }

        debug!(
            url = %self.url,
            time_index,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Read DAP slice"
        );
        Ok(values)
    }

    async fn close(&self) {
        debug!(url = %self.url, "Released DAP dataset");
    }
}

/// Sample timestamps: midnight of the period's first day plus a fixed step.
pub fn time_axis(period: Period, count: usize, interval_hours: u32) -> Vec<NaiveDateTime> {
    let origin = period.first_day().and_time(NaiveTime::MIN);
    let step = chrono::Duration::hours(i64::from(interval_hours));
    (0..count).map(|i| origin + step * i as i32).collect()
}
