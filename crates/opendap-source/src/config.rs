//! Connection settings for the DAP server.

use std::time::Duration;

use precip_common::Period;
use serde::{Deserialize, Serialize};

/// Default dataset URL; `{period}` is replaced by `YYYYMM`.
pub const DEFAULT_URL_TEMPLATE: &str =
    "http://202.90.199.129:1980/dods/inarcm/{period}/InaRCM_pr_corrected_dd_{period}";

/// Where datasets live and how to reach them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DapConfig {
    /// Dataset URL with a `{period}` placeholder.
    pub url_template: String,

    /// Name of the precipitation variable.
    pub variable: String,

    /// Latitude and longitude coordinate variable names.
    pub lat_name: String,
    pub lon_name: String,

    /// Time dimension name in the DDS.
    pub time_name: String,

    /// Hours between consecutive raw samples, starting at midnight on the
    /// first day of the period.
    pub sample_interval_hours: u32,

    /// Whole-request timeout.
    pub request_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// Retries for transient failures (transport errors, 5xx, 429).
    pub max_retries: u32,

    /// First retry delay; doubles each retry.
    pub initial_retry_delay_ms: u64,
}

impl Default for DapConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            variable: "pr".to_string(),
            lat_name: "lat".to_string(),
            lon_name: "lon".to_string(),
            time_name: "time".to_string(),
            sample_interval_hours: 6,
            request_timeout_secs: 120,
            connect_timeout_secs: 10,
            max_retries: 2,
            initial_retry_delay_ms: 500,
        }
    }
}

impl DapConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PRECIP_DAP_URL_TEMPLATE") {
            config.url_template = val;
        }

        if let Ok(val) = std::env::var("PRECIP_DAP_VARIABLE") {
            config.variable = val;
        }

        if let Ok(val) = std::env::var("PRECIP_DAP_SAMPLE_HOURS") {
            if let Ok(hours) = val.parse() {
                config.sample_interval_hours = hours;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_DAP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("PRECIP_DAP_MAX_RETRIES") {
            if let Ok(n) = val.parse() {
                config.max_retries = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.url_template.contains("{period}") {
            return Err("url_template must contain {period}".to_string());
        }
        if self.variable.is_empty() {
            return Err("variable must not be empty".to_string());
        }
        if self.sample_interval_hours == 0 {
            return Err("sample_interval_hours must be > 0".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Dataset URL for a period.
    pub fn dataset_url(&self, period: Period) -> String {
        self.url_template.replace("{period}", &period.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }
}
