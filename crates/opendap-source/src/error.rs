//! Error types for OPeNDAP access.

use grid_cache::PrecipError;
use thiserror::Error;

/// Result type for OPeNDAP operations.
pub type DapResult<T> = Result<T, DapError>;

/// Errors raised while talking to a DAP server.
#[derive(Error, Debug)]
pub enum DapError {
    /// Transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body did not follow the DDS or ASCII layout
    #[error("Malformed DAP response: {0}")]
    Parse(String),

    /// Dataset does not declare the requested variable
    #[error("Variable not found: {0}")]
    MissingVariable(String),

    /// Client could not be built from the configuration
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl DapError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DapError::Http(_) => true,
            DapError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<DapError> for PrecipError {
    fn from(err: DapError) -> Self {
        match err {
            DapError::MissingVariable(name) => PrecipError::MissingVariable(name),
            DapError::Config(msg) => PrecipError::Config(msg),
            other => PrecipError::UpstreamUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_engine_errors() {
        let err: PrecipError = DapError::MissingVariable("pr".into()).into();
        assert_eq!(err, PrecipError::MissingVariable("pr".into()));

        let err: PrecipError = DapError::Status {
            url: "http://host/x.dds".into(),
            status: 404,
        }
        .into();
        assert!(matches!(err, PrecipError::UpstreamUnavailable(msg) if msg.contains("404")));
    }

    #[test]
    fn test_transient_statuses() {
        let status = |status| DapError::Status {
            url: String::new(),
            status,
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!DapError::parse("bad").is_transient());
    }
}
