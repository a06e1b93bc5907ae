//! Error types for tile computation and caching.

use precip_common::GeometryError;
use thiserror::Error;

/// Errors reported to callers of the engine.
///
/// Pixel-level invalid readings are not errors; they become the sentinel.
/// Errors are `Clone` so a single failed computation can be handed to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PrecipError {
    /// Period is not in the known or discovered set.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Day or time index outside the period.
    #[error("index {index} out of range (valid: 0..{len})")]
    InvalidIndex { index: usize, len: usize },

    /// The opened dataset does not carry the expected variable.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// Opening or reading the remote dataset failed.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Region polygon could not be used.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Grids being combined do not share a shape.
    #[error("grid shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background computation panicked or was cancelled.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PrecipError {
    /// Create an UpstreamUnavailable error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    /// Create a MissingVariable error.
    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingVariable(name.into())
    }

    /// Create an InvalidIndex error.
    pub fn invalid_index(index: usize, len: usize) -> Self {
        Self::InvalidIndex { index, len }
    }
}

impl From<GeometryError> for PrecipError {
    fn from(err: GeometryError) -> Self {
        Self::InvalidGeometry(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PrecipError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, PrecipError>;
