//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grid_cache::PrecipError;
use serde_json::json;
use thiserror::Error;

/// Errors returned by handlers, rendered as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] PrecipError),

    /// Malformed request parameters.
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(err) => match err {
                PrecipError::InvalidPeriod(_)
                | PrecipError::InvalidIndex { .. }
                | PrecipError::InvalidGeometry(_) => StatusCode::BAD_REQUEST,
                PrecipError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
                PrecipError::MissingVariable(_)
                | PrecipError::ShapeMismatch { .. }
                | PrecipError::Config(_)
                | PrecipError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let status = |err: PrecipError| ApiError::from(err).status();
        assert_eq!(status(PrecipError::InvalidPeriod("1".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(PrecipError::invalid_index(3, 2)), StatusCode::BAD_REQUEST);
        assert_eq!(status(PrecipError::upstream("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(PrecipError::missing_variable("pr")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
    }
}
