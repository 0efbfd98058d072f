//! Error types for the REST client and model validation

use thiserror::Error;

/// Errors from the backend API or from values that fail model validation
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("HTTP error: {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Response body was not the expected JSON shape
    #[error("Failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Envelope carried a non-success result code
    #[error("Request rejected with result code {code}: {message}")]
    ResultCode { code: i32, message: String },

    /// Success envelope without a `data` field where one is required
    #[error("Response envelope has no data")]
    MissingData,

    #[error("Invalid position: latitude={latitude}, longitude={longitude}")]
    InvalidPosition { latitude: f64, longitude: f64 },

    #[error("Search radius must be between 1 and 10 km, got {0}")]
    InvalidRadius(i64),
}

impl ApiError {
    /// Whether retrying the same request later could succeed.
    ///
    /// Network failures and 5xx responses are transient; validation, 4xx and
    /// rejected result codes are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request(_) => true,
            ApiError::HttpStatus(status) => status.is_server_error(),
            _ => false,
        }
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
