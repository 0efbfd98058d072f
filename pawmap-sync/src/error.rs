//! Error types for the map sync core

use pawmap_api::ApiError;
use pawmap_stomp::FrameError;
use thiserror::Error;

/// Errors surfaced by page construction and startup
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// REST client could not be built or a one-shot request failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// IO error (token file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors on the realtime channel. Always retried, never reach the page.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// WebSocket handshake or stream failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connect or handshake did not finish in time
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// Broker closed the connection
    #[error("Connection closed by broker")]
    Closed,

    /// Broker replied with a STOMP ERROR frame
    #[error("Broker error: {0}")]
    Broker(String),

    /// Frame did not follow the expected STOMP exchange
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Frame decode error: {0}")]
    Frame(#[from] FrameError),
}

/// Device geolocation failures
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GeolocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location unavailable")]
    Unavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Geolocation is not supported")]
    Unsupported,
}

/// A push message that could not be turned into a notification
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is missing '{0}'")]
    MissingField(&'static str),

    #[error("Payload has invalid coordinates: {latitude},{longitude}")]
    InvalidPosition { latitude: f64, longitude: f64 },
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
