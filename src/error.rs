//! Error types for location subscriptions.

use crate::provider::Availability;
use thiserror::Error;

/// Main error type for registry and service operations.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Location provider unavailable: {0:?}")]
    ProviderUnavailable(Availability),

    #[error("Location service is not active")]
    NotActive,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Delivery worker has stopped")]
    WorkerStopped,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for LocationError {
    fn from(e: serde_json::Error) -> Self {
        LocationError::Config(e.to_string())
    }
}

/// Result type for location operations.
pub type Result<T> = std::result::Result<T, LocationError>;
