// Errors surfaced to dashboard callers
use thiserror::Error;

/// Fixed message shown to users whenever the backend cannot be reached
pub const DATA_UNAVAILABLE_MESSAGE: &str =
    "Metrics are temporarily unavailable. Please try again later.";

/// Cloneable so a single in-flight fetch outcome can be handed to every waiter
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricsError {
    /// Backend call failed or returned an error status
    #[error("{message}")]
    DataUnavailable { message: String },

    /// Backend returned records that fail boundary validation
    #[error("Malformed metric data: {message}")]
    MalformedData { message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MetricsError {
    pub fn data_unavailable() -> Self {
        MetricsError::DataUnavailable {
            message: DATA_UNAVAILABLE_MESSAGE.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        MetricsError::MalformedData {
            message: message.into(),
        }
    }
}
