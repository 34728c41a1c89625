//! Error types for calfetch.

use thiserror::Error;

use crate::remote::RemoteResponse;

/// Errors that can occur in calfetch operations.
///
/// Cloneable so that a single failed gap fetch can be reported to every
/// caller awaiting the same in-flight request.
#[derive(Error, Debug, Clone)]
pub enum CalFetchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid interval: start ({start}) must be before end ({end})")]
    InvalidInterval { start: f64, end: f64 },

    #[error("Invalid range: from ({from}) must be before to ({to})")]
    InvalidRange { from: String, to: String },

    #[error("Remote returned status {status}: {}", response.body)]
    Remote { status: u16, response: RemoteResponse },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Fetch task failed: {0}")]
    TaskFailed(String),

    #[error("No Tokio runtime to run fetches on: {0}")]
    Runtime(String),
}

/// Result type alias for calfetch operations.
pub type CalFetchResult<T> = Result<T, CalFetchError>;
