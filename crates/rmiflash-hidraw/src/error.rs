//! Error types for Linux hidraw operations

use thiserror::Error;

/// Linux hidraw specific errors
#[derive(Debug, Error)]
pub enum HidrawError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending a feature report failed
    #[error("Failed to send feature report ({len} bytes): {source}")]
    SetFeatureFailed {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    /// Fetching a feature report failed
    #[error("Failed to fetch feature report: {0}")]
    GetFeatureFailed(#[source] std::io::Error),

    /// Waiting for an interrupt report failed
    #[error("Polling for attention failed: {0}")]
    PollFailed(#[source] nix::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/hidrawN")]
    NoDevice,
}

/// Result type for Linux hidraw operations
pub type Result<T> = std::result::Result<T, HidrawError>;
