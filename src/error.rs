//! Errors the sanitization pipeline can produce.
//!
//! Everything fallible in the crate returns [`SanitizeError`] through the
//! crate-wide [`Result`] alias: bad geometry inputs, invalid configuration,
//! references to unknown network vertices, and trajectories too short to
//! process.

use std::fmt;

/// The error type for all sanitizer operations.
#[derive(Debug, Clone)]
pub enum SanitizeError {
    /// A geometric shape was requested with invalid dimensions
    InvalidShape { message: String },
    /// A configuration value is out of its valid range
    ConfigError { message: String },
    /// Trajectory has insufficient points for processing
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },
    /// Road network is missing a referenced vertex or edge
    NetworkError { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeError::InvalidShape { message } => {
                write!(f, "Invalid shape: {}", message)
            }
            SanitizeError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            SanitizeError::InsufficientPoints {
                point_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "Trajectory has {} points, minimum {} required",
                    point_count, minimum_required
                )
            }
            SanitizeError::NetworkError { message } => {
                write!(f, "Road network error: {}", message)
            }
            SanitizeError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for SanitizeError {}

/// Result type alias for route-sanitizer operations.
pub type Result<T> = std::result::Result<T, SanitizeError>;

impl SanitizeError {
    /// Shorthand for an `InvalidShape` error.
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        SanitizeError::InvalidShape {
            message: message.into(),
        }
    }

    /// Shorthand for a `ConfigError`.
    pub fn config(message: impl Into<String>) -> Self {
        SanitizeError::ConfigError {
            message: message.into(),
        }
    }

    /// Shorthand for a `NetworkError`.
    pub fn network(message: impl Into<String>) -> Self {
        SanitizeError::NetworkError {
            message: message.into(),
        }
    }
}
