//! Error types for the flood-monitor library.
//!
//! One `thiserror` enum covers the whole pipeline. Variants fall into four
//! classes: transport (search or classifier HTTP), classification (a reply
//! that does not match the expected shape), persistence (reading or
//! writing the CSV tables) and configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while ingesting, classifying or aggregating.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A collaborator answered with a non-success status
    #[error("Transport error (status {status}): {body}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Response body as returned by the server
        body: String,
    },

    /// Connection, timeout or response decoding failure
    #[error("Network error: {0}")]
    Network(String),

    /// Classifier reply could not be parsed into a label and location
    #[error("Classification error: {0}")]
    Classification(String),

    /// A stored row is malformed
    #[error("Persistence error in {path}: {message}")]
    Persistence {
        /// Backing file the row came from
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MonitorError {
    /// True for failures talking to the search or classifier service.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Network(_))
    }

    /// True for failures reading or writing the backing tables.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Io(_) | Self::Csv(_))
    }

    /// Short label used for log fields and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } | Self::Network(_) => "transport",
            Self::Classification(_) | Self::Serialization(_) => "classification",
            Self::Persistence { .. } | Self::Io(_) | Self::Csv(_) => "persistence",
            Self::InvalidConfig(_) => "config",
        }
    }
}

/// Convenience type alias for Result with MonitorError
pub type Result<T> = std::result::Result<T, MonitorError>;

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let transport = MonitorError::Transport {
            status: 429,
            body: "Too Many Requests".to_string(),
        };
        assert!(transport.is_transport());
        assert!(!transport.is_persistence());
        assert_eq!(transport.kind(), "transport");
        assert_eq!(transport.to_string(), "Transport error (status 429): Too Many Requests");

        let io = MonitorError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(io.is_persistence());
        assert_eq!(io.kind(), "persistence");

        assert_eq!(MonitorError::Classification("bad".into()).kind(), "classification");
    }
}
