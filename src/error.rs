//! Error types and handling for the `FareWatch` service

use std::time::Duration;

use thiserror::Error;

/// Main error type for the `FareWatch` service
#[derive(Error, Debug)]
pub enum FareWatchError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Quote provider communication errors
    #[error("API error: {message}")]
    Api { message: String },

    /// Alert delivery errors
    #[error("Alert delivery error: {message}")]
    Alert { message: String },

    /// Price history store errors
    #[error("Price history error: {message}")]
    Store { message: String },

    /// A price point would mix currencies within one route history
    #[error("Currency mismatch for {route}: history is in {expected}, got {actual}")]
    CurrencyMismatch {
        route: String,
        expected: String,
        actual: String,
    },

    /// An external call did not complete within its deadline
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl FareWatchError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new alert delivery error
    pub fn alert<S: Into<String>>(message: S) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            FareWatchError::Config { .. } => {
                "Configuration error. Please check your config file and credentials.".to_string()
            }
            FareWatchError::Api { .. } => {
                "Unable to reach the flight search provider. Will retry on the next check."
                    .to_string()
            }
            FareWatchError::Alert { .. } => {
                "Failed to deliver the error fare alert.".to_string()
            }
            FareWatchError::Store { .. } | FareWatchError::Io { .. } => {
                "Price history file operation failed. Please check file permissions.".to_string()
            }
            FareWatchError::CurrencyMismatch { route, .. } => {
                format!("Price history for {route} mixes currencies")
            }
            FareWatchError::Timeout { operation, .. } => format!("{operation} took too long"),
        }
    }
}
