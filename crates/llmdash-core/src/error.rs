//! Error types for llmdash

use chrono::NaiveDateTime;
use thiserror::Error;

/// Result type alias using llmdash's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for llmdash operations
#[derive(Error, Debug)]
pub enum Error {
    /// The upstream metrics API could not be reached or answered with a
    /// non-success status.
    #[error("{}", source_unavailable_message(.status, .message))]
    SourceUnavailable {
        /// HTTP status, absent for transport or decoding failures
        status: Option<u16>,
        /// Response body or transport error text
        message: String,
    },

    /// The requested range ends before it starts
    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start
        start: NaiveDateTime,
        /// Requested end
        end: NaiveDateTime,
    },

    /// The chat-completion provider rejected or failed a request
    #[error("Provider error ({status}): {message}")]
    Provider {
        /// HTTP status returned by the provider
        status: u16,
        /// Response body
        message: String,
    },

    /// The events endpoint could not be reached or refused an event
    #[error("{}", event_rejected_message(.status, .message))]
    EventRejected {
        /// HTTP status, absent for transport failures
        status: Option<u16>,
        /// Response body or transport error text
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn source_unavailable_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Metrics source unavailable ({code}): {message}"),
        None => format!("Metrics source unavailable: {message}"),
    }
}

fn event_rejected_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Event delivery failed ({code}): {message}"),
        None => format!("Event delivery failed: {message}"),
    }
}

impl Error {
    /// Create a source-unavailable error carrying the upstream status
    pub fn source_status(status: u16, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a source-unavailable error for a transport or decoding failure
    pub fn source_transport(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            status: None,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Upstream HTTP status, if this error carries one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::SourceUnavailable { status, .. } | Self::EventRejected { status, .. } => *status,
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
