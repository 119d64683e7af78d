//! Error handling for wakegate
//!
//! This module defines the application-wide error types and result type.
//! Startup errors (`Config`, `Bind`) are fatal; everything raised while a
//! single connection is being handled stays inside that connection.

use std::io;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wakegate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Wake step failed
    #[error("Wakeup failed: {0}")]
    Wake(#[from] WakeError),

    /// Target never became reachable
    #[error("Connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic errors
    #[error("Error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a new bind error
    pub fn bind(addr: impl Into<String>, source: io::Error) -> Self {
        Error::Bind {
            addr: addr.into(),
            source,
        }
    }

    /// Create a new generic error
    pub fn generic(msg: impl Into<String>) -> Self {
        Error::Generic(msg.into())
    }
}

/// Convert from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Generic(err.to_string())
    }
}

/// Failure of a single `wake()` call
#[derive(Error, Debug)]
pub enum WakeError {
    /// Hardware or broadcast address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Magic packet could not be handed to the network layer
    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    /// HTTP request could not be sent or its response could not be read
    #[error("Transport error: {0}")]
    Transport(String),

    /// Hypervisor answered with a non-success status
    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Status body was not the expected JSON document
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Stopped after {0} redirects")]
    TooManyRedirects(usize),
}

impl WakeError {
    /// HTTP status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            WakeError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WakeError {
    fn from(err: reqwest::Error) -> Self {
        WakeError::Transport(err.to_string())
    }
}

/// The target could not be reached within the retry policy
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_exposed() {
        let err = WakeError::UnexpectedStatus {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("500"));
        assert_eq!(WakeError::InvalidAddress("x".into()).status(), None);
    }

    #[test]
    fn test_wake_error_converts_into_error() {
        let err: Error = WakeError::MalformedResponse("eof".into()).into();
        assert!(matches!(err, Error::Wake(WakeError::MalformedResponse(_))));
    }
}
