//! Error handling module for the credential proxy

use std::fmt;
use thiserror::Error;

/// Custom error type for the credential proxy
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing routing header: {0}")]
    MissingRouteHeader(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Auth header error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for the credential proxy
pub type Result<T> = std::result::Result<T, Error>;

/// Kinds of failure the outbound call can end with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionFailed,
    Timeout,
    TlsFailure,
    InvalidRequest,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::ConnectionFailed => "connection_failed",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::TlsFailure => "tls_failure",
            TransportErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single outbound call
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }
}
