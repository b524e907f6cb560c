//! Transport error types.

use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

/// Failures reaching an endpoint. None of these are retried here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("unsupported scheme in {0:?} (only http:// and https:// are probed)")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls failed: {0}")]
    Tls(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("reading body failed: {0}")]
    Body(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}
