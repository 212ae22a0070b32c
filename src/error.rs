//! Error types for broker connector operations
//!
//! Four error classes flow through the connector: configuration errors
//! (surfaced synchronously, never retried), transport errors (classified as
//! recoverable or loop-terminating inside the receive loop), data binding
//! errors (payload/property shape mismatch, never silently defaulted), and
//! handler errors (raised by a registered callback, routed to `on_error`).

use thiserror::Error;

/// Errors raised by the broker transport/session provider.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O failure: {0}")]
    Io(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),
}

impl TransportError {
    /// Create an I/O transport error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    /// Create a broker-side transport error
    pub fn broker<S: Into<String>>(message: S) -> Self {
        Self::Broker(message.into())
    }

    /// Create a connection-closed transport error
    pub fn connection_closed<S: Into<String>>(message: S) -> Self {
        Self::ConnectionClosed(message.into())
    }

    /// Whether this failure terminates a receive loop. Anything else is
    /// retried after a short backoff.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed(_))
    }
}

/// Main error type for connector operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Data binding failed: {message}")]
    DataBinding { message: String },

    #[error("Handler error: {message}")]
    Handler { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a data binding error
    pub fn data_binding<S: Into<String>>(message: S) -> Self {
        Self::DataBinding {
            message: message.into(),
        }
    }

    /// Create a handler error
    pub fn handler<S: Into<String>>(message: S) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

/// Result type for connector operations
pub type Result<T> = std::result::Result<T, Error>;
