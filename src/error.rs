//! Error types for hivething.
//!
//! Defines the main error enum used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Main error type for hivething operations.
///
/// The enum is `Clone` so a `RowSet` that failed its wait can hand the same
/// error back on every later call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HiveError {
    /// The RPC round trip itself failed (socket closed, framing error, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status code.
    #[error("Server error in {call}: {message}")]
    Server {
        /// RPC call that was rejected.
        call: &'static str,
        /// Status rendering from the server.
        message: String,
    },

    /// The response was missing a field the protocol requires.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A column value, row, or handle blob could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// `scan` was given the wrong number of destinations.
    #[error("Can't scan into {actual} destinations with a row of {expected} values")]
    Arity { expected: usize, actual: usize },

    /// A decoded value can't be stored in the requested destination type.
    #[error("Can't scan column {column} value {value} into {target}")]
    TypeMismatch {
        column: usize,
        target: &'static str,
        value: String,
    },

    /// `scan` or `current_row` was called before a successful `advance`.
    #[error("No row to scan, call advance() first")]
    NoRow,

    /// A synchronous accessor was used before the operation finished.
    #[error("Operation results are not ready yet")]
    NotReady,

    /// The operation reached a terminal state other than FINISHED.
    #[error("Query failed execution: {state}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    OperationFailed {
        state: String,
        message: Option<String>,
    },

    /// An opt-in wait deadline elapsed.
    #[error("Timed out after {0:?} waiting for the operation")]
    Timeout(Duration),

    /// The wait was cancelled through its cancellation token.
    #[error("Wait cancelled")]
    Cancelled,

    /// Configuration errors (invalid config file, bad option values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session lifecycle errors (closed connection, failed open, etc.)
    #[error("Connection error: {0}")]
    Connection(String),
}

impl HiveError {
    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a server error for the given RPC call.
    pub fn server(call: &'static str, msg: impl Into<String>) -> Self {
        Self::Server {
            call,
            message: msg.into(),
        }
    }

    /// Creates a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Transport(_) => "Transport Error",
            Self::Server { .. } => "Server Error",
            Self::Protocol(_) => "Protocol Error",
            Self::Decode(_) => "Decode Error",
            Self::Arity { .. } => "Arity Error",
            Self::TypeMismatch { .. } => "Type Mismatch Error",
            Self::NoRow => "No Row Error",
            Self::NotReady => "Not Ready Error",
            Self::OperationFailed { .. } => "Operation Failed",
            Self::Timeout(_) => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::Config(_) => "Configuration Error",
            Self::Connection(_) => "Connection Error",
        }
    }

    /// Returns true for errors raised by caller-side `scan` misuse.
    pub fn is_scan_error(&self) -> bool {
        matches!(
            self,
            Self::Arity { .. } | Self::TypeMismatch { .. } | Self::NoRow
        )
    }
}

/// Result type alias using HiveError.
pub type Result<T> = std::result::Result<T, HiveError>;
