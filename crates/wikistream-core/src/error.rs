//! Unified error types for the wikistream core.
//!
//! Each layer gets its own error enum. Transport errors only ever reach the
//! owner through the session's error hook, decode errors are dropped, and
//! listener errors are logged by the dispatcher.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors that can occur in transport operations.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// The server answered, but not with an event stream.
    #[error("unexpected response from {url}: {reason}")]
    BadResponse {
        /// The URL that was requested.
        url: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// Connection closed by the remote end.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Reading from an open stream failed.
    #[error("stream read failed: {0}")]
    Stream(String),

    /// The transport gave up reconnecting.
    #[error("giving up after {attempts} reconnection attempts")]
    RetriesExhausted {
        /// Number of failed attempts.
        attempts: u32,
    },

    /// The connection was lost and reconnection is disabled.
    #[error("connection lost and reconnection is disabled")]
    ReconnectDisabled,

    /// The request could not be built.
    #[error("invalid stream request: {0}")]
    InvalidRequest(String),

    /// Opening requires a running tokio runtime.
    #[error("no tokio runtime available to drive the transport")]
    NoRuntime,
}

impl TransportError {
    /// Returns `true` if the transport will not recover from this error.
    ///
    /// Non-fatal errors are followed by a reconnection attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RetriesExhausted { .. }
                | Self::ReconnectDisabled
                | Self::InvalidRequest(_)
                | Self::NoRuntime
        )
    }
}

// =============================================================================
// Stream Errors
// =============================================================================

/// Errors raised while setting up an event stream session.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// A stream name was empty, or no stream was given.
    #[error("invalid stream name list: {0}")]
    InvalidStreamName(String),

    /// The `since` value could not be normalized to a timestamp.
    #[error("invalid since value '{value}': {reason}")]
    InvalidSince {
        /// The rejected input.
        value: String,
        /// Reason for rejection.
        reason: String,
    },

    /// A filter could not be built.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// =============================================================================
// Decode Errors
// =============================================================================

/// A raw message body that is not valid JSON.
#[derive(Debug, Clone, Error)]
#[error("malformed event payload: {reason}")]
pub struct DecodeError {
    /// Parser message.
    pub reason: String,
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            reason: err.to_string(),
        }
    }
}

// =============================================================================
// Listener Errors
// =============================================================================

/// Failure of a single listener action during dispatch.
#[derive(Debug, Clone, Error)]
pub enum ListenerError {
    /// The action returned an error.
    #[error("listener {listener} failed: {message}")]
    Failed {
        /// Id of the failing listener.
        listener: u64,
        /// Rendered error.
        message: String,
    },

    /// The action panicked.
    #[error("listener {listener} panicked: {message}")]
    Panicked {
        /// Id of the failing listener.
        listener: u64,
        /// Panic payload, if it was a string.
        message: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for session setup.
pub type StreamResult<T> = Result<T, StreamError>;
