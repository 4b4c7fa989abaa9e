//! Error types for fragment streams.

use std::io;
use thiserror::Error;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while producing or consuming a fragment stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A partition key failed validation.
    #[error("malformed key: {0}")]
    Marshal(#[from] tessera_keys::MarshalError),

    /// The stream violates ordering or framing rules.
    #[error("invalid fragment stream: {message}")]
    InvalidStream {
        /// Description of the violation.
        message: String,
    },

    /// The stream was cut short because the operation feeding it failed.
    #[error("stream aborted: {reason}")]
    Aborted {
        /// Why the stream was aborted.
        reason: String,
    },

    /// The underlying source failed.
    #[error("source error: {message}")]
    Source {
        /// Description of the failure.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Creates an invalid stream error.
    pub fn invalid_stream(message: impl Into<String>) -> Self {
        Self::InvalidStream {
            message: message.into(),
        }
    }

    /// Creates an aborted error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted {
            reason: reason.into(),
        }
    }

    /// Creates a source error.
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Returns true if the stream was aborted by its feeder.
    pub fn is_aborted(&self) -> bool {
        matches!(self, StreamError::Aborted { .. })
    }
}
