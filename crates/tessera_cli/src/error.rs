//! CLI error type.

use tessera_core::StreamError;
use tessera_keys::MarshalError;
use tessera_writer::SegregateError;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors raised by CLI commands.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The dump is not valid JSON for the expected layout.
    #[error("invalid dump: {0}")]
    Json(#[from] serde_json::Error),

    /// The dump parsed but describes invalid data.
    #[error("invalid dump: {message}")]
    Dump {
        /// Description of the problem.
        message: String,
    },

    /// A key could not be encoded or decoded.
    #[error("malformed key: {0}")]
    Key(#[from] MarshalError),

    /// A bucket stream failed.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The segregation run failed.
    #[error(transparent)]
    Segregate(#[from] SegregateError),
}

impl CliError {
    /// Creates a dump error.
    pub fn dump(message: impl Into<String>) -> Self {
        Self::Dump {
            message: message.into(),
        }
    }
}
