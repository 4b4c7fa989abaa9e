//! Error types for segregation.

use tessera_core::StreamError;
use thiserror::Error;

/// Boxed error returned by consumer sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for segregation operations.
pub type SegregateResult<T> = Result<T, SegregateError>;

/// Errors that end a segregation run.
///
/// A failed run must be discarded as a whole; output already handed to
/// sinks is the caller's to clean up.
#[derive(Error, Debug)]
pub enum SegregateError {
    /// The producer stream failed or was malformed.
    #[error("producer failed: {0}")]
    Producer(#[source] StreamError),

    /// A bucket's sink returned an error.
    #[error("sink for bucket {bucket} failed: {source}")]
    Sink {
        /// Debug rendering of the bucket ID.
        bucket: String,
        /// The sink's error.
        #[source]
        source: BoxError,
    },

    /// A sink finished or dropped its stream before end of stream.
    #[error("sink for bucket {bucket} stopped before end of stream")]
    SinkStoppedEarly {
        /// Debug rendering of the bucket ID.
        bucket: String,
    },

    /// A sink task panicked.
    #[error("sink task panicked: {message}")]
    SinkPanicked {
        /// Panic or join failure description.
        message: String,
    },

    /// The run was configured with invalid settings.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl SegregateError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a sink stopped early error for `bucket`.
    pub fn stopped_early(bucket: &impl std::fmt::Debug) -> Self {
        Self::SinkStoppedEarly {
            bucket: format!("{bucket:?}"),
        }
    }

    /// Returns true for producer failures.
    pub fn is_producer_failure(&self) -> bool {
        matches!(self, SegregateError::Producer(_))
    }

    /// Returns true if the error came from a sink: its own failure, an
    /// early stop or a panic.
    pub fn is_sink_failure(&self) -> bool {
        matches!(
            self,
            SegregateError::Sink { .. }
                | SegregateError::SinkStoppedEarly { .. }
                | SegregateError::SinkPanicked { .. }
        )
    }

    /// Returns true if this is a sink error caused only by the run being
    /// aborted underneath it.
    pub(crate) fn is_secondary_abort(&self) -> bool {
        match self {
            SegregateError::Sink { source, .. } => source
                .downcast_ref::<StreamError>()
                .is_some_and(StreamError::is_aborted),
            _ => false,
        }
    }
}

impl From<StreamError> for SegregateError {
    fn from(err: StreamError) -> Self {
        Self::Producer(err)
    }
}
