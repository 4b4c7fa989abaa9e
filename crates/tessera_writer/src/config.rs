//! Configuration for segregation runs.

use crate::error::{SegregateError, SegregateResult};

/// Default depth of each bucket's queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Configuration for a segregation run.
#[derive(Debug, Clone)]
pub struct SegregationConfig {
    /// Fragments buffered per bucket before the dispatch loop waits for
    /// that bucket's sink. Must be at least 1.
    pub queue_capacity: usize,
    /// Whether to validate ordering, framing and partition keys of the
    /// producer's stream. Violations fail the run as producer failures.
    pub validate_input: bool,
}

impl SegregationConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-bucket queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Enables or disables input validation.
    #[must_use]
    pub fn with_input_validation(mut self, enabled: bool) -> Self {
        self.validate_input = enabled;
        self
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SegregateError::InvalidConfig`] if the queue capacity is zero.
    pub fn validate(&self) -> SegregateResult<()> {
        if self.queue_capacity == 0 {
            return Err(SegregateError::invalid_config("queue_capacity must be at least 1"));
        }
        Ok(())
    }
}

impl Default for SegregationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            validate_input: true,
        }
    }
}
