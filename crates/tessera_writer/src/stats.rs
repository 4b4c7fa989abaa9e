//! Segregation run statistics.

use std::fmt;

/// Summary of a completed segregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegregationStats {
    /// Partitions read from the producer.
    pub partitions: u64,
    /// Fragments read from the producer.
    pub fragments_in: u64,
    /// Fragments delivered to bucket queues, synthesized framing included.
    pub fragments_out: u64,
    /// Number of buckets opened.
    pub buckets: usize,
    /// Whether the run stopped early because it was cancelled.
    pub cancelled: bool,
}

impl fmt::Display for SegregationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} partitions, {} fragments in, {} fragments out, {} buckets",
            self.partitions, self.fragments_in, self.fragments_out, self.buckets
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
