//! Core type definitions for mutations.

use std::fmt;

/// Write timestamp of a mutation, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Timestamp of data that carries none.
    pub const MISSING: Timestamp = Timestamp(i64::MIN);

    /// Creates a new timestamp.
    #[must_use]
    pub const fn new(micros: i64) -> Self {
        Self(micros)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// Identifier of a regular or static column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(pub u32);

impl ColumnId {
    /// Creates a new column ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.0)
    }
}

/// A deletion marker: data written at or before `timestamp` is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tombstone {
    /// Write timestamp of the deletion.
    pub timestamp: Timestamp,
    /// Local deletion time, seconds since the epoch.
    pub deletion_time: u32,
}

impl Tombstone {
    /// Creates a tombstone.
    #[must_use]
    pub const fn new(timestamp: Timestamp, deletion_time: u32) -> Self {
        Self {
            timestamp,
            deletion_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_timestamp_is_smallest() {
        assert!(Timestamp::MISSING < Timestamp::new(i64::MIN + 1));
        assert_eq!(format!("{}", Timestamp::new(10)), "ts:10");
    }

    #[test]
    fn tombstones_order_by_timestamp_first() {
        let older = Tombstone::new(Timestamp(1), 100);
        let newer = Tombstone::new(Timestamp(2), 50);
        assert!(older < newer);
    }
}
