//! # Tessera Core
//!
//! Mutation model for the Tessera storage layer.
//!
//! This crate provides:
//! - Timestamps, tombstones, cells and rows
//! - Clustering keys and positions within a partition
//! - [`MutationFragment`], the element of a mutation stream
//! - [`FragmentStreamValidator`] for ordering and framing checks
//! - [`FragmentReader`], the pull-based stream every producer and consumer
//!   speaks
//!
//! ## Key Invariants
//!
//! - Partitions appear in strictly increasing decorated key order
//! - A partition start precedes, and a partition end follows, every other
//!   fragment of its partition
//! - Within a partition, clustering rows are strictly ordered by position

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clustering;
mod error;
mod fragment;
mod reader;
mod types;
mod validator;

pub use clustering::{BoundWeight, ClusteringKey, Position};
pub use error::{StreamError, StreamResult};
pub use fragment::{
    Cell, ClusteringRow, FragmentKind, MutationFragment, PartitionStart, RangeTombstoneChange, Row,
};
pub use reader::FragmentReader;
pub use types::{ColumnId, Timestamp, Tombstone};
pub use validator::{validate_fragments, FragmentStreamValidator};

/// Re-export of the key model.
pub use tessera_keys as keys;
