//! # Tessera Writer
//!
//! Splits one ordered mutation stream into several ordered streams.
//!
//! This crate provides:
//! - [`segregate_by_shard`]: whole partitions routed to their owning shard
//! - [`segregate_by_timestamp`]: data routed by write timestamp, rows split
//!   and partitions re-framed per bucket
//! - [`Segregator`] for custom queue depth, input validation and
//!   cancellation
//!
//! ## Architecture
//!
//! A single dispatch loop owns the producer. Every bucket has a bounded
//! queue and a sink task, both created the first time the bucket receives a
//! fragment. A full queue suspends the dispatch loop, so a slow sink
//! throttles the producer. The run ends when the producer is exhausted and
//! every sink has been joined.
//!
//! ## Key Invariants
//!
//! - Each bucket receives a valid mutation stream: ordered, with every
//!   partition framed by exactly one start and one end
//! - Fragments reach a bucket in producer order
//! - No fragment is dropped
//! - A producer failure ends every open bucket stream with an error
//! - The first failure is reported; a failed run must be discarded
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_writer::segregate_by_timestamp;
//!
//! let stats = segregate_by_timestamp(
//!     reader,
//!     |ts| ts.value() / WINDOW,
//!     |window, mut stream| async move {
//!         while let Some(fragment) = stream.next_fragment().await? {
//!             write(window, fragment)?;
//!         }
//!         Ok::<_, tessera_core::StreamError>(())
//!     },
//! )
//! .await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bucket;
mod config;
mod consumer;
mod error;
mod router;
mod segregator;
mod shard;
mod stats;
mod timestamp;

pub use config::{SegregationConfig, DEFAULT_QUEUE_CAPACITY};
pub use consumer::BucketId;
pub use error::{BoxError, SegregateError, SegregateResult};
pub use segregator::{segregate_by_shard, segregate_by_timestamp, Segregator};
pub use stats::SegregationStats;

pub use tokio_util::sync::CancellationToken;
