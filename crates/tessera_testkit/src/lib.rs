//! # Tessera Testkit
//!
//! Test utilities for Tessera.
//!
//! This crate provides:
//! - Schemas, keys and fragment builders for hand-written scenarios
//! - A recording sink that captures what each bucket receives
//! - Property-based generators of well-formed fragment streams
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_testkit::prelude::*;
//!
//! let schema = test_schema();
//! let fragments = PartitionBuilder::new(decorated_with_token(1, "a"))
//!     .row(1, &[(0, 10)])
//!     .build();
//! let sink = RecordingSink::<i64>::new();
//! segregate_by_timestamp(reader(&schema, fragments), |ts| ts.value(), sink.consumer()).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
