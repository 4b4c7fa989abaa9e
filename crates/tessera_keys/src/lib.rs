//! # Tessera Keys
//!
//! The ordering contract of the Tessera storage layer.
//!
//! This crate provides:
//! - [`Key`] and [`KeyView`]: encoded partition keys with unsigned
//!   lexicographic ordering and the `minimum`/`maximum` sentinels
//! - Composite encoding of multi-column keys and schema validation
//! - [`Token`], [`DecoratedKey`] and [`DecoratedKeyView`] for ring placement,
//!   with [`TokenBound`] for comparing partitions against bare tokens
//! - [`Partitioner`] and [`Sharder`] implementations
//!
//! ## Example
//!
//! ```rust
//! use tessera_keys::{ColumnType, Key, Partitioner, Schema, Sha256Partitioner};
//!
//! let schema = Schema::new("ks", "users", vec![ColumnType::Text]);
//! let key = Key::from_exploded(&schema, [b"alice"]).unwrap();
//! key.validate(&schema).unwrap();
//!
//! assert!(Key::minimum() < key && key < Key::maximum());
//! let dk = Sha256Partitioner.decorate(key);
//! assert_eq!(dk.key().explode(&schema).unwrap(), vec![&b"alice"[..]]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod composite;
mod error;
mod key;
mod schema;
mod sharder;
mod token;

pub use error::{KeyResult, MarshalError};
pub use key::{Key, KeyKind, KeyView};
pub use schema::{ColumnType, Schema};
pub use sharder::{ShardId, Sharder, StaticSharder};
pub use token::{
    DecoratedKey, DecoratedKeyView, Partitioner, Sha256Partitioner, Token, TokenBound,
};
