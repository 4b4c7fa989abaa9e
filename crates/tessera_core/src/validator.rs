//! Fragment stream validation.
//!
//! ## Rules
//!
//! - Partitions appear in strictly increasing decorated key order
//! - Every partition is framed by exactly one start and one end
//! - A static row, if any, precedes all clustered fragments
//! - Clustering rows are strictly increasing in position; range tombstone
//!   changes never go backwards
//! - An open range tombstone is closed before its partition ends
//! - The stream does not end inside a partition

use crate::clustering::Position;
use crate::error::{StreamError, StreamResult};
use crate::fragment::MutationFragment;
use crate::types::Tombstone;
use std::sync::Arc;
use tessera_keys::{DecoratedKey, Schema};

/// Per-partition validation state.
#[derive(Debug)]
struct OpenPartition {
    key: DecoratedKey,
    seen_clustered: bool,
    seen_static: bool,
    last_position: Option<Position>,
    open_tombstone: Option<Tombstone>,
}

/// Checks that a fragment stream is well formed.
///
/// Feed every fragment to [`validate`](Self::validate) in order and call
/// [`on_end_of_stream`](Self::on_end_of_stream) when the stream ends.
#[derive(Debug, Default)]
pub struct FragmentStreamValidator {
    schema: Option<Arc<Schema>>,
    last_key: Option<DecoratedKey>,
    partition: Option<OpenPartition>,
    fragments: u64,
}

impl FragmentStreamValidator {
    /// Creates a validator for ordering and framing only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also validates every partition key against `schema`.
    #[must_use]
    pub fn with_key_validation(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Number of fragments validated so far.
    pub fn fragments(&self) -> u64 {
        self.fragments
    }

    /// Returns true while inside a partition.
    pub fn in_partition(&self) -> bool {
        self.partition.is_some()
    }

    /// Validates the next fragment.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidStream`] on an ordering or framing
    /// violation and [`StreamError::Marshal`] on a malformed key.
    pub fn validate(&mut self, fragment: &MutationFragment) -> StreamResult<()> {
        self.fragments += 1;
        let result = self.check(fragment);
        if let Err(e) = &result {
            tracing::debug!(fragment = self.fragments, error = %e, "fragment stream violation");
        }
        result
    }

    fn check(&mut self, fragment: &MutationFragment) -> StreamResult<()> {
        match fragment {
            MutationFragment::PartitionStart(start) => {
                if let Some(open) = &self.partition {
                    return Err(StreamError::invalid_stream(format!(
                        "partition start for {} inside partition {}",
                        start.key, open.key
                    )));
                }
                if let Some(last) = &self.last_key {
                    if start.key <= *last {
                        return Err(StreamError::invalid_stream(format!(
                            "partition {} does not sort after {}",
                            start.key, last
                        )));
                    }
                }
                if let Some(schema) = &self.schema {
                    start.key.key().validate(schema)?;
                }
                self.partition = Some(OpenPartition {
                    key: start.key.clone(),
                    seen_clustered: false,
                    seen_static: false,
                    last_position: None,
                    open_tombstone: None,
                });
                Ok(())
            }
            MutationFragment::StaticRow(_) => {
                let open = self.require_partition(fragment)?;
                if open.seen_static || open.seen_clustered {
                    return Err(StreamError::invalid_stream(format!(
                        "static row out of place in partition {}",
                        open.key
                    )));
                }
                open.seen_static = true;
                Ok(())
            }
            MutationFragment::ClusteringRow(row) => {
                let open = self.require_partition(fragment)?;
                let position = row.position();
                if let Some(last) = &open.last_position {
                    if position <= *last {
                        return Err(StreamError::invalid_stream(format!(
                            "clustering row at {position} not after {last} in partition {}",
                            open.key
                        )));
                    }
                }
                open.seen_clustered = true;
                open.last_position = Some(position);
                Ok(())
            }
            MutationFragment::RangeTombstoneChange(rtc) => {
                let open = self.require_partition(fragment)?;
                if let Some(last) = &open.last_position {
                    if rtc.position < *last {
                        return Err(StreamError::invalid_stream(format!(
                            "range tombstone change at {} goes back before {last} in partition {}",
                            rtc.position, open.key
                        )));
                    }
                }
                if rtc.tombstone.is_none() && open.open_tombstone.is_none() {
                    return Err(StreamError::invalid_stream(format!(
                        "range tombstone change at {} closes nothing in partition {}",
                        rtc.position, open.key
                    )));
                }
                open.seen_clustered = true;
                open.last_position = Some(rtc.position.clone());
                open.open_tombstone = rtc.tombstone;
                Ok(())
            }
            MutationFragment::PartitionEnd => {
                let open = self.require_partition(fragment)?;
                if open.open_tombstone.is_some() {
                    return Err(StreamError::invalid_stream(format!(
                        "partition {} ends with an open range tombstone",
                        open.key
                    )));
                }
                if let Some(open) = self.partition.take() {
                    self.last_key = Some(open.key);
                }
                Ok(())
            }
        }
    }

    fn require_partition(
        &mut self,
        fragment: &MutationFragment,
    ) -> StreamResult<&mut OpenPartition> {
        self.partition.as_mut().ok_or_else(|| {
            StreamError::invalid_stream(format!("{} outside of a partition", fragment.kind()))
        })
    }

    /// Validates that the stream may end here.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidStream`] if a partition is still open.
    pub fn on_end_of_stream(&self) -> StreamResult<()> {
        match &self.partition {
            Some(open) => Err(StreamError::invalid_stream(format!(
                "stream ended inside partition {}",
                open.key
            ))),
            None => Ok(()),
        }
    }
}

/// Validates a complete fragment sequence.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_fragments<'a, I>(fragments: I) -> StreamResult<()>
where
    I: IntoIterator<Item = &'a MutationFragment>,
{
    let mut validator = FragmentStreamValidator::new();
    for fragment in fragments {
        validator.validate(fragment)?;
    }
    validator.on_end_of_stream()
}
