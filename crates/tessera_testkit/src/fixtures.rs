//! Test fixtures: schemas, keys, fragment builders and a recording sink.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tessera_core::{
    Cell, ClusteringKey, ClusteringRow, ColumnId, FragmentReader, MutationFragment, Position, Row,
    StreamResult, Timestamp, Tombstone,
};
use tessera_keys::{
    ColumnType, DecoratedKey, Key, Partitioner, Schema, Sha256Partitioner, StaticSharder, Token,
};

/// A schema with one blob partition key column and one clustering column.
pub fn test_schema() -> Arc<Schema> {
    Arc::new(Schema::new("test", "events", vec![ColumnType::Blob]).with_clustering_columns(1))
}

/// [`test_schema`] with the given sharder.
pub fn sharded_schema(shard_count: u32, ignore_msb_bits: u32) -> Arc<Schema> {
    Arc::new(
        Schema::new("test", "events", vec![ColumnType::Blob])
            .with_clustering_columns(1)
            .with_sharder(StaticSharder::new(shard_count, ignore_msb_bits)),
    )
}

/// A regular key with `name` as its single component.
pub fn key(name: &str) -> Key {
    Key::from_bytes(Bytes::copy_from_slice(name.as_bytes()))
}

/// `name` decorated with its SHA-256 token.
pub fn decorated(name: &str) -> DecoratedKey {
    Sha256Partitioner.decorate(key(name))
}

/// `name` decorated with an explicit token.
pub fn decorated_with_token(token: i64, name: &str) -> DecoratedKey {
    DecoratedKey::new(Token(token), key(name))
}

/// A single-component clustering key holding `value` big-endian.
pub fn ck(value: i32) -> ClusteringKey {
    ClusteringKey::new([Bytes::copy_from_slice(&value.to_be_bytes())])
}

/// A cell in `column` written at `ts`.
pub fn cell(column: u32, ts: i64) -> Cell {
    Cell::new(ColumnId(column), Bytes::copy_from_slice(&ts.to_be_bytes()), Timestamp(ts))
}

/// Cells from `(column, timestamp)` pairs.
pub fn cells(columns: &[(u32, i64)]) -> Row {
    columns.iter().map(|&(column, ts)| cell(column, ts)).collect()
}

/// Builds the fragments of one partition.
#[derive(Debug, Clone)]
pub struct PartitionBuilder {
    key: DecoratedKey,
    tombstone: Option<Tombstone>,
    body: Vec<MutationFragment>,
}

impl PartitionBuilder {
    /// Starts a partition.
    pub fn new(key: DecoratedKey) -> Self {
        Self {
            key,
            tombstone: None,
            body: Vec::new(),
        }
    }

    /// Sets the partition tombstone.
    #[must_use]
    pub fn tombstone(mut self, ts: i64) -> Self {
        self.tombstone = Some(Tombstone::new(Timestamp(ts), 0));
        self
    }

    /// Adds the static row.
    #[must_use]
    pub fn static_row(mut self, columns: &[(u32, i64)]) -> Self {
        self.body.push(MutationFragment::static_row(cells(columns)));
        self
    }

    /// Adds a clustering row with the given cells.
    #[must_use]
    pub fn row(self, clustering: i32, columns: &[(u32, i64)]) -> Self {
        self.clustering_row(ClusteringRow::new(ck(clustering), cells(columns)))
    }

    /// Adds a prepared clustering row.
    #[must_use]
    pub fn clustering_row(mut self, row: ClusteringRow) -> Self {
        self.body.push(MutationFragment::clustering_row(row));
        self
    }

    /// Opens or replaces a range tombstone at `position`.
    #[must_use]
    pub fn range_tombstone(mut self, position: Position, ts: i64) -> Self {
        self.body.push(MutationFragment::range_tombstone_change(
            position,
            Some(Tombstone::new(Timestamp(ts), 0)),
        ));
        self
    }

    /// Closes the open range tombstone at `position`.
    #[must_use]
    pub fn close_range_tombstone(mut self, position: Position) -> Self {
        self.body
            .push(MutationFragment::range_tombstone_change(position, None));
        self
    }

    /// Returns the framed fragments.
    pub fn build(self) -> Vec<MutationFragment> {
        let mut fragments = Vec::with_capacity(self.body.len() + 2);
        fragments.push(MutationFragment::partition_start(self.key, self.tombstone));
        fragments.extend(self.body);
        fragments.push(MutationFragment::partition_end());
        fragments
    }
}

/// A reader over `fragments`.
pub fn reader(schema: &Arc<Schema>, fragments: Vec<MutationFragment>) -> FragmentReader {
    FragmentReader::from_fragments(Arc::clone(schema), fragments)
}

/// Decorated keys of the partitions in `fragments`, in order.
pub fn partitions_of(fragments: &[MutationFragment]) -> Vec<DecoratedKey> {
    fragments
        .iter()
        .filter_map(|f| match f {
            MutationFragment::PartitionStart(start) => Some(start.key.clone()),
            _ => None,
        })
        .collect()
}

/// Panics unless `fragments` form a well-formed stream.
pub fn assert_well_formed(fragments: &[MutationFragment]) {
    if let Err(e) = tessera_core::validate_fragments(fragments) {
        panic!("malformed fragment stream: {e}\n{fragments:#?}");
    }
}

#[derive(Debug)]
struct Recorded<B> {
    opened: Vec<B>,
    completed: Vec<B>,
    outputs: BTreeMap<B, Vec<MutationFragment>>,
}

/// Records what each bucket's sink receives.
///
/// Fragments are recorded as they arrive, so a failed run still shows the
/// partial output.
#[derive(Debug)]
pub struct RecordingSink<B> {
    inner: Arc<Mutex<Recorded<B>>>,
}

impl<B> Clone for RecordingSink<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Ord + Clone + Send + 'static> Default for RecordingSink<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Ord + Clone + Send + 'static> RecordingSink<B> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorded {
                opened: Vec::new(),
                completed: Vec::new(),
                outputs: BTreeMap::new(),
            })),
        }
    }

    /// A consumer that drains each bucket's stream into this recorder.
    pub fn consumer(
        &self,
    ) -> impl FnMut(B, FragmentReader) -> BoxFuture<'static, StreamResult<()>> + Send + 'static {
        let sink = self.clone();
        move |bucket, reader| sink.clone().record(bucket, reader).boxed()
    }

    async fn record(self, bucket: B, mut reader: FragmentReader) -> StreamResult<()> {
        {
            let mut inner = self.inner.lock();
            inner.opened.push(bucket.clone());
            inner.outputs.entry(bucket.clone()).or_default();
        }
        while let Some(fragment) = reader.next_fragment().await? {
            self.inner
                .lock()
                .outputs
                .entry(bucket.clone())
                .or_default()
                .push(fragment);
        }
        self.inner.lock().completed.push(bucket);
        Ok(())
    }

    /// Buckets in the order their sinks started.
    pub fn opened(&self) -> Vec<B> {
        self.inner.lock().opened.clone()
    }

    /// Buckets whose sinks reached end of stream.
    pub fn completed(&self) -> Vec<B> {
        self.inner.lock().completed.clone()
    }

    /// Everything received, by bucket.
    pub fn outputs(&self) -> BTreeMap<B, Vec<MutationFragment>> {
        self.inner.lock().outputs.clone()
    }

    /// What `bucket` received.
    pub fn fragments(&self, bucket: &B) -> Vec<MutationFragment> {
        self.inner
            .lock()
            .outputs
            .get(bucket)
            .cloned()
            .unwrap_or_default()
    }
}
