//! Segregation by write timestamp.
//!
//! Every timestamped piece of data is classified on its own: the partition
//! tombstone, each cell, each row marker and row tombstone, and each range
//! tombstone. A row whose pieces fall into different buckets is split into
//! one row per bucket at the same position. A row with no data at all is
//! classified as [`Timestamp::MISSING`].
//!
//! ## Range tombstones
//!
//! At most one range tombstone is open at a time and it lives in exactly
//! one bucket. When a change moves the open tombstone to another bucket,
//! the previous bucket gets a closing change at the same position first.
//! A closing change goes to the bucket holding the open tombstone.

use crate::consumer::BucketId;
use crate::error::{SegregateError, SegregateResult};
use crate::router::{Routed, Router};
use std::collections::{BTreeMap, BTreeSet};
use tessera_core::{
    Cell, ClusteringRow, MutationFragment, PartitionStart, Position, RangeTombstoneChange, Row,
    StreamError, Timestamp,
};
use tessera_keys::DecoratedKey;
use tracing::trace;

/// The partition being routed.
#[derive(Debug)]
struct OpenPartition<B> {
    key: DecoratedKey,
    opened: BTreeSet<B>,
    open_tombstone: Option<B>,
}

impl<B: BucketId> OpenPartition<B> {
    fn new(key: DecoratedKey) -> Self {
        Self {
            key,
            opened: BTreeSet::new(),
            open_tombstone: None,
        }
    }

    /// Emits a partition start on `bucket` unless it already has one.
    fn ensure_open(&mut self, bucket: &B, out: &mut Routed<B>) {
        if self.opened.insert(bucket.clone()) {
            out.push((
                bucket.clone(),
                MutationFragment::partition_start(self.key.clone(), None),
            ));
        }
    }

    /// Closes the open range tombstone, if any, at `position`.
    fn close_tombstone(&mut self, position: Position, out: &mut Routed<B>) {
        if let Some(holder) = self.open_tombstone.take() {
            out.push((holder, MutationFragment::range_tombstone_change(position, None)));
        }
    }

    /// Ends the partition on every bucket it was opened in.
    fn finish(mut self, out: &mut Routed<B>) {
        self.close_tombstone(Position::after_all_rows(), out);
        for bucket in self.opened {
            out.push((bucket, MutationFragment::partition_end()));
        }
    }
}

/// Routes the pieces of each partition to buckets chosen by a timestamp
/// classifier.
pub(crate) struct TimestampRouter<B, F> {
    classify: F,
    partition: Option<OpenPartition<B>>,
}

impl<B, F> TimestampRouter<B, F>
where
    B: BucketId,
    F: FnMut(Timestamp) -> B,
{
    pub(crate) fn new(classify: F) -> Self {
        Self {
            classify,
            partition: None,
        }
    }

    fn route_start(&mut self, start: PartitionStart, out: &mut Routed<B>) -> SegregateResult<()> {
        if let Some(open) = &self.partition {
            return Err(SegregateError::Producer(StreamError::invalid_stream(format!(
                "partition start for {} inside partition {}",
                start.key, open.key
            ))));
        }
        let mut open = OpenPartition::new(start.key.clone());
        if let Some(tombstone) = start.tombstone {
            let bucket = (self.classify)(tombstone.timestamp);
            open.opened.insert(bucket.clone());
            out.push((bucket, MutationFragment::PartitionStart(start)));
        }
        self.partition = Some(open);
        Ok(())
    }

    fn route_static_row(&mut self, row: Row, out: &mut Routed<B>) -> SegregateResult<()> {
        let classify = &mut self.classify;
        let open = require_partition(&mut self.partition, "static row")?;
        for (bucket, part) in split_static_row(row, classify) {
            open.ensure_open(&bucket, out);
            out.push((bucket, MutationFragment::static_row(part)));
        }
        Ok(())
    }

    fn route_clustering_row(
        &mut self,
        row: ClusteringRow,
        out: &mut Routed<B>,
    ) -> SegregateResult<()> {
        let classify = &mut self.classify;
        let open = require_partition(&mut self.partition, "clustering row")?;
        for (bucket, part) in split_clustering_row(row, classify) {
            open.ensure_open(&bucket, out);
            out.push((bucket, MutationFragment::clustering_row(part)));
        }
        Ok(())
    }

    fn route_range_tombstone_change(
        &mut self,
        change: RangeTombstoneChange,
        out: &mut Routed<B>,
    ) -> SegregateResult<()> {
        let classify = &mut self.classify;
        let open = require_partition(&mut self.partition, "range tombstone change")?;
        let RangeTombstoneChange { position, tombstone } = change;
        match tombstone {
            Some(tombstone) => {
                let bucket = classify(tombstone.timestamp);
                if open.open_tombstone.as_ref().is_some_and(|holder| *holder != bucket) {
                    open.close_tombstone(position.clone(), out);
                }
                open.ensure_open(&bucket, out);
                out.push((
                    bucket.clone(),
                    MutationFragment::range_tombstone_change(position, Some(tombstone)),
                ));
                open.open_tombstone = Some(bucket);
            }
            None => {
                if open.open_tombstone.is_some() {
                    open.close_tombstone(position, out);
                } else {
                    trace!(%position, "ignoring close of a range tombstone that is not open");
                }
            }
        }
        Ok(())
    }
}

impl<B, F> Router for TimestampRouter<B, F>
where
    B: BucketId,
    F: FnMut(Timestamp) -> B,
{
    type Bucket = B;

    fn route(&mut self, fragment: MutationFragment, out: &mut Routed<B>) -> SegregateResult<()> {
        match fragment {
            MutationFragment::PartitionStart(start) => self.route_start(start, out),
            MutationFragment::StaticRow(row) => self.route_static_row(row, out),
            MutationFragment::ClusteringRow(row) => self.route_clustering_row(row, out),
            MutationFragment::RangeTombstoneChange(change) => {
                self.route_range_tombstone_change(change, out)
            }
            MutationFragment::PartitionEnd => {
                let open = self.partition.take().ok_or_else(|| {
                    SegregateError::Producer(StreamError::invalid_stream(
                        "partition end outside of a partition",
                    ))
                })?;
                open.finish(out);
                Ok(())
            }
        }
    }

    fn close_partition(&mut self, out: &mut Routed<B>) {
        if let Some(open) = self.partition.take() {
            open.finish(out);
        }
    }

    fn in_partition(&self) -> bool {
        self.partition.is_some()
    }
}

fn require_partition<'a, B>(
    partition: &'a mut Option<OpenPartition<B>>,
    what: &str,
) -> SegregateResult<&'a mut OpenPartition<B>> {
    partition.as_mut().ok_or_else(|| {
        SegregateError::Producer(StreamError::invalid_stream(format!(
            "{what} outside of a partition"
        )))
    })
}

/// Groups cells by bucket, keeping column order within each group.
fn split_cells<B, F>(cells: Vec<Cell>, classify: &mut F) -> BTreeMap<B, Vec<Cell>>
where
    B: Ord,
    F: FnMut(Timestamp) -> B,
{
    let mut parts: BTreeMap<B, Vec<Cell>> = BTreeMap::new();
    for cell in cells {
        parts.entry(classify(cell.timestamp)).or_default().push(cell);
    }
    parts
}

/// Splits a static row into one row per bucket.
fn split_static_row<B, F>(row: Row, classify: &mut F) -> BTreeMap<B, Row>
where
    B: Ord,
    F: FnMut(Timestamp) -> B,
{
    if row.is_empty() {
        return BTreeMap::from([(classify(Timestamp::MISSING), row)]);
    }
    split_cells(row.into_cells(), classify)
        .into_iter()
        .map(|(bucket, cells)| (bucket, Row::new(cells)))
        .collect()
}

/// Splits a clustering row into one row per bucket, all at the row's key.
fn split_clustering_row<B, F>(row: ClusteringRow, classify: &mut F) -> BTreeMap<B, ClusteringRow>
where
    B: Ord,
    F: FnMut(Timestamp) -> B,
{
    let mut parts: BTreeMap<B, ClusteringRow> = BTreeMap::new();
    if row.is_empty() {
        parts.insert(classify(Timestamp::MISSING), row);
        return parts;
    }

    let ClusteringRow {
        key,
        tombstone,
        marker,
        row: cells,
    } = row;
    let empty_part = || ClusteringRow::new(key.clone(), Row::default());
    if let Some(marker) = marker {
        parts.entry(classify(marker)).or_insert_with(empty_part).marker = Some(marker);
    }
    if let Some(tombstone) = tombstone {
        parts
            .entry(classify(tombstone.timestamp))
            .or_insert_with(empty_part)
            .tombstone = Some(tombstone);
    }
    for (bucket, cells) in split_cells(cells.into_cells(), classify) {
        parts.entry(bucket).or_insert_with(empty_part).row = Row::new(cells);
    }
    parts
}
