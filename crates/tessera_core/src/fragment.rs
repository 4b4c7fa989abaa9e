//! Mutation fragments.
//!
//! A mutation stream is a sequence of partitions, each framed by a
//! [`MutationFragment::PartitionStart`] and a [`MutationFragment::PartitionEnd`].
//! Between them come an optional static row followed by clustering rows and
//! range tombstone changes in clustering order.

use crate::clustering::{ClusteringKey, Position};
use crate::types::{ColumnId, Timestamp, Tombstone};
use bytes::Bytes;
use std::fmt;
use tessera_keys::DecoratedKey;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Column the value belongs to.
    pub column: ColumnId,
    /// Serialized value.
    pub value: Bytes,
    /// Write timestamp.
    pub timestamp: Timestamp,
}

impl Cell {
    /// Creates a cell.
    pub fn new(column: ColumnId, value: impl Into<Bytes>, timestamp: Timestamp) -> Self {
        Self {
            column,
            value: value.into(),
            timestamp,
        }
    }
}

/// The cells of a row, kept sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// Creates a row; cells are sorted by column.
    pub fn new(mut cells: Vec<Cell>) -> Self {
        cells.sort_by_key(|c| c.column);
        Self { cells }
    }

    /// The cells, in column order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Consumes the row and returns its cells.
    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    /// Write timestamps of the cells, in column order.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.cells.iter().map(|c| c.timestamp)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<T: IntoIterator<Item = Cell>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// A row at a clustering position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusteringRow {
    /// Clustering key of the row.
    pub key: ClusteringKey,
    /// Row-level deletion.
    pub tombstone: Option<Tombstone>,
    /// Row marker (liveness) timestamp.
    pub marker: Option<Timestamp>,
    /// Regular column cells.
    pub row: Row,
}

impl ClusteringRow {
    /// Creates a row with cells and no marker or tombstone.
    pub fn new(key: ClusteringKey, row: Row) -> Self {
        Self {
            key,
            tombstone: None,
            marker: None,
            row,
        }
    }

    /// Sets the row marker.
    #[must_use]
    pub fn with_marker(mut self, timestamp: Timestamp) -> Self {
        self.marker = Some(timestamp);
        self
    }

    /// Sets the row tombstone.
    #[must_use]
    pub fn with_tombstone(mut self, tombstone: Tombstone) -> Self {
        self.tombstone = Some(tombstone);
        self
    }

    /// The row's position.
    pub fn position(&self) -> Position {
        Position::at_key(self.key.clone())
    }

    /// Every write timestamp the row carries: marker, tombstone, cells.
    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.marker
            .into_iter()
            .chain(self.tombstone.map(|t| t.timestamp))
            .chain(self.row.cells().iter().map(|c| c.timestamp))
    }

    /// Returns true if the row carries no data at all.
    pub fn is_empty(&self) -> bool {
        self.marker.is_none() && self.tombstone.is_none() && self.row.is_empty()
    }
}

/// Opens a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionStart {
    /// The partition's decorated key.
    pub key: DecoratedKey,
    /// Partition-level deletion.
    pub tombstone: Option<Tombstone>,
}

/// Opens, replaces or closes the range tombstone in effect from `position`.
///
/// `tombstone: None` closes the currently open range tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeTombstoneChange {
    /// Where the change takes effect.
    pub position: Position,
    /// The tombstone in effect after `position`, if any.
    pub tombstone: Option<Tombstone>,
}

/// Kind tag of a [`MutationFragment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    /// See [`MutationFragment::PartitionStart`].
    PartitionStart,
    /// See [`MutationFragment::StaticRow`].
    StaticRow,
    /// See [`MutationFragment::ClusteringRow`].
    ClusteringRow,
    /// See [`MutationFragment::RangeTombstoneChange`].
    RangeTombstoneChange,
    /// See [`MutationFragment::PartitionEnd`].
    PartitionEnd,
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FragmentKind::PartitionStart => "partition start",
            FragmentKind::StaticRow => "static row",
            FragmentKind::ClusteringRow => "clustering row",
            FragmentKind::RangeTombstoneChange => "range tombstone change",
            FragmentKind::PartitionEnd => "partition end",
        };
        f.write_str(name)
    }
}

/// One element of a mutation stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MutationFragment {
    /// Start of a partition.
    PartitionStart(PartitionStart),
    /// The partition's static row.
    StaticRow(Row),
    /// A clustering row.
    ClusteringRow(ClusteringRow),
    /// A range tombstone bound.
    RangeTombstoneChange(RangeTombstoneChange),
    /// End of the current partition.
    PartitionEnd,
}

impl MutationFragment {
    /// Creates a partition start.
    pub fn partition_start(key: DecoratedKey, tombstone: Option<Tombstone>) -> Self {
        Self::PartitionStart(PartitionStart { key, tombstone })
    }

    /// Creates a static row.
    pub fn static_row(row: Row) -> Self {
        Self::StaticRow(row)
    }

    /// Creates a clustering row.
    pub fn clustering_row(row: ClusteringRow) -> Self {
        Self::ClusteringRow(row)
    }

    /// Creates a range tombstone change.
    pub fn range_tombstone_change(position: Position, tombstone: Option<Tombstone>) -> Self {
        Self::RangeTombstoneChange(RangeTombstoneChange {
            position,
            tombstone,
        })
    }

    /// Creates a partition end.
    pub fn partition_end() -> Self {
        Self::PartitionEnd
    }

    /// The fragment's kind.
    pub fn kind(&self) -> FragmentKind {
        match self {
            MutationFragment::PartitionStart(_) => FragmentKind::PartitionStart,
            MutationFragment::StaticRow(_) => FragmentKind::StaticRow,
            MutationFragment::ClusteringRow(_) => FragmentKind::ClusteringRow,
            MutationFragment::RangeTombstoneChange(_) => FragmentKind::RangeTombstoneChange,
            MutationFragment::PartitionEnd => FragmentKind::PartitionEnd,
        }
    }

    /// Clustering position of rows and range tombstone changes.
    pub fn position(&self) -> Option<Position> {
        match self {
            MutationFragment::ClusteringRow(row) => Some(row.position()),
            MutationFragment::RangeTombstoneChange(rtc) => Some(rtc.position.clone()),
            _ => None,
        }
    }

    /// Returns true for static and clustering rows.
    pub fn is_row_like(&self) -> bool {
        matches!(
            self,
            MutationFragment::StaticRow(_) | MutationFragment::ClusteringRow(_)
        )
    }

    /// Returns true for partition starts.
    pub fn is_partition_start(&self) -> bool {
        matches!(self, MutationFragment::PartitionStart(_))
    }

    /// Returns true for partition ends.
    pub fn is_partition_end(&self) -> bool {
        matches!(self, MutationFragment::PartitionEnd)
    }
}
