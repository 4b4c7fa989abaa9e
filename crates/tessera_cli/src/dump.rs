//! JSON mutation dumps.
//!
//! Input is a single JSON document: the table layout and its partitions,
//! each with a key given as one string per partition key column and a list
//! of tagged fragments. Partitions are decorated with the SHA-256
//! partitioner and sorted, so they may appear in any order.
//!
//! Output is one tagged fragment per line, with the partition's token.

use crate::error::{CliError, CliResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_core::{
    BoundWeight, Cell, ClusteringKey, ClusteringRow, ColumnId, MutationFragment, Position, Row,
    Timestamp, Tombstone,
};
use tessera_keys::{
    ColumnType, DecoratedKey, Key, Partitioner, Schema, Sha256Partitioner, StaticSharder,
};

/// Partition key column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTypeDto {
    /// Arbitrary bytes, given as a UTF-8 string.
    Blob,
    /// UTF-8 text.
    Text,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// UUID as 32 hex digits, dashes allowed.
    Uuid,
    /// `true` or `false`.
    Boolean,
}

impl From<ColumnTypeDto> for ColumnType {
    fn from(dto: ColumnTypeDto) -> Self {
        match dto {
            ColumnTypeDto::Blob => ColumnType::Blob,
            ColumnTypeDto::Text => ColumnType::Text,
            ColumnTypeDto::Int => ColumnType::Int,
            ColumnTypeDto::BigInt => ColumnType::BigInt,
            ColumnTypeDto::Uuid => ColumnType::Uuid,
            ColumnTypeDto::Boolean => ColumnType::Boolean,
        }
    }
}

/// A deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TombstoneDto {
    /// Write timestamp.
    pub timestamp: i64,
    /// Local deletion time.
    #[serde(default)]
    pub deletion_time: u32,
}

impl From<TombstoneDto> for Tombstone {
    fn from(dto: TombstoneDto) -> Self {
        Tombstone::new(Timestamp(dto.timestamp), dto.deletion_time)
    }
}

impl From<Tombstone> for TombstoneDto {
    fn from(t: Tombstone) -> Self {
        Self {
            timestamp: t.timestamp.value(),
            deletion_time: t.deletion_time,
        }
    }
}

/// A cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellDto {
    /// Column ID.
    pub column: u32,
    /// Value, as UTF-8.
    pub value: String,
    /// Write timestamp.
    pub timestamp: i64,
}

/// Where a position sits relative to its clustering prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightDto {
    /// Before the prefix.
    Before,
    /// At the key.
    At,
    /// After the prefix.
    After,
}

/// A clustering position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDto {
    /// Clustering key prefix components.
    #[serde(default)]
    pub clustering: Vec<String>,
    /// Bound weight.
    pub weight: WeightDto,
}

/// A tagged fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FragmentDto {
    /// Partition start; output only.
    PartitionStart {
        /// Partition token.
        token: i64,
        /// Partition key components.
        key: Vec<String>,
        /// Partition tombstone.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tombstone: Option<TombstoneDto>,
    },
    /// Static row.
    StaticRow {
        /// Cells.
        #[serde(default)]
        cells: Vec<CellDto>,
    },
    /// Clustering row.
    Row {
        /// Clustering key components.
        clustering: Vec<String>,
        /// Row marker timestamp.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        marker: Option<i64>,
        /// Row tombstone.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tombstone: Option<TombstoneDto>,
        /// Cells.
        #[serde(default)]
        cells: Vec<CellDto>,
    },
    /// Range tombstone change; a missing tombstone closes the open one.
    RangeTombstoneChange {
        /// Position of the change.
        position: PositionDto,
        /// Tombstone in effect after the position.
        #[serde(default)]
        tombstone: Option<TombstoneDto>,
    },
    /// Partition end; output only.
    PartitionEnd,
}

/// One partition of a dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionDto {
    /// Partition key, one string per column.
    pub key: Vec<String>,
    /// Partition tombstone.
    #[serde(default)]
    pub tombstone: Option<TombstoneDto>,
    /// Static row, clustering rows and range tombstone changes, in
    /// clustering order.
    #[serde(default)]
    pub fragments: Vec<FragmentDto>,
}

/// A table dump.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dump {
    /// Keyspace name.
    pub keyspace: String,
    /// Table name.
    pub table: String,
    /// Partition key column types.
    pub partition_key: Vec<ColumnTypeDto>,
    /// Number of clustering columns.
    #[serde(default)]
    pub clustering_columns: usize,
    /// Partitions, in any order.
    pub partitions: Vec<PartitionDto>,
}

impl Dump {
    /// Reads a dump from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The dump's schema, with the given sharder.
    pub fn schema(&self, sharder: StaticSharder) -> Schema {
        Schema::new(
            self.keyspace.clone(),
            self.table.clone(),
            self.partition_key.iter().copied().map(ColumnType::from).collect(),
        )
        .with_clustering_columns(self.clustering_columns)
        .with_sharder(sharder)
    }

    /// Converts the dump into a fragment stream ordered by decorated key.
    ///
    /// # Errors
    ///
    /// Returns an error if a key does not match the schema or a partition
    /// lists framing fragments itself.
    pub fn into_fragments(self, schema: &Schema) -> CliResult<Vec<MutationFragment>> {
        let mut partitions = self
            .partitions
            .into_iter()
            .map(|p| decode_partition(schema, p))
            .collect::<CliResult<Vec<_>>>()?;
        partitions.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fragments = Vec::new();
        for (key, tombstone, body) in partitions {
            fragments.push(MutationFragment::partition_start(key, tombstone));
            fragments.extend(body);
            fragments.push(MutationFragment::partition_end());
        }
        Ok(fragments)
    }
}

type DecodedPartition = (DecoratedKey, Option<Tombstone>, Vec<MutationFragment>);

fn decode_partition(schema: &Schema, partition: PartitionDto) -> CliResult<DecodedPartition> {
    if partition.key.len() != schema.partition_key_size() {
        return Err(CliError::dump(format!(
            "partition key {:?} has {} components, table {} expects {}",
            partition.key,
            partition.key.len(),
            schema,
            schema.partition_key_size()
        )));
    }
    let components = schema
        .partition_key_columns()
        .iter()
        .zip(&partition.key)
        .map(|(ty, value)| encode_component(*ty, value))
        .collect::<CliResult<Vec<_>>>()?;
    let key = Key::from_exploded(schema, &components)?;
    key.validate(schema)?;
    let key = Sha256Partitioner.decorate(key);

    let body = partition
        .fragments
        .into_iter()
        .map(decode_fragment)
        .collect::<CliResult<Vec<_>>>()?;
    Ok((key, partition.tombstone.map(Tombstone::from), body))
}

fn decode_fragment(dto: FragmentDto) -> CliResult<MutationFragment> {
    match dto {
        FragmentDto::PartitionStart { .. } | FragmentDto::PartitionEnd => Err(CliError::dump(
            "partition framing is implied and may not appear in a partition's fragments",
        )),
        FragmentDto::StaticRow { cells } => Ok(MutationFragment::static_row(decode_cells(cells))),
        FragmentDto::Row {
            clustering,
            marker,
            tombstone,
            cells,
        } => {
            let mut row = ClusteringRow::new(clustering_key(clustering), decode_cells(cells));
            row.marker = marker.map(Timestamp);
            row.tombstone = tombstone.map(Tombstone::from);
            Ok(MutationFragment::clustering_row(row))
        }
        FragmentDto::RangeTombstoneChange {
            position,
            tombstone,
        } => {
            let weight = match position.weight {
                WeightDto::Before => BoundWeight::Before,
                WeightDto::At => BoundWeight::At,
                WeightDto::After => BoundWeight::After,
            };
            Ok(MutationFragment::range_tombstone_change(
                Position::new(clustering_key(position.clustering), weight),
                tombstone.map(Tombstone::from),
            ))
        }
    }
}

fn clustering_key(components: Vec<String>) -> ClusteringKey {
    ClusteringKey::new(components.into_iter().map(String::into_bytes))
}

fn decode_cells(cells: Vec<CellDto>) -> Row {
    cells
        .into_iter()
        .map(|c| Cell::new(ColumnId(c.column), c.value.into_bytes(), Timestamp(c.timestamp)))
        .collect()
}

/// Encodes one partition key component from its string form.
fn encode_component(ty: ColumnType, value: &str) -> CliResult<Vec<u8>> {
    let invalid = || CliError::dump(format!("{value:?} is not a valid {}", ty.name()));
    let bytes = match ty {
        ColumnType::Blob | ColumnType::Text => value.as_bytes().to_vec(),
        ColumnType::Int => value.parse::<i32>().map_err(|_| invalid())?.to_be_bytes().to_vec(),
        ColumnType::BigInt => value.parse::<i64>().map_err(|_| invalid())?.to_be_bytes().to_vec(),
        ColumnType::Boolean => match value {
            "true" => vec![1],
            "false" => vec![0],
            _ => return Err(invalid()),
        },
        ColumnType::Uuid => {
            let hex: Vec<u8> = value.bytes().filter(|b| *b != b'-').collect();
            if hex.len() != 32 {
                return Err(invalid());
            }
            hex.chunks(2)
                .map(|pair| {
                    std::str::from_utf8(pair)
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 16).ok())
                        .ok_or_else(invalid)
                })
                .collect::<CliResult<Vec<u8>>>()?
        }
    };
    Ok(bytes)
}

/// Renders one partition key component in string form.
fn render_component(ty: ColumnType, bytes: &[u8]) -> String {
    match ty {
        ColumnType::Int => bytes
            .try_into()
            .map(|b| i32::from_be_bytes(b).to_string())
            .unwrap_or_default(),
        ColumnType::BigInt => bytes
            .try_into()
            .map(|b| i64::from_be_bytes(b).to_string())
            .unwrap_or_default(),
        ColumnType::Boolean => (bytes.first() == Some(&1)).to_string(),
        ColumnType::Uuid => bytes.iter().map(|b| format!("{b:02x}")).collect(),
        ColumnType::Blob | ColumnType::Text => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn render_strings(components: &[Bytes]) -> Vec<String> {
    components
        .iter()
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

fn encode_cells(row: &Row) -> Vec<CellDto> {
    row.cells()
        .iter()
        .map(|c| CellDto {
            column: c.column.as_u32(),
            value: String::from_utf8_lossy(&c.value).into_owned(),
            timestamp: c.timestamp.value(),
        })
        .collect()
}

/// Converts a fragment to its output form.
///
/// # Errors
///
/// Returns an error if a partition key does not decode under `schema`.
pub fn encode_fragment(schema: &Schema, fragment: &MutationFragment) -> CliResult<FragmentDto> {
    let dto = match fragment {
        MutationFragment::PartitionStart(start) => FragmentDto::PartitionStart {
            token: start.key.token().value(),
            key: start
                .key
                .key()
                .explode(schema)?
                .into_iter()
                .zip(schema.partition_key_columns())
                .map(|(bytes, ty)| render_component(*ty, bytes))
                .collect(),
            tombstone: start.tombstone.map(TombstoneDto::from),
        },
        MutationFragment::StaticRow(row) => FragmentDto::StaticRow {
            cells: encode_cells(row),
        },
        MutationFragment::ClusteringRow(row) => FragmentDto::Row {
            clustering: render_strings(row.key.components()),
            marker: row.marker.map(Timestamp::value),
            tombstone: row.tombstone.map(TombstoneDto::from),
            cells: encode_cells(&row.row),
        },
        MutationFragment::RangeTombstoneChange(change) => FragmentDto::RangeTombstoneChange {
            position: PositionDto {
                clustering: render_strings(change.position.key().components()),
                weight: match change.position.weight() {
                    BoundWeight::Before => WeightDto::Before,
                    BoundWeight::At => WeightDto::At,
                    BoundWeight::After => WeightDto::After,
                },
            },
            tombstone: change.tombstone.map(TombstoneDto::from),
        },
        MutationFragment::PartitionEnd => FragmentDto::PartitionEnd,
    };
    Ok(dto)
}
