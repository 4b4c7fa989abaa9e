//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tessera_core::{
    Cell, ClusteringKey, ClusteringRow, ColumnId, FragmentReader, MutationFragment, Row,
    StreamError, Timestamp,
};
use tessera_keys::{ColumnType, Key, Partitioner, Schema, Sha256Partitioner, StaticSharder};

/// Shape of a generated workload.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    /// Number of partitions.
    pub partitions: usize,
    /// Clustering rows per partition.
    pub rows: usize,
    /// Cells per row.
    pub cells: usize,
    /// Timestamps are drawn from `0..timestamp_spread`.
    pub timestamp_spread: i64,
}

impl Workload {
    /// Total number of fragments the workload produces.
    pub fn fragment_count(&self) -> usize {
        self.partitions * (self.rows + 2)
    }

    /// Generates the workload's schema and fragments.
    pub fn generate(&self, shard_count: u32) -> (Arc<Schema>, Vec<MutationFragment>) {
        let schema = Arc::new(
            Schema::new("bench", "events", vec![ColumnType::Blob])
                .with_clustering_columns(1)
                .with_sharder(StaticSharder::new(shard_count, 0)),
        );
        let mut rng = StdRng::seed_from_u64(0x7e55e7a);

        let mut keys: Vec<_> = (0..self.partitions)
            .map(|i| {
                Sha256Partitioner.decorate(Key::from_bytes(format!("partition-{i}").into_bytes()))
            })
            .collect();
        keys.sort();

        let mut fragments = Vec::with_capacity(self.fragment_count());
        for key in keys {
            fragments.push(MutationFragment::partition_start(key, None));
            for row in 0..self.rows {
                let clustering =
                    ClusteringKey::new([Bytes::copy_from_slice(&(row as u32).to_be_bytes())]);
                let cells: Row = (0..self.cells)
                    .map(|column| {
                        Cell::new(
                            ColumnId(column as u32),
                            Bytes::from_static(b"value"),
                            Timestamp(rng.gen_range(0..self.timestamp_spread)),
                        )
                    })
                    .collect();
                fragments.push(MutationFragment::clustering_row(ClusteringRow::new(
                    clustering, cells,
                )));
            }
            fragments.push(MutationFragment::partition_end());
        }
        (schema, fragments)
    }
}

/// A reader over a copy of `fragments`.
pub fn reader(schema: &Arc<Schema>, fragments: &[MutationFragment]) -> FragmentReader {
    FragmentReader::from_fragments(Arc::clone(schema), fragments.to_vec())
}

/// A sink that reads its stream to the end and discards it.
pub async fn drain(mut stream: FragmentReader) -> Result<(), StreamError> {
    while stream.next_fragment().await?.is_some() {}
    Ok(())
}
