//! Property-based test generators using proptest.
//!
//! Every generated fragment stream is well formed: partitions in strictly
//! increasing token order, rows in clustering order, and range tombstones
//! opened and closed in place.

use crate::fixtures::{cell, ck};
use bytes::Bytes;
use proptest::prelude::*;
use tessera_core::{
    Cell, ClusteringRow, MutationFragment, Position, Row, Timestamp, Tombstone,
};
use tessera_keys::{DecoratedKey, Key, Token};

/// Upper bound (exclusive) of generated timestamps.
pub const MAX_TIMESTAMP: i64 = 100;

/// Strategy for write timestamps in `0..MAX_TIMESTAMP`.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0..MAX_TIMESTAMP).prop_map(Timestamp)
}

fn cells_strategy() -> impl Strategy<Value = Vec<Cell>> {
    prop::collection::btree_map(0u32..6, 0..MAX_TIMESTAMP, 0..4)
        .prop_map(|cells| cells.into_iter().map(|(column, ts)| cell(column, ts)).collect())
}

/// What happens to the range tombstone before a row.
#[derive(Debug, Clone)]
enum TombstoneStep {
    Keep,
    Set(i64),
    Close,
}

fn tombstone_step_strategy() -> impl Strategy<Value = TombstoneStep> {
    prop_oneof![
        4 => Just(TombstoneStep::Keep),
        1 => (0..MAX_TIMESTAMP).prop_map(TombstoneStep::Set),
        1 => Just(TombstoneStep::Close),
    ]
}

/// One clustering row's worth of generated content.
#[derive(Debug, Clone)]
struct RowSpec {
    clustering: i32,
    step: TombstoneStep,
    marker: Option<i64>,
    tombstone: Option<i64>,
    cells: Vec<Cell>,
}

fn row_specs_strategy() -> impl Strategy<Value = Vec<RowSpec>> {
    prop::collection::btree_set(0i32..64, 0..8).prop_flat_map(|keys| {
        let keys: Vec<i32> = keys.into_iter().collect();
        let n = keys.len();
        prop::collection::vec(
            (
                tombstone_step_strategy(),
                prop::option::weighted(0.3, 0..MAX_TIMESTAMP),
                prop::option::weighted(0.1, 0..MAX_TIMESTAMP),
                cells_strategy(),
            ),
            n,
        )
        .prop_map(move |parts| {
            keys.iter()
                .zip(parts)
                .map(|(&clustering, (step, marker, tombstone, cells))| RowSpec {
                    clustering,
                    step,
                    marker,
                    tombstone,
                    cells,
                })
                .collect()
        })
    })
}

fn tombstone(ts: i64) -> Tombstone {
    Tombstone::new(Timestamp(ts), 0)
}

/// Strategy for the fragments of one partition with the given key.
pub fn partition_strategy(key: DecoratedKey) -> impl Strategy<Value = Vec<MutationFragment>> {
    (
        prop::option::weighted(0.2, 0..MAX_TIMESTAMP),
        prop::option::weighted(0.3, cells_strategy()),
        row_specs_strategy(),
    )
        .prop_map(move |(partition_tombstone, static_cells, rows)| {
            let mut fragments = vec![MutationFragment::partition_start(
                key.clone(),
                partition_tombstone.map(tombstone),
            )];
            if let Some(cells) = static_cells {
                fragments.push(MutationFragment::static_row(Row::new(cells)));
            }
            let mut open = false;
            for planned in rows {
                let position = Position::before_key(ck(planned.clustering));
                match planned.step {
                    TombstoneStep::Keep => {}
                    TombstoneStep::Set(ts) => {
                        fragments.push(MutationFragment::range_tombstone_change(
                            position,
                            Some(tombstone(ts)),
                        ));
                        open = true;
                    }
                    TombstoneStep::Close if open => {
                        fragments.push(MutationFragment::range_tombstone_change(position, None));
                        open = false;
                    }
                    TombstoneStep::Close => {}
                }
                let mut row = ClusteringRow::new(ck(planned.clustering), Row::new(planned.cells));
                row.marker = planned.marker.map(Timestamp);
                row.tombstone = planned.tombstone.map(tombstone);
                fragments.push(MutationFragment::clustering_row(row));
            }
            if open {
                fragments.push(MutationFragment::range_tombstone_change(
                    Position::after_all_rows(),
                    None,
                ));
            }
            fragments.push(MutationFragment::partition_end());
            fragments
        })
}

/// Strategy for decorated keys in strictly increasing order.
pub fn decorated_keys_strategy(max_partitions: usize) -> impl Strategy<Value = Vec<DecoratedKey>> {
    prop::collection::btree_set(any::<i64>(), 0..=max_partitions).prop_map(|tokens| {
        tokens
            .into_iter()
            .map(|token| {
                let key = Key::from_bytes(Bytes::copy_from_slice(&token.to_be_bytes()));
                DecoratedKey::new(Token(token), key)
            })
            .collect()
    })
}

/// Strategy for a complete, well-formed fragment stream of up to
/// `max_partitions` partitions.
pub fn fragment_stream_strategy(
    max_partitions: usize,
) -> impl Strategy<Value = Vec<MutationFragment>> {
    decorated_keys_strategy(max_partitions).prop_flat_map(|keys| {
        keys.into_iter()
            .map(partition_strategy)
            .collect::<Vec<_>>()
            .prop_map(|partitions| partitions.into_iter().flatten().collect::<Vec<_>>())
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{assert_well_formed, partitions_of};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn generated_streams_are_well_formed(fragments in fragment_stream_strategy(6)) {
            assert_well_formed(&fragments);
        }

        #[test]
        fn generated_keys_are_increasing(keys in decorated_keys_strategy(10)) {
            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn partition_count_matches_keys(fragments in fragment_stream_strategy(4)) {
            let starts = partitions_of(&fragments).len();
            let ends = fragments.iter().filter(|f| f.is_partition_end()).count();
            prop_assert_eq!(starts, ends);
        }
    }
}
