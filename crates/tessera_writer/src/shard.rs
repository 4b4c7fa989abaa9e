//! Segregation by owning shard.

use crate::error::{SegregateError, SegregateResult};
use crate::router::{Routed, Router};
use tessera_core::{MutationFragment, Position, StreamError};
use tessera_keys::{ShardId, Sharder};
use tracing::trace;

/// Routes whole partitions to the shard owning their token.
#[derive(Debug)]
pub(crate) struct ShardRouter<S> {
    sharder: S,
    current: Option<ShardId>,
    open_tombstone: bool,
}

impl<S: Sharder> ShardRouter<S> {
    pub(crate) fn new(sharder: S) -> Self {
        Self {
            sharder,
            current: None,
            open_tombstone: false,
        }
    }

    fn current(&self, fragment: &MutationFragment) -> SegregateResult<ShardId> {
        self.current.ok_or_else(|| {
            SegregateError::Producer(StreamError::invalid_stream(format!(
                "{} outside of a partition",
                fragment.kind()
            )))
        })
    }
}

impl<S: Sharder> Router for ShardRouter<S> {
    type Bucket = ShardId;

    fn route(
        &mut self,
        fragment: MutationFragment,
        out: &mut Routed<ShardId>,
    ) -> SegregateResult<()> {
        match &fragment {
            MutationFragment::PartitionStart(start) => {
                if self.current.is_some() {
                    return Err(SegregateError::Producer(StreamError::invalid_stream(format!(
                        "partition start for {} inside another partition",
                        start.key
                    ))));
                }
                let shard = self.sharder.shard_of(start.key.token());
                trace!(key = %start.key, shard, "partition routed");
                self.current = Some(shard);
                self.open_tombstone = false;
                out.push((shard, fragment));
            }
            MutationFragment::PartitionEnd => {
                let shard = self.current(&fragment)?;
                self.current = None;
                self.open_tombstone = false;
                out.push((shard, fragment));
            }
            MutationFragment::RangeTombstoneChange(change) => {
                let shard = self.current(&fragment)?;
                self.open_tombstone = change.tombstone.is_some();
                out.push((shard, fragment));
            }
            _ => {
                let shard = self.current(&fragment)?;
                out.push((shard, fragment));
            }
        }
        Ok(())
    }

    fn close_partition(&mut self, out: &mut Routed<ShardId>) {
        if let Some(shard) = self.current.take() {
            if std::mem::take(&mut self.open_tombstone) {
                out.push((
                    shard,
                    MutationFragment::range_tombstone_change(Position::after_all_rows(), None),
                ));
            }
            out.push((shard, MutationFragment::partition_end()));
        }
    }

    fn in_partition(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{ClusteringKey, Timestamp, Tombstone};
    use tessera_keys::{DecoratedKey, Key, StaticSharder, Token};

    fn start(token: i64) -> MutationFragment {
        MutationFragment::partition_start(
            DecoratedKey::new(Token(token), Key::from_bytes(vec![1])),
            None,
        )
    }

    fn interleaved(k: i64) -> i64 {
        i64::MIN + (k << 51)
    }

    #[test]
    fn routes_whole_partitions() {
        let mut router = ShardRouter::new(StaticSharder::new(2, 12));
        let mut out = Vec::new();
        for k in 0..4 {
            router.route(start(interleaved(k)), &mut out).unwrap();
            assert!(router.in_partition());
            router.route(MutationFragment::partition_end(), &mut out).unwrap();
            assert!(!router.in_partition());
        }
        let shards: Vec<_> = out.iter().map(|(s, _)| *s).collect();
        assert_eq!(shards, vec![0, 0, 1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn rejects_fragments_outside_partition() {
        let mut router = ShardRouter::new(StaticSharder::single());
        let mut out = Vec::new();
        let err = router
            .route(MutationFragment::partition_end(), &mut out)
            .unwrap_err();
        assert!(err.is_producer_failure());
        assert!(out.is_empty());
    }

    #[test]
    fn close_partition_ends_open_partition() {
        let mut router = ShardRouter::new(StaticSharder::new(4, 0));
        let mut out = Vec::new();
        router.close_partition(&mut out);
        assert!(out.is_empty());

        router.route(start(0), &mut out).unwrap();
        router.close_partition(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out[1].1.is_partition_end());
        assert_eq!(out[0].0, out[1].0);
        assert!(!router.in_partition());
    }

    #[test]
    fn close_partition_closes_open_range_tombstone() {
        let mut router = ShardRouter::new(StaticSharder::new(4, 0));
        let mut out = Vec::new();
        let position =
            Position::before_key(ClusteringKey::new([bytes::Bytes::from_static(b"a")]));
        router.route(start(0), &mut out).unwrap();
        router
            .route(
                MutationFragment::range_tombstone_change(
                    position,
                    Some(Tombstone::new(Timestamp(7), 0)),
                ),
                &mut out,
            )
            .unwrap();
        router.close_partition(&mut out);

        let fragments: Vec<_> = out.into_iter().map(|(_, f)| f).collect();
        assert_eq!(fragments.len(), 4);
        assert_eq!(
            fragments[2],
            MutationFragment::range_tombstone_change(Position::after_all_rows(), None)
        );
        assert!(fragments[3].is_partition_end());
        tessera_core::validate_fragments(&fragments).unwrap();
    }
}
