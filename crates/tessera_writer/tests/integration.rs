//! End-to-end segregation runs.

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tessera_core::{
    FragmentReader, MutationFragment, Position, StreamError, StreamResult, Timestamp, Tombstone,
};
use tessera_keys::ShardId;
use tessera_testkit::prelude::*;
use tessera_writer::{
    segregate_by_shard, segregate_by_timestamp, CancellationToken, SegregateError,
    SegregationConfig, Segregator,
};

fn interleaved_token(k: i64) -> i64 {
    i64::MIN + (k << 51)
}

#[tokio::test]
async fn shard_split_keeps_partitions_whole_and_ordered() {
    let schema = sharded_schema(2, 12);
    let partitions: Vec<Vec<MutationFragment>> = (0..4)
        .map(|k| {
            PartitionBuilder::new(decorated_with_token(interleaved_token(k), &format!("p{k}")))
                .static_row(&[(0, 5)])
                .row(1, &[(1, 10)])
                .build()
        })
        .collect();
    let input = partitions.concat();

    let sink = RecordingSink::<ShardId>::new();
    let stats = segregate_by_shard(reader(&schema, input.clone()), sink.consumer())
        .await
        .unwrap();

    assert_eq!(sink.fragments(&0), [partitions[0].clone(), partitions[2].clone()].concat());
    assert_eq!(sink.fragments(&1), [partitions[1].clone(), partitions[3].clone()].concat());
    assert_eq!(sink.opened(), vec![0, 1]);
    assert_eq!(stats.partitions, 4);
    assert_eq!(stats.fragments_in, input.len() as u64);
    assert_eq!(stats.fragments_out, input.len() as u64);
    assert_eq!(stats.buckets, 2);
    assert!(!stats.cancelled);
}

#[tokio::test]
async fn timestamp_split_frames_each_bucket() {
    let schema = test_schema();
    let input = PartitionBuilder::new(decorated("p"))
        .row(1, &[(0, 10)])
        .row(2, &[(0, 20)])
        .row(3, &[(0, 10)])
        .build();

    let sink = RecordingSink::<i64>::new();
    let stats = segregate_by_timestamp(
        reader(&schema, input.clone()),
        |ts: Timestamp| ts.value() / 10,
        sink.consumer(),
    )
    .await
    .unwrap();

    let buckets: Vec<i64> = sink.outputs().keys().copied().collect();
    assert_eq!(buckets, vec![1, 2]);
    assert_eq!(
        sink.fragments(&1),
        vec![input[0].clone(), input[1].clone(), input[3].clone(), input[4].clone()]
    );
    assert_eq!(
        sink.fragments(&2),
        vec![input[0].clone(), input[2].clone(), input[4].clone()]
    );
    assert_eq!(stats.fragments_in, 5);
    assert_eq!(stats.fragments_out, 7);
}

#[tokio::test]
async fn timestamp_split_moves_range_tombstones_between_buckets() {
    let schema = test_schema();
    let input = PartitionBuilder::new(decorated("p"))
        .tombstone(5)
        .range_tombstone(Position::before_key(ck(1)), 12)
        .row(1, &[(0, 3)])
        .range_tombstone(Position::before_key(ck(2)), 25)
        .row(2, &[(0, 14)])
        .close_range_tombstone(Position::after_key(ck(2)))
        .build();

    let sink = RecordingSink::<i64>::new();
    segregate_by_timestamp(reader(&schema, input), |ts: Timestamp| ts.value() / 10, sink.consumer())
        .await
        .unwrap();

    let outputs = sink.outputs();
    assert_eq!(outputs.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    for fragments in outputs.values() {
        assert_well_formed(fragments);
    }
    assert_eq!(
        outputs[&1],
        PartitionBuilder::new(decorated("p"))
            .range_tombstone(Position::before_key(ck(1)), 12)
            .close_range_tombstone(Position::before_key(ck(2)))
            .row(2, &[(0, 14)])
            .build()
    );
    assert_eq!(
        outputs[&2],
        PartitionBuilder::new(decorated("p"))
            .range_tombstone(Position::before_key(ck(2)), 25)
            .close_range_tombstone(Position::after_key(ck(2)))
            .build()
    );
    assert_eq!(
        outputs[&0],
        PartitionBuilder::new(decorated("p"))
            .tombstone(5)
            .row(1, &[(0, 3)])
            .build()
    );
}

#[tokio::test]
async fn empty_input_opens_nothing() {
    let schema = test_schema();
    let sink = RecordingSink::<ShardId>::new();
    let stats = segregate_by_shard(reader(&schema, Vec::new()), sink.consumer())
        .await
        .unwrap();
    assert!(sink.opened().is_empty());
    assert_eq!(stats.buckets, 0);
}

#[tokio::test]
async fn queue_of_one_still_delivers_everything() {
    let schema = sharded_schema(4, 0);
    let mut keys: Vec<_> = (0..20).map(|i| decorated(&format!("key-{i}"))).collect();
    keys.sort();
    let input: Vec<MutationFragment> = keys
        .into_iter()
        .flat_map(|key| {
            PartitionBuilder::new(key)
                .row(1, &[(0, 1), (1, 2)])
                .row(2, &[(0, 3)])
                .build()
        })
        .collect();

    let sink = RecordingSink::<ShardId>::new();
    let segregator = Segregator::new(SegregationConfig::new().with_queue_capacity(1));
    let stats = segregator
        .by_shard(reader(&schema, input.clone()), sink.consumer())
        .await
        .unwrap();

    let delivered: usize = sink.outputs().values().map(Vec::len).sum();
    assert_eq!(delivered, input.len());
    assert_eq!(sink.completed().len(), stats.buckets);
}

#[tokio::test]
async fn full_queue_throttles_the_producer() {
    const CAPACITY: usize = 2;

    let schema = test_schema();
    let mut keys: Vec<_> = (0..10).map(|i| decorated(&format!("key-{i}"))).collect();
    keys.sort();
    let input: Vec<MutationFragment> = keys
        .into_iter()
        .flat_map(|key| PartitionBuilder::new(key).row(1, &[(0, 1)]).build())
        .collect();

    let pulled = Arc::new(AtomicUsize::new(0));
    let producer = {
        let pulled = Arc::clone(&pulled);
        let items = stream::iter(input.clone()).map(move |fragment| {
            pulled.fetch_add(1, Ordering::SeqCst);
            Ok(fragment)
        });
        FragmentReader::from_stream(Arc::clone(&schema), items)
    };

    let gate = Arc::new(tokio::sync::Notify::new());
    let received = Arc::new(Mutex::new(Vec::new()));
    let consumer = {
        let gate = Arc::clone(&gate);
        let received = Arc::clone(&received);
        move |_shard: ShardId, mut stream: FragmentReader| {
            let gate = Arc::clone(&gate);
            let received = Arc::clone(&received);
            async move {
                gate.notified().await;
                while let Some(fragment) = stream.next_fragment().await? {
                    received.lock().push(fragment);
                }
                Ok::<(), StreamError>(())
            }
        }
    };

    let segregator = Segregator::new(SegregationConfig::new().with_queue_capacity(CAPACITY));
    let run = segregator.by_shard(producer, consumer);
    let observe = async {
        for _ in 0..100 {
            tokio::task::yield_now().await;
        }
        let before_release = pulled.load(Ordering::SeqCst);
        gate.notify_one();
        before_release
    };
    let (stats, before_release) = tokio::join!(run, observe);

    // The queue holds CAPACITY fragments and one more waits in the
    // dispatch loop for a free slot.
    assert!(before_release > 0);
    assert!(before_release <= CAPACITY + 1, "pulled {before_release} fragments");
    stats.unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), input.len());
    assert_eq!(*received.lock(), input);
}

#[tokio::test]
async fn producer_failure_aborts_open_buckets() {
    let schema = test_schema();
    let items = PartitionBuilder::new(decorated_with_token(1, "a"))
        .row(1, &[(0, 1)])
        .build()
        .into_iter()
        .take(2)
        .map(Ok)
        .chain([Err(StreamError::source("disk unreadable"))]);
    let producer = FragmentReader::from_stream(Arc::clone(&schema), stream::iter(items));

    let sink = RecordingSink::<ShardId>::new();
    let err = segregate_by_shard(producer, sink.consumer()).await.unwrap_err();

    assert!(err.is_producer_failure());
    assert!(err.to_string().contains("disk unreadable"));
    assert_eq!(sink.opened(), vec![0]);
    assert_eq!(sink.fragments(&0).len(), 2);
    assert!(sink.completed().is_empty());
}

#[tokio::test]
async fn malformed_input_is_a_producer_failure() {
    let schema = test_schema();
    let input = [
        PartitionBuilder::new(decorated_with_token(2, "b")).build(),
        PartitionBuilder::new(decorated_with_token(1, "a")).build(),
    ]
    .concat();

    let sink = RecordingSink::<ShardId>::new();
    let err = segregate_by_shard(reader(&schema, input), sink.consumer())
        .await
        .unwrap_err();
    assert!(matches!(err, SegregateError::Producer(StreamError::InvalidStream { .. })));
}

#[tokio::test]
async fn truncated_input_fails_without_validation() {
    let schema = test_schema();
    let mut input = PartitionBuilder::new(decorated("a")).row(1, &[(0, 1)]).build();
    input.pop();

    let sink = RecordingSink::<ShardId>::new();
    let segregator = Segregator::new(SegregationConfig::new().with_input_validation(false));
    let err = segregator
        .by_shard(reader(&schema, input), sink.consumer())
        .await
        .unwrap_err();
    assert!(err.is_producer_failure());
    assert!(err.to_string().contains("inside a partition"));
}

#[tokio::test]
async fn sink_failure_is_reported_for_its_bucket() {
    let schema = sharded_schema(2, 12);
    let input: Vec<MutationFragment> = (0..4)
        .flat_map(|k| {
            PartitionBuilder::new(decorated_with_token(interleaved_token(k), &format!("p{k}")))
                .row(1, &[(0, 1)])
                .build()
        })
        .collect();

    let consumer = |shard: ShardId, mut stream: FragmentReader| async move {
        if shard == 1 {
            return Err(StreamError::source("destination full"));
        }
        while stream.next_fragment().await?.is_some() {}
        Ok::<(), StreamError>(())
    };
    let err = segregate_by_shard(reader(&schema, input), consumer)
        .await
        .unwrap_err();

    match err {
        SegregateError::Sink { bucket, source } => {
            assert_eq!(bucket, "1");
            assert!(source.to_string().contains("destination full"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn sink_failure_keeps_other_buckets_intact() {
    let schema = sharded_schema(2, 12);
    let partitions: Vec<Vec<MutationFragment>> = (0..4)
        .map(|k| {
            PartitionBuilder::new(decorated_with_token(interleaved_token(k), &format!("p{k}")))
                .row(1, &[(0, 1)])
                .build()
        })
        .collect();
    let input = partitions.concat();
    let shard0_expected = [partitions[0].clone(), partitions[2].clone()].concat();

    let received: Arc<Mutex<Vec<StreamResult<MutationFragment>>>> = Arc::default();
    let consumer = {
        let received = Arc::clone(&received);
        move |shard: ShardId, mut stream: FragmentReader| {
            let received = Arc::clone(&received);
            async move {
                if shard == 1 {
                    return Err(StreamError::source("destination full"));
                }
                while let Some(item) = stream.next().await {
                    let failed = item.is_err();
                    received.lock().push(item);
                    if failed {
                        break;
                    }
                }
                Ok::<(), StreamError>(())
            }
        }
    };

    let segregator = Segregator::new(SegregationConfig::new().with_queue_capacity(1));
    let err = segregator
        .by_shard(reader(&schema, input), consumer)
        .await
        .unwrap_err();
    assert!(matches!(err, SegregateError::Sink { ref bucket, .. } if bucket == "1"));

    let mut received = std::mem::take(&mut *received.lock());
    let last = received.pop().expect("shard 0 received items");
    assert!(matches!(last, Err(ref e) if e.is_aborted()));
    let delivered: Vec<MutationFragment> = received
        .into_iter()
        .map(|item| item.expect("only the last item is an error"))
        .collect();
    assert!(delivered.len() >= partitions[0].len());
    assert_eq!(delivered[..], shard0_expected[..delivered.len()]);
}

#[tokio::test]
async fn sink_stopping_early_fails_the_run() {
    let schema = test_schema();
    let input = PartitionBuilder::new(decorated("a")).row(1, &[(0, 1)]).build();

    let consumer = |_shard: ShardId, stream: FragmentReader| async move {
        drop(stream);
        Ok::<(), StreamError>(())
    };
    let err = segregate_by_shard(reader(&schema, input), consumer)
        .await
        .unwrap_err();
    assert!(matches!(err, SegregateError::SinkStoppedEarly { .. }));
}

#[tokio::test]
async fn sink_panic_is_reported() {
    let schema = test_schema();
    let input = PartitionBuilder::new(decorated("a")).build();

    let consumer = |shard: ShardId, _stream: FragmentReader| async move {
        if shard == 0 {
            panic!("sink exploded");
        }
        Ok::<(), StreamError>(())
    };
    let err = segregate_by_shard(reader(&schema, input), consumer)
        .await
        .unwrap_err();
    assert!(matches!(err, SegregateError::SinkPanicked { .. }));
}

#[tokio::test]
async fn zero_queue_capacity_is_rejected() {
    let schema = test_schema();
    let sink = RecordingSink::<ShardId>::new();
    let err = Segregator::new(SegregationConfig::new().with_queue_capacity(0))
        .by_shard(reader(&schema, Vec::new()), sink.consumer())
        .await
        .unwrap_err();
    assert!(matches!(err, SegregateError::InvalidConfig { .. }));
}

/// A producer that yields `fragments` and then never finishes.
fn stalled_producer(
    schema: &Arc<tessera_keys::Schema>,
    fragments: Vec<MutationFragment>,
) -> FragmentReader {
    let items = stream::iter(fragments.into_iter().map(Ok)).chain(stream::pending());
    FragmentReader::from_stream(Arc::clone(schema), items)
}

#[tokio::test]
async fn cancellation_closes_open_partition() {
    let schema = test_schema();
    let mut fragments = PartitionBuilder::new(decorated("a")).row(1, &[(0, 1)]).build();
    fragments.pop();

    let token = CancellationToken::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let consumer = {
        let token = token.clone();
        let received = Arc::clone(&received);
        move |_shard: ShardId, mut stream: FragmentReader| {
            let token = token.clone();
            let received = Arc::clone(&received);
            async move {
                while let Some(fragment) = stream.next_fragment().await? {
                    if fragment.is_row_like() {
                        token.cancel();
                    }
                    received.lock().push(fragment);
                }
                Ok::<(), StreamError>(())
            }
        }
    };

    let stats = Segregator::default()
        .with_cancellation(token)
        .by_shard(stalled_producer(&schema, fragments.clone()), consumer)
        .await
        .unwrap();

    assert!(stats.cancelled);
    let received = received.lock().clone();
    assert_eq!(received.len(), 3);
    assert_eq!(received[..2], fragments[..]);
    assert!(received[2].is_partition_end());
}

#[tokio::test]
async fn cancellation_closes_open_range_tombstone() {
    let schema = test_schema();
    let fragments = vec![
        MutationFragment::partition_start(decorated("a"), None),
        MutationFragment::range_tombstone_change(
            Position::before_key(ck(1)),
            Some(Tombstone::new(Timestamp(7), 0)),
        ),
    ];

    let token = CancellationToken::new();
    let sink = RecordingSink::<i64>::new();
    let segregator = Segregator::default().with_cancellation(token.clone());
    let run = segregator.by_timestamp(
        stalled_producer(&schema, fragments),
        |ts: Timestamp| ts.value(),
        sink.consumer(),
    );
    let cancel = async {
        while sink.fragments(&7).len() < 2 {
            tokio::task::yield_now().await;
        }
        token.cancel();
    };
    let (stats, ()) = tokio::join!(run, cancel);

    assert!(stats.unwrap().cancelled);
    let out = sink.fragments(&7);
    assert_well_formed(&out);
    assert_eq!(
        out[2],
        MutationFragment::range_tombstone_change(Position::after_all_rows(), None)
    );
    assert!(out[3].is_partition_end());
}

#[tokio::test]
async fn shard_cancellation_closes_open_range_tombstone() {
    let schema = test_schema();
    let fragments = vec![
        MutationFragment::partition_start(decorated("a"), None),
        MutationFragment::range_tombstone_change(
            Position::before_key(ck(1)),
            Some(Tombstone::new(Timestamp(7), 0)),
        ),
    ];

    let token = CancellationToken::new();
    let sink = RecordingSink::<ShardId>::new();
    let segregator = Segregator::default().with_cancellation(token.clone());
    let run = segregator.by_shard(stalled_producer(&schema, fragments.clone()), sink.consumer());
    let cancel = async {
        while sink.fragments(&0).len() < 2 {
            tokio::task::yield_now().await;
        }
        token.cancel();
    };
    let (stats, ()) = tokio::join!(run, cancel);

    assert!(stats.unwrap().cancelled);
    let out = sink.fragments(&0);
    assert_well_formed(&out);
    assert_eq!(out[..2], fragments[..]);
    assert_eq!(
        out[2],
        MutationFragment::range_tombstone_change(Position::after_all_rows(), None)
    );
    assert!(out[3].is_partition_end());
    assert_eq!(sink.completed(), vec![0]);
}

#[tokio::test]
async fn cancelled_before_start_delivers_nothing() {
    let schema = test_schema();
    let token = CancellationToken::new();
    token.cancel();
    let sink = RecordingSink::<ShardId>::new();
    let input = PartitionBuilder::new(decorated("a")).build();

    let stats = Segregator::default()
        .with_cancellation(token)
        .by_shard(reader(&schema, input), sink.consumer())
        .await
        .unwrap();
    assert!(stats.cancelled);
    assert_eq!(stats.fragments_in, 0);
    assert!(sink.opened().is_empty());
}
