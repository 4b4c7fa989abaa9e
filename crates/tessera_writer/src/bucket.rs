//! Per-bucket queues and sink tasks.
//!
//! Each bucket owns a bounded queue feeding a [`FragmentReader`] handed to
//! the bucket's sink. Sinks run as tasks on the current runtime; the
//! dispatch loop waits whenever the target bucket's queue is full.

use crate::consumer::{BucketId, Consumer};
use crate::error::{BoxError, SegregateError, SegregateResult};
use futures::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tessera_core::{FragmentReader, MutationFragment, StreamError, StreamResult};
use tessera_keys::Schema;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

type QueueItem = StreamResult<MutationFragment>;

/// Receiving end of a bucket queue, seen by the sink as its input stream.
///
/// Records whether the sink read it through to end of stream.
struct QueueStream {
    rx: mpsc::Receiver<QueueItem>,
    drained: Arc<AtomicBool>,
}

impl Stream for QueueStream {
    type Item = QueueItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                self.drained.store(true, Ordering::Release);
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

/// Sending end of a bucket queue.
struct BucketWriter {
    tx: Option<mpsc::Sender<QueueItem>>,
    drained: Arc<AtomicBool>,
    fragments: u64,
}

/// The open buckets of one segregation run.
pub(crate) struct BucketSet<B, C> {
    schema: Arc<Schema>,
    capacity: usize,
    consumer: C,
    writers: BTreeMap<B, BucketWriter>,
    tasks: JoinSet<(B, Result<(), BoxError>)>,
}

impl<B, C> BucketSet<B, C>
where
    B: BucketId,
    C: Consumer<B>,
{
    pub(crate) fn new(schema: Arc<Schema>, capacity: usize, consumer: C) -> Self {
        Self {
            schema,
            capacity,
            consumer,
            writers: BTreeMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Number of buckets opened so far.
    pub(crate) fn len(&self) -> usize {
        self.writers.len()
    }

    /// Fragments queued across all buckets.
    pub(crate) fn fragments_sent(&self) -> u64 {
        self.writers.values().map(|w| w.fragments).sum()
    }

    /// Queues `fragment` on `bucket`, opening the bucket first if needed.
    ///
    /// Waits while the bucket's queue is full.
    pub(crate) async fn send(
        &mut self,
        bucket: B,
        fragment: MutationFragment,
    ) -> SegregateResult<()> {
        if !self.writers.contains_key(&bucket) {
            self.open(bucket.clone());
        }
        let writer = self
            .writers
            .get_mut(&bucket)
            .ok_or_else(|| SegregateError::stopped_early(&bucket))?;
        let tx = writer
            .tx
            .as_ref()
            .ok_or_else(|| SegregateError::stopped_early(&bucket))?;
        trace!(bucket = ?bucket, kind = %fragment.kind(), "queueing fragment");
        if tx.send(Ok(fragment)).await.is_err() {
            debug!(bucket = ?bucket, "sink dropped its stream");
            return Err(SegregateError::stopped_early(&bucket));
        }
        writer.fragments += 1;
        Ok(())
    }

    /// Queues every routed fragment, in order, emptying `routed`.
    pub(crate) async fn send_all(
        &mut self,
        routed: &mut Vec<(B, MutationFragment)>,
    ) -> SegregateResult<()> {
        for (bucket, fragment) in routed.drain(..) {
            self.send(bucket, fragment).await?;
        }
        Ok(())
    }

    fn open(&mut self, bucket: B) {
        debug!(bucket = ?bucket, capacity = self.capacity, "opening bucket");
        let (tx, rx) = mpsc::channel(self.capacity);
        let drained = Arc::new(AtomicBool::new(false));
        let reader = FragmentReader::from_stream(
            Arc::clone(&self.schema),
            QueueStream {
                rx,
                drained: Arc::clone(&drained),
            },
        );
        let sink = self.consumer.consume(bucket.clone(), reader);
        let task_bucket = bucket.clone();
        self.tasks.spawn(async move { (task_bucket, sink.await) });
        self.writers.insert(
            bucket,
            BucketWriter {
                tx: Some(tx),
                drained,
                fragments: 0,
            },
        );
    }

    /// Ends every bucket's stream normally.
    fn close(&mut self) {
        debug!(buckets = self.writers.len(), "closing buckets");
        for writer in self.writers.values_mut() {
            writer.tx = None;
        }
    }

    /// Ends every bucket's stream with an abort error, queued behind the
    /// fragments already in flight.
    async fn abort(&mut self, reason: &str) {
        for (bucket, writer) in &mut self.writers {
            if let Some(tx) = writer.tx.take() {
                if tx.send(Err(StreamError::aborted(reason))).await.is_err() {
                    trace!(bucket = ?bucket, "sink already gone, abort not delivered");
                }
            }
        }
    }

    /// Ends all buckets and waits for every sink.
    ///
    /// `dispatched` is the outcome of the dispatch loop: on success the
    /// buckets are closed normally, otherwise they are aborted. The run's
    /// error is chosen in this order: a producer failure, then the first
    /// sink failure that is not merely a reaction to the abort, then the
    /// dispatch error.
    pub(crate) async fn join(mut self, dispatched: SegregateResult<()>) -> SegregateResult<()> {
        match &dispatched {
            Ok(()) => self.close(),
            Err(e) => self.abort(&e.to_string()).await,
        }

        let culprit = match &dispatched {
            Err(SegregateError::SinkStoppedEarly { bucket }) => Some(bucket.clone()),
            _ => None,
        };
        let mut primary: Option<SegregateError> = None;
        let mut secondary: Option<SegregateError> = None;
        while let Some(joined) = self.tasks.join_next().await {
            let failure = match joined {
                Ok((bucket, Ok(()))) => {
                    let drained = self
                        .writers
                        .get(&bucket)
                        .is_some_and(|w| w.drained.load(Ordering::Acquire));
                    if dispatched.is_ok() && !drained {
                        Some(SegregateError::stopped_early(&bucket))
                    } else {
                        None
                    }
                }
                Ok((bucket, Err(source))) => Some(SegregateError::Sink {
                    bucket: format!("{bucket:?}"),
                    source,
                }),
                Err(join_error) => Some(SegregateError::SinkPanicked {
                    message: join_error.to_string(),
                }),
            };
            let Some(failure) = failure else { continue };
            warn!(error = %failure, "sink failed");
            let is_culprit = matches!(
                (&failure, &culprit),
                (SegregateError::Sink { bucket, .. }, Some(c)) if bucket == c
            );
            if is_culprit {
                primary = Some(failure);
            } else if failure.is_secondary_abort() {
                secondary.get_or_insert(failure);
            } else {
                primary.get_or_insert(failure);
            }
        }

        match dispatched {
            Err(e) if e.is_producer_failure() => Err(e),
            Err(e) => Err(primary.unwrap_or(e)),
            Ok(()) => match primary.or(secondary) {
                Some(e) => Err(e),
                None => Ok(()),
            },
        }
    }
}
