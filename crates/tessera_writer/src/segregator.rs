//! The segregation driver.

use crate::bucket::BucketSet;
use crate::config::SegregationConfig;
use crate::consumer::{BucketId, Consumer};
use crate::error::{BoxError, SegregateResult};
use crate::router::Router;
use crate::shard::ShardRouter;
use crate::stats::SegregationStats;
use crate::timestamp::TimestampRouter;
use std::future::Future;
use std::sync::Arc;
use tessera_core::{FragmentReader, StreamError, Timestamp};
use tessera_keys::ShardId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Splits a fragment stream into per-bucket streams.
///
/// A single dispatch loop pulls from the producer and feeds one bounded
/// queue per bucket. Each bucket's sink runs as its own task on the current
/// tokio runtime, started when the bucket receives its first fragment. A
/// run completes once the producer is exhausted and every sink has
/// finished.
///
/// Dropping a run's future aborts its sink tasks.
#[derive(Debug, Clone, Default)]
pub struct Segregator {
    config: SegregationConfig,
    cancel: Option<CancellationToken>,
}

impl Segregator {
    /// Creates a segregator with the given configuration.
    #[must_use]
    pub fn new(config: SegregationConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Stops runs early when `token` is cancelled.
    ///
    /// Cancellation is checked between producer fragments. The partition in
    /// progress is closed on every bucket it reached, all buckets then see a
    /// normal end of stream, and the run succeeds with
    /// [`SegregationStats::cancelled`] set.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &SegregationConfig {
        &self.config
    }

    /// Routes every partition to the shard that owns its token, using the
    /// producer schema's sharder.
    ///
    /// # Errors
    ///
    /// See [`SegregateError`](crate::SegregateError).
    pub async fn by_shard<C, Fut, E>(
        &self,
        producer: FragmentReader,
        consumer: C,
    ) -> SegregateResult<SegregationStats>
    where
        C: FnMut(ShardId, FragmentReader) -> Fut + Send,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let sharder = *producer.schema().sharder();
        self.run(producer, ShardRouter::new(sharder), consumer).await
    }

    /// Routes every timestamped piece of data to the bucket `classifier`
    /// picks for its timestamp, splitting rows and framing partitions per
    /// bucket.
    ///
    /// `classifier` must be deterministic within the run.
    ///
    /// # Errors
    ///
    /// See [`SegregateError`](crate::SegregateError).
    pub async fn by_timestamp<B, F, C, Fut, E>(
        &self,
        producer: FragmentReader,
        classifier: F,
        consumer: C,
    ) -> SegregateResult<SegregationStats>
    where
        B: BucketId,
        F: FnMut(Timestamp) -> B + Send,
        C: FnMut(B, FragmentReader) -> Fut + Send,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.run(producer, TimestampRouter::new(classifier), consumer).await
    }

    async fn run<R, C>(
        &self,
        producer: FragmentReader,
        router: R,
        consumer: C,
    ) -> SegregateResult<SegregationStats>
    where
        R: Router + Send,
        C: Consumer<R::Bucket>,
    {
        self.config.validate()?;
        let schema = Arc::clone(producer.schema());
        debug!(
            schema = %schema,
            queue_capacity = self.config.queue_capacity,
            "segregation started"
        );

        let producer = if self.config.validate_input {
            producer.validated()
        } else {
            producer
        };
        let mut buckets = BucketSet::new(schema, self.config.queue_capacity, consumer);
        let mut stats = SegregationStats::default();

        let dispatched = self.dispatch(producer, router, &mut buckets, &mut stats).await;
        if let Err(e) = &dispatched {
            warn!(error = %e, "segregation aborted");
        }
        stats.buckets = buckets.len();
        stats.fragments_out = buckets.fragments_sent();
        buckets.join(dispatched).await?;

        debug!(%stats, "segregation finished");
        Ok(stats)
    }

    async fn dispatch<R, C>(
        &self,
        mut producer: FragmentReader,
        mut router: R,
        buckets: &mut BucketSet<R::Bucket, C>,
        stats: &mut SegregationStats,
    ) -> SegregateResult<()>
    where
        R: Router,
        C: Consumer<R::Bucket>,
    {
        let mut routed = Vec::new();
        loop {
            let next = match &self.cancel {
                Some(token) => tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    next = producer.next_fragment() => Some(next),
                },
                None => Some(producer.next_fragment().await),
            };
            let Some(next) = next else {
                info!(fragments = stats.fragments_in, "segregation cancelled");
                stats.cancelled = true;
                router.close_partition(&mut routed);
                return buckets.send_all(&mut routed).await;
            };
            let Some(fragment) = next? else {
                break;
            };
            stats.fragments_in += 1;
            if fragment.is_partition_start() {
                stats.partitions += 1;
            }
            router.route(fragment, &mut routed)?;
            buckets.send_all(&mut routed).await?;
        }

        if router.in_partition() {
            return Err(StreamError::invalid_stream("producer ended inside a partition").into());
        }
        Ok(())
    }
}

/// Splits `producer` by owning shard, with default settings.
///
/// Each partition goes whole to the shard its token maps to under the
/// producer schema's sharder. `consumer` is called once per shard that
/// receives data, with that shard's stream; the future it returns is the
/// shard's sink and must read the stream to its end before resolving.
///
/// # Errors
///
/// Fails if the producer fails or is malformed, or if any sink fails or
/// stops before its stream ends.
pub async fn segregate_by_shard<C, Fut, E>(
    producer: FragmentReader,
    consumer: C,
) -> SegregateResult<SegregationStats>
where
    C: FnMut(ShardId, FragmentReader) -> Fut + Send,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Segregator::default().by_shard(producer, consumer).await
}

/// Splits `producer` by write timestamp, with default settings.
///
/// # Errors
///
/// Fails if the producer fails or is malformed, or if any sink fails or
/// stops before its stream ends.
pub async fn segregate_by_timestamp<B, F, C, Fut, E>(
    producer: FragmentReader,
    classifier: F,
    consumer: C,
) -> SegregateResult<SegregationStats>
where
    B: BucketId,
    F: FnMut(Timestamp) -> B + Send,
    C: FnMut(B, FragmentReader) -> Fut + Send,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    Segregator::default()
        .by_timestamp(producer, classifier, consumer)
        .await
}
