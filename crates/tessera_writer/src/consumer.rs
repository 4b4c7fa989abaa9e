//! Bucket identifiers and sink factories.

use crate::error::BoxError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use tessera_core::FragmentReader;

/// Identifies a bucket (a shard, a timestamp window, ...).
///
/// Buckets are ordered so that per-partition fan-out is deterministic.
pub trait BucketId: Ord + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> BucketId for T where T: Ord + Clone + fmt::Debug + Send + Sync + 'static {}

/// Creates the sink for a newly opened bucket.
///
/// Called at most once per bucket, the first time the bucket receives a
/// fragment. The returned future is the sink: it must drain `reader` to end
/// of stream and resolve once its output is complete. Returning before the
/// stream ends, or dropping the reader, fails the run.
pub(crate) trait Consumer<B>: Send {
    /// Starts the sink for `bucket`.
    fn consume(
        &mut self,
        bucket: B,
        reader: FragmentReader,
    ) -> BoxFuture<'static, Result<(), BoxError>>;
}

impl<B, F, Fut, E> Consumer<B> for F
where
    F: FnMut(B, FragmentReader) -> Fut + Send,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn consume(
        &mut self,
        bucket: B,
        reader: FragmentReader,
    ) -> BoxFuture<'static, Result<(), BoxError>> {
        let sink = self(bucket, reader);
        async move { sink.await.map_err(Into::into) }.boxed()
    }
}
