//! Pull-based fragment readers.

use crate::error::{StreamError, StreamResult};
use crate::fragment::MutationFragment;
use crate::validator::FragmentStreamValidator;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tessera_keys::Schema;

/// An ordered, lazily produced stream of mutation fragments for one schema.
///
/// End of stream is `None`; a failure is an `Err` item, after which the
/// reader should not be polled again.
pub struct FragmentReader {
    schema: Arc<Schema>,
    inner: BoxStream<'static, StreamResult<MutationFragment>>,
}

impl FragmentReader {
    /// Wraps a fragment stream.
    pub fn from_stream<S>(schema: Arc<Schema>, stream: S) -> Self
    where
        S: Stream<Item = StreamResult<MutationFragment>> + Send + 'static,
    {
        Self {
            schema,
            inner: stream.boxed(),
        }
    }

    /// A reader over in-memory fragments.
    pub fn from_fragments(schema: Arc<Schema>, fragments: Vec<MutationFragment>) -> Self {
        Self::from_stream(schema, stream::iter(fragments.into_iter().map(Ok)))
    }

    /// A reader that yields nothing.
    pub fn empty(schema: Arc<Schema>) -> Self {
        Self::from_stream(schema, stream::empty())
    }

    /// The schema of the fragments.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Pulls the next fragment; `Ok(None)` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the underlying stream.
    pub async fn next_fragment(&mut self) -> StreamResult<Option<MutationFragment>> {
        self.inner.next().await.transpose()
    }

    /// Reads the stream to the end.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the underlying stream.
    pub async fn collect_all(mut self) -> StreamResult<Vec<MutationFragment>> {
        let mut fragments = Vec::new();
        while let Some(fragment) = self.next_fragment().await? {
            fragments.push(fragment);
        }
        Ok(fragments)
    }

    /// Wraps the reader so every fragment passes through a
    /// [`FragmentStreamValidator`] that also checks partition keys against
    /// the schema. The first violation is yielded as an error and ends the
    /// stream.
    #[must_use]
    pub fn validated(self) -> Self {
        let validator =
            FragmentStreamValidator::new().with_key_validation(Arc::clone(&self.schema));
        let schema = Arc::clone(&self.schema);
        Self::from_stream(
            schema,
            Validated {
                inner: self.inner,
                validator,
                finished: false,
            },
        )
    }
}

impl Stream for FragmentReader {
    type Item = StreamResult<MutationFragment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for FragmentReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentReader")
            .field("schema", &format_args!("{}", self.schema))
            .finish_non_exhaustive()
    }
}

struct Validated {
    inner: BoxStream<'static, StreamResult<MutationFragment>>,
    validator: FragmentStreamValidator,
    finished: bool,
}

impl Stream for Validated {
    type Item = StreamResult<MutationFragment>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let item = match self.inner.poll_next_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(item) => item,
        };
        let this = &mut *self;
        let out = match item {
            Some(Ok(fragment)) => match this.validator.validate(&fragment) {
                Ok(()) => Some(Ok(fragment)),
                Err(e) => {
                    this.finished = true;
                    Some(Err(e))
                }
            },
            Some(Err(e)) => {
                this.finished = true;
                Some(Err(e))
            }
            None => {
                this.finished = true;
                this.validator.on_end_of_stream().err().map(Err::<MutationFragment, StreamError>)
            }
        };
        Poll::Ready(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_keys::{ColumnType, DecoratedKey, Key, Token};

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new("ks", "t", vec![ColumnType::Blob]))
    }

    fn start(token: i64) -> MutationFragment {
        MutationFragment::partition_start(
            DecoratedKey::new(Token(token), Key::from_bytes(vec![token as u8])),
            None,
        )
    }

    #[tokio::test]
    async fn reads_fragments_in_order() {
        let fragments = vec![start(1), MutationFragment::partition_end()];
        let mut reader = FragmentReader::from_fragments(schema(), fragments.clone());
        assert_eq!(reader.next_fragment().await.unwrap(), Some(fragments[0].clone()));
        assert_eq!(reader.next_fragment().await.unwrap(), Some(fragments[1].clone()));
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn empty_reader() {
        let reader = FragmentReader::empty(schema());
        assert!(reader.collect_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn source_errors_surface() {
        let items = vec![Ok(start(1)), Err(StreamError::source("disk gone"))];
        let reader = FragmentReader::from_stream(schema(), stream::iter(items));
        let err = reader.collect_all().await.unwrap_err();
        assert!(matches!(err, StreamError::Source { .. }));
    }

    #[tokio::test]
    async fn validated_reader_rejects_disorder() {
        let fragments = vec![
            start(2),
            MutationFragment::partition_end(),
            start(1),
            MutationFragment::partition_end(),
        ];
        let mut reader = FragmentReader::from_fragments(schema(), fragments).validated();
        assert!(reader.next_fragment().await.unwrap().is_some());
        assert!(reader.next_fragment().await.unwrap().is_some());
        assert!(reader.next_fragment().await.is_err());
        assert_eq!(reader.next_fragment().await.unwrap(), None);
    }

    #[tokio::test]
    async fn validated_reader_rejects_truncation() {
        let reader = FragmentReader::from_fragments(schema(), vec![start(1)]).validated();
        let err = reader.collect_all().await.unwrap_err();
        assert!(err.to_string().contains("ended inside partition"));
    }
}
