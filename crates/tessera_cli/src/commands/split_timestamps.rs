//! Split-timestamps command implementation.

use super::{bucket_path, write_bucket};
use crate::dump::Dump;
use crate::error::{CliError, CliResult};
use std::path::Path;
use std::sync::Arc;
use tessera_core::{FragmentReader, Timestamp};
use tessera_keys::StaticSharder;
use tessera_writer::{CancellationToken, SegregationConfig, SegregationStats, Segregator};
use tracing::info;

/// Runs the split-timestamps command.
///
/// Buckets are windows of `window` microseconds; bucket `n` holds data
/// written in `[n * window, (n + 1) * window)`.
pub async fn run(
    input: &Path,
    output: &Path,
    window: i64,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> CliResult<SegregationStats> {
    if window <= 0 {
        return Err(CliError::dump(format!("window must be positive, got {window}")));
    }
    let dump = Dump::load(input)?;
    let schema = Arc::new(dump.schema(StaticSharder::single()));
    let fragments = dump.into_fragments(&schema)?;
    info!(table = %schema, fragments = fragments.len(), window, "splitting by timestamp");

    tokio::fs::create_dir_all(output).await?;
    let producer = FragmentReader::from_fragments(Arc::clone(&schema), fragments);
    let segregator = Segregator::new(SegregationConfig::new().with_queue_capacity(queue_capacity))
        .with_cancellation(cancel);
    let stats = segregator
        .by_timestamp(
            producer,
            |ts: Timestamp| ts.value().div_euclid(window),
            |bucket, stream| {
                write_bucket(bucket_path(output, &bucket), Arc::clone(&schema), stream)
            },
        )
        .await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{read_bucket, write_dump};
    use crate::dump::FragmentDto;
    use tempfile::TempDir;

    fn kinds(fragments: &[FragmentDto]) -> Vec<&'static str> {
        fragments
            .iter()
            .map(|f| match f {
                FragmentDto::PartitionStart { .. } => "start",
                FragmentDto::StaticRow { .. } => "static",
                FragmentDto::Row { .. } => "row",
                FragmentDto::RangeTombstoneChange { .. } => "rtc",
                FragmentDto::PartitionEnd => "end",
            })
            .collect()
    }

    #[tokio::test]
    async fn writes_one_file_per_window() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(dir.path());
        let output = dir.path().join("out");

        let stats = run(&input, &output, 10, 16, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.buckets, 4);

        // Window 0: static row of "d". Window 1: two rows of "a" and the
        // tombstone of "c". Window 2: one row of "a". Window 3: "b".
        let window0 = read_bucket(&bucket_path(&output, &0));
        assert_eq!(kinds(&window0), vec!["start", "static", "end"]);
        let window1 = read_bucket(&bucket_path(&output, &1));
        assert_eq!(kinds(&window1).iter().filter(|k| **k == "row").count(), 2);
        assert_eq!(kinds(&window1).iter().filter(|k| **k == "start").count(), 2);
        let window2 = read_bucket(&bucket_path(&output, &2));
        assert_eq!(kinds(&window2), vec!["start", "row", "end"]);
        let window3 = read_bucket(&bucket_path(&output, &3));
        assert_eq!(kinds(&window3), vec!["start", "row", "end"]);
    }

    #[tokio::test]
    async fn rejects_non_positive_window() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(dir.path());
        let err = run(&input, dir.path(), 0, 16, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Dump { .. }));
    }
}
