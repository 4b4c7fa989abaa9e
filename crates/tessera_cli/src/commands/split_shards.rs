//! Split-shards command implementation.

use super::{bucket_path, write_bucket};
use crate::dump::Dump;
use crate::error::CliResult;
use std::path::Path;
use std::sync::Arc;
use tessera_core::FragmentReader;
use tessera_keys::StaticSharder;
use tessera_writer::{CancellationToken, SegregationConfig, SegregationStats, Segregator};
use tracing::info;

/// Runs the split-shards command.
pub async fn run(
    input: &Path,
    output: &Path,
    sharder: StaticSharder,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> CliResult<SegregationStats> {
    let dump = Dump::load(input)?;
    let schema = Arc::new(dump.schema(sharder));
    let fragments = dump.into_fragments(&schema)?;
    info!(table = %schema, fragments = fragments.len(), "splitting by shard");

    tokio::fs::create_dir_all(output).await?;
    let producer = FragmentReader::from_fragments(Arc::clone(&schema), fragments);
    let segregator = Segregator::new(SegregationConfig::new().with_queue_capacity(queue_capacity))
        .with_cancellation(cancel);
    let stats = segregator
        .by_shard(producer, |shard, stream| {
            write_bucket(bucket_path(output, &shard), Arc::clone(&schema), stream)
        })
        .await?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{read_bucket, write_dump};
    use crate::dump::FragmentDto;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_one_file_per_shard() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(dir.path());
        let output = dir.path().join("out");

        let stats = run(&input, &output, StaticSharder::new(3, 0), 4, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.partitions, 4);

        let mut starts = 0;
        let mut lines = 0;
        for shard in 0..3u32 {
            let path = bucket_path(&output, &shard);
            if !path.exists() {
                continue;
            }
            let fragments = read_bucket(&path);
            lines += fragments.len();
            starts += fragments
                .iter()
                .filter(|f| matches!(f, FragmentDto::PartitionStart { .. }))
                .count();
        }
        assert_eq!(starts, 4);
        assert_eq!(lines as u64, stats.fragments_in);
    }

    #[tokio::test]
    async fn single_shard_keeps_token_order() {
        let dir = TempDir::new().unwrap();
        let input = write_dump(dir.path());
        let output = dir.path().join("out");

        run(&input, &output, StaticSharder::single(), 16, CancellationToken::new())
            .await
            .unwrap();
        let tokens: Vec<i64> = read_bucket(&bucket_path(&output, &0))
            .into_iter()
            .filter_map(|f| match f {
                FragmentDto::PartitionStart { token, .. } => Some(token),
                _ => None,
            })
            .collect();
        assert_eq!(tokens.len(), 4);
        assert!(tokens.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let result = run(
            &dir.path().join("absent.json"),
            dir.path(),
            StaticSharder::single(),
            16,
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
