//! CLI command implementations.

pub mod split_shards;
pub mod split_timestamps;

use crate::dump::encode_fragment;
use crate::error::CliResult;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::FragmentReader;
use tessera_keys::Schema;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Output file of `bucket` under `dir`.
pub fn bucket_path(dir: &Path, bucket: &impl Display) -> PathBuf {
    dir.join(format!("bucket-{bucket}.jsonl"))
}

/// Writes a bucket's stream to `path`, one JSON fragment per line.
async fn write_bucket(
    path: PathBuf,
    schema: Arc<Schema>,
    mut stream: FragmentReader,
) -> CliResult<()> {
    let mut out = BufWriter::new(tokio::fs::File::create(&path).await?);
    let mut fragments = 0u64;
    while let Some(fragment) = stream.next_fragment().await? {
        let mut line = serde_json::to_vec(&encode_fragment(&schema, &fragment)?)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        fragments += 1;
    }
    out.flush().await?;
    debug!(path = %path.display(), fragments, "bucket written");
    Ok(())
}
