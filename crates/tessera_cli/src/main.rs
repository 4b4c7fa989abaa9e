//! Tessera CLI
//!
//! Command-line tools for splitting mutation dumps.
//!
//! # Commands
//!
//! - `split-shards` - Split a dump by owning shard
//! - `split-timestamps` - Split a dump into write-timestamp windows

mod commands;
mod dump;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera_keys::StaticSharder;
use tessera_writer::{CancellationToken, DEFAULT_QUEUE_CAPACITY};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Tessera command-line tools.
#[derive(Parser)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a dump into one stream per owning shard
    SplitShards {
        /// JSON dump to read
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the bucket files
        #[arg(short, long)]
        output: PathBuf,

        /// Number of shards
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        shards: u32,

        /// High token bits ignored by the sharder
        #[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(0..64))]
        ignore_msb: u32,

        /// Fragments buffered per bucket
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,
    },

    /// Split a dump into write-timestamp windows
    SplitTimestamps {
        /// JSON dump to read
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the bucket files
        #[arg(short, long)]
        output: PathBuf,

        /// Window width in microseconds
        #[arg(short, long, value_parser = clap::value_parser!(i64).range(1..))]
        window: i64,

        /// Fragments buffered per bucket
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        queue_capacity: usize,
    },

    /// Show version information
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, finishing open partitions");
                cancel.cancel();
            }
        });
    }

    let stats = match cli.command {
        Commands::SplitShards {
            input,
            output,
            shards,
            ignore_msb,
            queue_capacity,
        } => {
            let sharder = StaticSharder::new(shards, ignore_msb);
            commands::split_shards::run(&input, &output, sharder, queue_capacity, cancel).await?
        }
        Commands::SplitTimestamps {
            input,
            output,
            window,
            queue_capacity,
        } => {
            commands::split_timestamps::run(&input, &output, window, queue_capacity, cancel).await?
        }
        Commands::Version => {
            println!("Tessera CLI v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    println!("{stats}");
    Ok(())
}
