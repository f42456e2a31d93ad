//! Runs a belt job over a directory of line-delimited JSON files.
//!
//! Reads every matching file under `--input`, optionally transforms each
//! batch through an HTTP endpoint, and writes gzip-compressed JSON lines
//! into `--output`, one file per producer. Ctrl-c triggers a graceful
//! shutdown: readers stop, producers drain, partial output stays valid.

use std::error::Error;
use std::path::PathBuf;

use belt::concurrency::shutdown::create_shutdown_channel;
use belt::executor::execute_all;
use belt::processor::{HttpPostProcessor, IdentityProcessor, json_request_payload};
use belt::sink::FsSinkWriterFactory;
use belt::source::{DirectorySource, json_line_decoder};
use belt_config::shared::{JobConfig, ProgressConfig};
use belt_telemetry::tracing::init_tracing;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of input files.
    #[arg(long)]
    input: PathBuf,

    /// Directory for sink output files.
    #[arg(long)]
    output: PathBuf,

    /// Group input files into one shard per filename prefix instead of a
    /// single shard for the whole directory.
    #[arg(long)]
    group_by_prefix: bool,

    /// Filename suffix selecting input files in single-shard mode.
    #[arg(long, default_value = ".gz")]
    suffix: String,

    /// Transform endpoint host; records pass through unchanged when absent.
    #[arg(long)]
    transform_host: Option<String>,

    /// Transform endpoint path.
    #[arg(long, default_value = "transform")]
    transform_path: String,

    /// Maximum concurrent reader chunks per shard.
    #[arg(long, default_value_t = 2)]
    read_parallelism: usize,

    /// Concurrent producer tasks per shard.
    #[arg(long, default_value_t = 2)]
    write_parallelism: usize,

    /// Bounded buffer capacity per shard, in batches.
    #[arg(long, default_value_t = 16)]
    read_buffer_size: usize,

    /// Records requested per partition read.
    #[arg(long, default_value_t = 500)]
    read_batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    init_tracing()?;
    let args = Args::parse();

    let config = JobConfig {
        read_parallelism_per_shard: args.read_parallelism,
        write_parallelism_per_shard: args.write_parallelism,
        read_buffer_size: args.read_buffer_size,
        read_batch_size: args.read_batch_size,
        max_batches_per_chunk: 0,
        progress: ProgressConfig::default(),
    };

    let decoder = json_line_decoder::<serde_json::Value>();
    let source = if args.group_by_prefix {
        DirectorySource::grouped_by_prefix(&args.input, decoder)?
    } else {
        DirectorySource::single_shard(&args.input, &args.suffix, decoder)?
    };
    let sink_factory = FsSinkWriterFactory::json(&args.output)?;

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    match &args.transform_host {
        Some(host) => {
            let processor =
                HttpPostProcessor::new(host, &args.transform_path, json_request_payload())?;
            execute_all(&source, processor, sink_factory, &config, shutdown_rx).await?;
        }
        None => {
            execute_all(&source, IdentityProcessor, sink_factory, &config, shutdown_rx).await?;
        }
    }

    info!("job finished");
    Ok(())
}
