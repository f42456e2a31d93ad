//! Top-level job execution: shard fan-out, progress wiring, final stats.

use std::sync::Arc;
use std::time::Duration;

use belt_config::shared::JobConfig;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::belt_error;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{BeltResult, ErrorKind};
use crate::metrics::register_metrics;
use crate::processor::ElementProcessor;
use crate::progress::{ProgressAggregator, ShardMetrics};
use crate::sink::SinkWriterFactory;
use crate::source::{ElementShard, ElementSource};
use crate::workers::ShardWorker;

/// Runs a whole job: every shard of `source` flows through `processor` into
/// sinks from `sink_factory`, with periodic progress reporting on both the
/// read and the write side.
///
/// Per shard, one consume task and one produce task share a bounded buffer.
/// The first shard-task error is returned after all tasks have settled;
/// progress aggregation always completes, so final stats are logged either
/// way and partial sink output remains valid.
pub async fn execute_all<T, S, P, F>(
    source: &S,
    processor: P,
    sink_factory: F,
    config: &JobConfig,
    shutdown_rx: ShutdownRx,
) -> BeltResult<()>
where
    T: Send + Sync + 'static,
    S: ElementSource<T>,
    P: ElementProcessor<T> + Clone,
    F: SinkWriterFactory,
{
    config.validate().map_err(|err| {
        belt_error!(ErrorKind::InvalidConfiguration, "Invalid job configuration", err)
    })?;
    register_metrics();

    let shards = source.shards().await?;
    info!(source = %source.id(), shards = shards.len(), "starting job");

    let tick = Duration::from_millis(config.progress.tick_interval_ms);
    let read_progress = ProgressAggregator::new(
        tick,
        shards.len() * config.read_parallelism_per_shard,
    )
    .spawn(config.progress.top_n, |rows| {
        info!(progress = ?rows, "read progress")
    });
    let write_progress = ProgressAggregator::new(
        tick,
        shards.len() * config.write_parallelism_per_shard,
    )
    .spawn(config.progress.top_n, |rows| {
        info!(progress = ?rows, "write progress")
    });

    let mut tasks: JoinSet<BeltResult<()>> = JoinSet::new();
    for shard in shards {
        let shard_id = shard.id().to_owned();
        let worker = Arc::new(ShardWorker::new(&shard_id, config.read_buffer_size));

        let consume_worker = Arc::clone(&worker);
        let consume_progress = read_progress.shard_progress(&shard_id);
        let consume_shutdown = shutdown_rx.clone();
        let read_parallelism = config.read_parallelism_per_shard;
        let read_batch_size = config.read_batch_size;
        let max_batches_per_chunk = config.max_batches_per_chunk;
        tasks.spawn(async move {
            consume_worker
                .consume(
                    shard,
                    read_parallelism,
                    read_batch_size,
                    consume_progress,
                    max_batches_per_chunk,
                    consume_shutdown,
                )
                .await
        });

        let produce_progress = write_progress.shard_progress(&shard_id);
        let processor = processor.clone();
        let sink_factory = sink_factory.clone();
        let write_parallelism = config.write_parallelism_per_shard;
        tasks.spawn(async move {
            worker
                .produce(processor, sink_factory, write_parallelism, produce_progress)
                .await
        });
    }

    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(error = %err, "shard task failed");
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                first_error.get_or_insert(belt_error!(
                    ErrorKind::WorkerPanicked,
                    "Shard task panicked",
                    join_err
                ));
            }
        }
    }

    let read_stats = read_progress.close().await;
    let write_stats = write_progress.close().await;
    info!(stats = ?ShardMetrics::from_map(read_stats), "final read stats");
    info!(stats = ?ShardMetrics::from_map(write_stats), "final write stats");

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
