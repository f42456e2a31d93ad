use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::belt_error;
use crate::chunks::build_equal_chunks;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{BeltResult, ErrorKind};
use crate::metrics::{
    BELT_BATCHES_READ_TOTAL, BELT_BATCH_TRANSFORM_DURATION_SECONDS, BELT_READ_BATCH_SIZE,
    BELT_RECORDS_READ_TOTAL, BELT_RECORDS_WRITTEN_TOTAL, OUTCOME_LABEL, SHARD_LABEL,
};
use crate::processor::ElementProcessor;
use crate::progress::{ShardProgress, WorkerMetrics};
use crate::sink::{SinkWriter, SinkWriterFactory};
use crate::source::{ElementPartition, ElementShard, ShardResource};
use crate::types::{PartitionRecordBatch, ProcessedPayload};

/// The per-shard pipeline: reader chunks fill a bounded buffer, producer
/// tasks drain it into sinks.
///
/// The buffer is the only cross-task structure on the hot path. It carries
/// ownership of each batch from the consume side to exactly one producer;
/// only the consume side closes it, which is what terminates the producers.
#[derive(Debug)]
pub struct ShardWorker<T> {
    shard_id: String,
    batch_tx: StdMutex<Option<mpsc::Sender<PartitionRecordBatch<T>>>>,
    batch_rx: Arc<Mutex<mpsc::Receiver<PartitionRecordBatch<T>>>>,
}

impl<T: Send + Sync + 'static> ShardWorker<T> {
    /// Builds the worker and its bounded buffer of `read_buffer_size` batches.
    pub fn new(shard_id: impl Into<String>, read_buffer_size: usize) -> Self {
        let (batch_tx, batch_rx) = mpsc::channel(read_buffer_size.max(1));
        Self {
            shard_id: shard_id.into(),
            batch_tx: StdMutex::new(Some(batch_tx)),
            batch_rx: Arc::new(Mutex::new(batch_rx)),
        }
    }

    pub fn shard_id(&self) -> &str {
        &self.shard_id
    }

    /// Drains every partition of `shard` into the buffer using up to
    /// `read_parallelism` reader chunks, then closes the buffer.
    ///
    /// Each chunk task opens its own shard resource, round-robins over its
    /// partitions, and observes the shutdown signal at iteration boundaries.
    /// Partitions and the resource are closed on every exit path. Returns
    /// the first chunk error after all chunks have settled.
    pub async fn consume<S>(
        &self,
        shard: S,
        read_parallelism: usize,
        read_batch_size: usize,
        progress: ShardProgress,
        max_batches_per_chunk: u64,
        shutdown_rx: ShutdownRx,
    ) -> BeltResult<()>
    where
        S: ElementShard<T>,
    {
        let Some(batch_tx) = self.batch_tx.lock().unwrap().take() else {
            bail!(ErrorKind::Other, "Shard consume entered twice");
        };

        let partitions = shard.partitions().await?;
        let parallelism = read_parallelism.min(partitions.len()).max(1);
        let partition_count = partitions.len();
        let chunks = build_equal_chunks(partitions, parallelism);
        info!(
            shard = %self.shard_id,
            partitions = partition_count,
            chunks = chunks.len(),
            parallelism,
            "starting shard consumer"
        );

        let shard = Arc::new(shard);
        let mut tasks: JoinSet<BeltResult<()>> = JoinSet::new();
        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let shard = Arc::clone(&shard);
            let shard_id = self.shard_id.clone();
            let batch_tx = batch_tx.clone();
            let progress = progress.clone();
            let shutdown_rx = shutdown_rx.clone();
            tasks.spawn(async move {
                run_reader_chunk(
                    shard,
                    shard_id,
                    chunk_index,
                    chunk,
                    batch_tx,
                    read_batch_size,
                    progress,
                    max_batches_per_chunk,
                    shutdown_rx,
                )
                .await
            });
        }
        drop(batch_tx);

        let result = join_first_error(&mut tasks, &self.shard_id, "reader chunk").await;
        info!(shard = %self.shard_id, "shard consumer finished");
        result
    }

    /// Drains the buffer with `write_parallelism` producer tasks, each
    /// owning one sink created from `sink_factory`.
    ///
    /// Runs until the consume side closes the buffer; whatever is already
    /// buffered is still drained when the consumer failed. Returns the first
    /// producer error after all producers have settled.
    pub async fn produce<P, F>(
        &self,
        processor: P,
        sink_factory: F,
        write_parallelism: usize,
        progress: ShardProgress,
    ) -> BeltResult<()>
    where
        P: ElementProcessor<T> + Clone,
        F: SinkWriterFactory,
    {
        let mut tasks: JoinSet<BeltResult<()>> = JoinSet::new();
        for producer_index in 0..write_parallelism.max(1) {
            let shard_id = self.shard_id.clone();
            let producer_name = format!("{}_producer_{}", self.shard_id, producer_index);
            let batch_rx = Arc::clone(&self.batch_rx);
            let processor = processor.clone();
            let sink_factory = sink_factory.clone();
            let progress = progress.clone();
            tasks.spawn(async move {
                run_producer(shard_id, producer_name, batch_rx, processor, sink_factory, progress)
                    .await
            });
        }

        let result = join_first_error(&mut tasks, &self.shard_id, "producer").await;
        // Unblocks the consume side if every producer bailed before the
        // buffer was closed.
        self.batch_rx.lock().await.close();
        info!(shard = %self.shard_id, "shard producers finished");
        result
    }
}

async fn join_first_error(
    tasks: &mut JoinSet<BeltResult<()>>,
    shard_id: &str,
    role: &str,
) -> BeltResult<()> {
    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(shard = %shard_id, role, error = %err, "shard task failed");
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
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[expect(clippy::too_many_arguments)]
async fn run_reader_chunk<T, S>(
    shard: Arc<S>,
    shard_id: String,
    chunk_index: usize,
    mut partitions: Vec<S::Partition>,
    batch_tx: mpsc::Sender<PartitionRecordBatch<T>>,
    read_batch_size: usize,
    progress: ShardProgress,
    max_batches_per_chunk: u64,
    shutdown_rx: ShutdownRx,
) -> BeltResult<()>
where
    T: Send + Sync + 'static,
    S: ElementShard<T>,
{
    debug!(
        shard = %shard_id,
        chunk = chunk_index,
        partitions = partitions.len(),
        "starting reader chunk"
    );

    let result = match shard.new_resource().await {
        Ok(mut resource) => {
            let drained = drain_partitions(
                &shard_id,
                chunk_index,
                &mut partitions,
                &mut resource,
                &batch_tx,
                read_batch_size,
                &progress,
                max_batches_per_chunk,
                shutdown_rx,
            )
            .await;
            if let Err(err) = resource.close().await {
                warn!(shard = %shard_id, chunk = chunk_index, error = %err, "failed to close chunk resource");
            }
            drained
        }
        Err(err) => Err(err),
    };

    for partition in &mut partitions {
        if let Err(err) = partition.close().await {
            warn!(shard = %shard_id, partition = partition.id(), error = %err, "failed to close partition");
        }
    }

    debug!(shard = %shard_id, chunk = chunk_index, "reader chunk finished");
    result
}

#[expect(clippy::too_many_arguments)]
async fn drain_partitions<T, P, R>(
    shard_id: &str,
    chunk_index: usize,
    partitions: &mut [P],
    resource: &mut R,
    batch_tx: &mpsc::Sender<PartitionRecordBatch<T>>,
    read_batch_size: usize,
    progress: &ShardProgress,
    max_batches_per_chunk: u64,
    shutdown_rx: ShutdownRx,
) -> BeltResult<()>
where
    T: Send + Sync + 'static,
    P: ElementPartition<T, Resource = R>,
    R: ShardResource,
{
    let mut fetched: u64 = 0;
    let mut pending_work = true;
    while pending_work && (max_batches_per_chunk == 0 || fetched < max_batches_per_chunk) {
        if *shutdown_rx.borrow() {
            info!(shard = %shard_id, chunk = chunk_index, "shutdown observed, stopping reader chunk");
            return Ok(());
        }
        pending_work = false;
        for partition in partitions.iter_mut() {
            if partition.done() {
                continue;
            }
            pending_work = true;

            let batch = partition.next_batch(resource, read_batch_size).await?;
            fetched += 1;
            let Some((records, offset)) = batch else {
                continue;
            };

            let produced = records.len() as u64;
            let batch = PartitionRecordBatch::new(
                shard_id.to_owned(),
                partition.id().to_owned(),
                offset,
                records,
            );
            if batch_tx.send(batch).await.is_err() {
                return Ok(());
            }

            counter!(BELT_BATCHES_READ_TOTAL, SHARD_LABEL => shard_id.to_owned()).increment(1);
            counter!(BELT_RECORDS_READ_TOTAL, SHARD_LABEL => shard_id.to_owned())
                .increment(produced);
            histogram!(BELT_READ_BATCH_SIZE, SHARD_LABEL => shard_id.to_owned())
                .record(produced as f64);

            progress
                .update(WorkerMetrics {
                    processed: produced,
                    successes: produced,
                    errors: 0,
                })
                .await;
        }
    }
    Ok(())
}

async fn run_producer<T, P, F>(
    shard_id: String,
    producer_name: String,
    batch_rx: Arc<Mutex<mpsc::Receiver<PartitionRecordBatch<T>>>>,
    processor: P,
    sink_factory: F,
    progress: ShardProgress,
) -> BeltResult<()>
where
    T: Send + Sync + 'static,
    P: ElementProcessor<T>,
    F: SinkWriterFactory,
{
    let mut sink = sink_factory.create(&producer_name).await?;
    info!(shard = %shard_id, producer = %producer_name, "shard producer started");

    loop {
        let batch = { batch_rx.lock().await.recv().await };
        let Some(batch) = batch else {
            break;
        };
        let metrics = handle_batch(&shard_id, &producer_name, &batch, &processor, &mut sink).await;
        progress.update(metrics).await;
    }

    info!(shard = %shard_id, producer = %producer_name, "shard producer finished");
    if let Err(err) = sink.close().await {
        warn!(shard = %shard_id, producer = %producer_name, error = %err, "failed to close sink");
    }
    Ok(())
}

async fn handle_batch<T, P, W>(
    shard_id: &str,
    producer_name: &str,
    batch: &PartitionRecordBatch<T>,
    processor: &P,
    sink: &mut W,
) -> WorkerMetrics
where
    T: Send + Sync + 'static,
    P: ElementProcessor<T>,
    W: SinkWriter,
{
    let started = Instant::now();
    let mut metrics = WorkerMetrics::default();

    match processor.process_batch(batch.records()).await {
        Err(err) => {
            warn!(
                shard = %shard_id,
                producer = %producer_name,
                batch = batch.batch_id(),
                error = %err,
                "batch transform failed"
            );
            for index in 0..batch.len() {
                metrics.processed += 1;
                metrics.errors += 1;
                let id = batch.record_id(index);
                if let Err(sink_err) = sink.append_error(&id, &err).await {
                    warn!(shard = %shard_id, producer = %producer_name, error = %sink_err, "failed to append error record");
                }
            }
        }
        Ok(outputs) => {
            for (index, output) in outputs.into_iter().enumerate() {
                metrics.processed += 1;
                let id = output.id.unwrap_or_else(|| batch.record_id(index));
                match output.payload {
                    ProcessedPayload::Record(record) => {
                        metrics.successes += 1;
                        if let Err(sink_err) = sink.append(&id, &record).await {
                            warn!(shard = %shard_id, producer = %producer_name, error = %sink_err, "failed to append record");
                        }
                    }
                    ProcessedPayload::Failed(record_err) => {
                        metrics.errors += 1;
                        if let Err(sink_err) = sink.append_error(&id, &record_err).await {
                            warn!(shard = %shard_id, producer = %producer_name, error = %sink_err, "failed to append error record");
                        }
                    }
                }
            }
        }
    }

    counter!(BELT_RECORDS_WRITTEN_TOTAL, SHARD_LABEL => shard_id.to_owned(), OUTCOME_LABEL => "success")
        .increment(metrics.successes);
    counter!(BELT_RECORDS_WRITTEN_TOTAL, SHARD_LABEL => shard_id.to_owned(), OUTCOME_LABEL => "error")
        .increment(metrics.errors);
    histogram!(BELT_BATCH_TRANSFORM_DURATION_SECONDS, SHARD_LABEL => shard_id.to_owned())
        .record(started.elapsed().as_secs_f64());

    metrics
}
