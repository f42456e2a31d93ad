use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::progress::{ProgressUpdate, ShardMetrics, ShardProgress, WorkerMetrics};

/// Accumulates worker progress and periodically reports top-N diffs.
///
/// The aggregator owns a bounded inbound channel and a single background
/// task: workers post immutable per-update maps, the task merges them and
/// emits the diff since the previous tick. The accumulated map is touched by
/// the background task only, so no locking is involved.
#[derive(Debug)]
pub struct ProgressAggregator {
    frequency: Duration,
    updates_tx: mpsc::Sender<ProgressUpdate>,
    updates_rx: mpsc::Receiver<ProgressUpdate>,
}

impl ProgressAggregator {
    /// Default reporting period.
    pub const DEFAULT_FREQUENCY: Duration = Duration::from_secs(2);

    /// Default number of rows emitted per tick.
    pub const DEFAULT_TOP_N: usize = 5;

    pub fn new(frequency: Duration, buffer: usize) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(buffer.max(1));
        Self {
            frequency,
            updates_tx,
            updates_rx,
        }
    }

    /// Starts the background accumulation task.
    ///
    /// On every tick, the nonzero per-shard diff since the previous tick is
    /// sorted by descending successes, truncated to `top_n` when `top_n >= 1`,
    /// and handed to `notify`. The task ends once every sender is dropped and
    /// the channel drains, publishing the final accumulated map as stats.
    pub fn spawn<N>(self, top_n: usize, notify: N) -> ProgressAggregatorHandle
    where
        N: Fn(Vec<ShardMetrics>) + Send + 'static,
    {
        let ProgressAggregator {
            frequency,
            updates_tx,
            mut updates_rx,
        } = self;

        let task = tokio::spawn(async move {
            let mut progress: HashMap<String, WorkerMetrics> = HashMap::new();
            let mut last_progress: HashMap<String, WorkerMetrics> = HashMap::new();

            let mut ticker = interval_at(Instant::now() + frequency, frequency);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let changes = diff(&progress, &last_progress);
                        if !changes.is_empty() {
                            let mut rows = ShardMetrics::from_map(changes);
                            if top_n >= 1 {
                                rows.truncate(top_n);
                            }
                            notify(rows);
                        }
                        last_progress = progress.clone();
                    }
                    update = updates_rx.recv() => {
                        match update {
                            Some(update) => merge(&mut progress, update),
                            None => break,
                        }
                    }
                }
            }

            progress
        });

        ProgressAggregatorHandle { updates_tx, task }
    }
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FREQUENCY, 1)
    }
}

/// Handle for feeding and stopping a running [`ProgressAggregator`].
#[derive(Debug)]
pub struct ProgressAggregatorHandle {
    updates_tx: mpsc::Sender<ProgressUpdate>,
    task: JoinHandle<HashMap<String, WorkerMetrics>>,
}

impl ProgressAggregatorHandle {
    /// Returns a shard-scoped posting handle for worker tasks.
    pub fn shard_progress(&self, shard: impl Into<String>) -> ShardProgress {
        ShardProgress::new(shard.into(), self.updates_tx.clone())
    }

    /// Posts a raw multi-shard update.
    pub async fn post(&self, update: ProgressUpdate) {
        let _ = self.updates_tx.send(update).await;
    }

    /// Stops accepting new updates and waits for the final accumulated stats.
    ///
    /// Worker-held [`ShardProgress`] clones keep the channel open; the
    /// background task finishes once the last of them is gone and the buffer
    /// has drained.
    pub async fn close(self) -> HashMap<String, WorkerMetrics> {
        drop(self.updates_tx);
        self.task.await.unwrap_or_default()
    }
}

fn merge(progress: &mut HashMap<String, WorkerMetrics>, update: ProgressUpdate) {
    for (shard, metrics) in update {
        *progress.entry(shard).or_default() += metrics;
    }
}

fn diff(
    latest: &HashMap<String, WorkerMetrics>,
    last: &HashMap<String, WorkerMetrics>,
) -> HashMap<String, WorkerMetrics> {
    let mut result = HashMap::new();
    for (shard, metrics) in latest {
        let delta = match last.get(shard) {
            Some(earlier) => *metrics - *earlier,
            None => *metrics,
        };
        if !delta.is_zero() {
            result.insert(shard.clone(), delta);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn metrics(processed: u64, successes: u64, errors: u64) -> WorkerMetrics {
        WorkerMetrics {
            processed,
            successes,
            errors,
        }
    }

    fn update(shard: &str, m: WorkerMetrics) -> ProgressUpdate {
        HashMap::from([(shard.to_owned(), m)])
    }

    #[tokio::test]
    async fn stats_equal_entry_wise_sum_of_updates() {
        let handle = ProgressAggregator::new(Duration::from_secs(60), 8).spawn(0, |_| {});

        handle.post(update("a", metrics(2, 2, 0))).await;
        handle.post(update("a", metrics(3, 2, 1))).await;
        handle.post(update("b", metrics(1, 1, 0))).await;

        let stats = handle.close().await;
        assert_eq!(stats.get("a"), Some(&metrics(5, 4, 1)));
        assert_eq!(stats.get("b"), Some(&metrics(1, 1, 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn tick_emits_diff_sorted_and_truncated() {
        let emitted: Arc<Mutex<Vec<Vec<ShardMetrics>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);

        let handle = ProgressAggregator::new(Duration::from_secs(2), 8).spawn(1, move |rows| {
            sink.lock().unwrap().push(rows);
        });

        handle.post(update("a", metrics(2, 2, 0))).await;
        handle
            .post(HashMap::from([
                ("a".to_owned(), metrics(3, 3, 0)),
                ("b".to_owned(), metrics(1, 1, 0)),
            ]))
            .await;
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        // Zero update after the tick must not produce a second emission.
        handle.post(update("a", metrics(0, 0, 0))).await;
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        let stats = handle.close().await;
        assert_eq!(stats.get("a"), Some(&metrics(5, 5, 0)));

        let emitted = emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1, "expected exactly one diff emission");
        // top_n = 1 keeps only the shard with the most successes.
        assert_eq!(emitted[0].len(), 1);
        assert_eq!(emitted[0][0].shard, "a");
        assert_eq!(emitted[0][0].metrics, metrics(5, 5, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn second_tick_reports_only_the_delta() {
        let emitted: Arc<Mutex<Vec<Vec<ShardMetrics>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);

        let handle = ProgressAggregator::new(Duration::from_secs(2), 8).spawn(5, move |rows| {
            sink.lock().unwrap().push(rows);
        });

        handle.post(update("a", metrics(4, 4, 0))).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        handle.post(update("a", metrics(1, 0, 1))).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;

        let _ = handle.close().await;

        let emitted = emitted.lock().unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0][0].metrics, metrics(4, 4, 0));
        assert_eq!(emitted[1][0].metrics, metrics(1, 0, 1));
    }

    #[tokio::test]
    async fn updates_posted_before_close_survive_without_any_tick() {
        let handle = ProgressAggregator::new(Duration::from_secs(3600), 4).spawn(5, |_| {});
        handle.post(update("only", metrics(7, 6, 1))).await;
        let stats = handle.close().await;
        assert_eq!(stats.get("only"), Some(&metrics(7, 6, 1)));
    }
}
