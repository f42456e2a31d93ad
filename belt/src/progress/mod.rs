//! Progress accumulation and periodic top-N diff reporting.
//!
//! Workers post [`WorkerMetrics`] increments through a [`ShardProgress`]
//! handle; a background aggregator merges them and emits the per-tick diff,
//! sorted by successes, through a notify callback. Each job runs two
//! aggregators: one for the read side, one for the write side.

mod aggregator;

pub use aggregator::{ProgressAggregator, ProgressAggregatorHandle};

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Sub};

use serde::Serialize;
use tokio::sync::mpsc;

/// Counts of records handled by one worker role for one shard.
///
/// After sink handling, `processed == successes + errors` holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerMetrics {
    pub processed: u64,
    pub successes: u64,
    pub errors: u64,
}

impl WorkerMetrics {
    pub fn is_zero(&self) -> bool {
        self.processed == 0 && self.successes == 0 && self.errors == 0
    }
}

impl Add for WorkerMetrics {
    type Output = WorkerMetrics;

    fn add(self, rhs: WorkerMetrics) -> WorkerMetrics {
        WorkerMetrics {
            processed: self.processed + rhs.processed,
            successes: self.successes + rhs.successes,
            errors: self.errors + rhs.errors,
        }
    }
}

impl AddAssign for WorkerMetrics {
    fn add_assign(&mut self, rhs: WorkerMetrics) {
        *self = *self + rhs;
    }
}

impl Sub for WorkerMetrics {
    type Output = WorkerMetrics;

    /// Entry-wise difference. Accumulated progress is monotone, so the
    /// subtraction saturates rather than wrapping.
    fn sub(self, rhs: WorkerMetrics) -> WorkerMetrics {
        WorkerMetrics {
            processed: self.processed.saturating_sub(rhs.processed),
            successes: self.successes.saturating_sub(rhs.successes),
            errors: self.errors.saturating_sub(rhs.errors),
        }
    }
}

/// A shard's metrics row, ordered for top-N reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardMetrics {
    pub shard: String,
    pub metrics: WorkerMetrics,
}

impl ShardMetrics {
    /// Flattens a progress map into rows sorted by descending successes,
    /// ties broken by shard id for deterministic output.
    pub fn from_map(map: HashMap<String, WorkerMetrics>) -> Vec<ShardMetrics> {
        let mut rows: Vec<ShardMetrics> = map
            .into_iter()
            .map(|(shard, metrics)| ShardMetrics { shard, metrics })
            .collect();
        rows.sort_by(|a, b| {
            b.metrics
                .successes
                .cmp(&a.metrics.successes)
                .then_with(|| a.shard.cmp(&b.shard))
        });
        rows
    }
}

/// One progress posting: per-shard metric increments.
pub type ProgressUpdate = HashMap<String, WorkerMetrics>;

/// Shard-scoped handle used by workers to post progress increments.
///
/// Posting blocks when the aggregator's inbound buffer is full; once the
/// aggregator is gone, updates are dropped silently.
#[derive(Debug, Clone)]
pub struct ShardProgress {
    shard: String,
    updates_tx: mpsc::Sender<ProgressUpdate>,
}

impl ShardProgress {
    pub(crate) fn new(shard: String, updates_tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { shard, updates_tx }
    }

    pub async fn update(&self, metrics: WorkerMetrics) {
        let update = HashMap::from([(self.shard.clone(), metrics)]);
        let _ = self.updates_tx.send(update).await;
    }
}
