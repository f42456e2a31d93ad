use std::sync::OnceLock;

use crate::types::{ElementId, Offset};

/// One batch of records drawn from a partition, annotated with where it came
/// from and where its partition cursor ended.
///
/// The batch is the unit of buffer occupancy: it travels from exactly one
/// reader chunk to exactly one producer.
#[derive(Debug)]
pub struct PartitionRecordBatch<T> {
    shard: String,
    partition: String,
    offset: Offset,
    records: Vec<T>,
    continuation: OnceLock<String>,
}

impl<T> PartitionRecordBatch<T> {
    pub fn new(shard: String, partition: String, offset: Offset, records: Vec<T>) -> Self {
        Self {
            shard,
            partition,
            offset,
            records,
            continuation: OnceLock::new(),
        }
    }

    pub fn shard(&self) -> &str {
        &self.shard
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn offset(&self) -> &Offset {
        &self.offset
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Continuation id of this batch: `"{shard}__{partition}__{offset}"` with
    /// the offset in its JSON form, computed once and memoized.
    ///
    /// Two batches with equal shard, partition, and offset produce equal ids.
    pub fn batch_id(&self) -> &str {
        self.continuation.get_or_init(|| {
            let offset =
                serde_json::to_string(&self.offset).unwrap_or_else(|_| "error".to_owned());
            format!("{}__{}__{}", self.shard, self.partition, offset)
        })
    }

    /// Id of the record at `index` within this batch.
    pub fn record_id(&self, index: usize) -> ElementId {
        ElementId::from(format!("{}__{}", self.batch_id(), index))
    }
}
