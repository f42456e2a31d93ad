use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{BeltError, BeltResult};
use crate::sink::{SinkWriter, SinkWriterFactory};
use crate::types::ElementId;

/// Record captured by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub producer: String,
    pub id: ElementId,
    pub record: serde_json::Value,
}

/// Per-record failure captured by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct SinkFailure {
    pub producer: String,
    pub id: ElementId,
    pub error: String,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<SinkRecord>,
    failures: Vec<SinkFailure>,
}

/// In-memory capturing sink for tests and development wiring.
///
/// The factory and every writer it creates share one store, so the captured
/// output of all producers can be inspected after a job finishes.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record appended so far.
    pub async fn records(&self) -> Vec<SinkRecord> {
        let inner = self.inner.lock().await;
        inner.records.clone()
    }

    /// Returns a copy of every per-record failure appended so far.
    pub async fn failures(&self) -> Vec<SinkFailure> {
        let inner = self.inner.lock().await;
        inner.failures.clone()
    }

    /// Clears all captured output, for reuse between test cases.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
        inner.failures.clear();
    }
}

impl SinkWriterFactory for MemorySink {
    type Writer = MemorySinkWriter;

    async fn create(&self, producer_name: &str) -> BeltResult<MemorySinkWriter> {
        Ok(MemorySinkWriter {
            producer: producer_name.to_owned(),
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Writer half of a [`MemorySink`], scoped to one producer.
#[derive(Debug)]
pub struct MemorySinkWriter {
    producer: String,
    inner: Arc<Mutex<Inner>>,
}

impl SinkWriter for MemorySinkWriter {
    async fn append(&mut self, id: &ElementId, record: &serde_json::Value) -> BeltResult<()> {
        let mut inner = self.inner.lock().await;
        inner.records.push(SinkRecord {
            producer: self.producer.clone(),
            id: id.clone(),
            record: record.clone(),
        });
        Ok(())
    }

    async fn append_error(&mut self, id: &ElementId, error: &BeltError) -> BeltResult<()> {
        let mut inner = self.inner.lock().await;
        inner.failures.push(SinkFailure {
            producer: self.producer.clone(),
            id: id.clone(),
            error: error.to_string(),
        });
        Ok(())
    }

    async fn close(self) -> BeltResult<()> {
        Ok(())
    }
}
