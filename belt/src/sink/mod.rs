//! Sink writers: the destination side of the pipeline.
//!
//! Each producer task owns exactly one writer for its lifetime and closes it
//! on every exit path. Successful records and per-record failures are routed
//! exclusively to [`SinkWriter::append`] or [`SinkWriter::append_error`].

mod fs;
mod memory;

pub use fs::{FsSinkWriter, FsSinkWriterFactory, JsonEncoder, RecordEncoder, SinkLine};
pub use memory::{MemorySink, MemorySinkWriter, SinkFailure, SinkRecord};

use std::future::Future;

use crate::error::{BeltError, BeltResult};
use crate::types::ElementId;

/// Destination for processed records.
pub trait SinkWriter: Send + 'static {
    /// Writes a successful record.
    fn append(
        &mut self,
        id: &ElementId,
        record: &serde_json::Value,
    ) -> impl Future<Output = BeltResult<()>> + Send;

    /// Writes a per-record failure.
    fn append_error(
        &mut self,
        id: &ElementId,
        error: &BeltError,
    ) -> impl Future<Output = BeltResult<()>> + Send;

    /// Flushes and releases underlying resources. Consuming the writer makes
    /// double-closing unrepresentable.
    fn close(self) -> impl Future<Output = BeltResult<()>> + Send;
}

/// Creates one [`SinkWriter`] per producer task.
pub trait SinkWriterFactory: Clone + Send + Sync + 'static {
    type Writer: SinkWriter;

    fn create(&self, producer_name: &str) -> impl Future<Output = BeltResult<Self::Writer>> + Send;
}
