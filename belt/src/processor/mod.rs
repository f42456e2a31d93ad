//! Per-batch record transformation.
//!
//! A processor turns a batch of source records into sink-bound
//! [`ProcessedRecord`]s. A batch-level error marks every record in the batch
//! failed; partial failures travel inside the returned records instead.

mod http;
mod identity;

pub use http::{HttpPostProcessor, RequestPayloadFn, json_request_payload};
pub use identity::IdentityProcessor;

use std::future::Future;

use crate::error::BeltResult;
use crate::types::ProcessedRecord;

/// Transforms record batches on behalf of the shard producers.
pub trait ElementProcessor<T: Send + Sync + 'static>: Send + Sync + 'static {
    /// Transforms one batch. An empty input yields an empty output and no
    /// error. A returned `Err` means the entire batch failed to transform.
    fn process_batch(
        &self,
        records: &[T],
    ) -> impl Future<Output = BeltResult<Vec<ProcessedRecord>>> + Send;

    /// Single-shot convenience over [`Self::process_batch`].
    fn process(
        &self,
        record: &T,
    ) -> impl Future<Output = BeltResult<Option<ProcessedRecord>>> + Send {
        async move {
            let outputs = self.process_batch(std::slice::from_ref(record)).await?;
            Ok(outputs.into_iter().next())
        }
    }
}
