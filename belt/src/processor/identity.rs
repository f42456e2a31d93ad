use serde::Serialize;

use crate::error::BeltResult;
use crate::processor::ElementProcessor;
use crate::types::{Element, ProcessedRecord};

/// Pass-through processor: every record maps to itself, with the id taken
/// from the record when it carries one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProcessor;

impl IdentityProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl<T> ElementProcessor<T> for IdentityProcessor
where
    T: Element + Serialize + Send + Sync + 'static,
{
    async fn process_batch(&self, records: &[T]) -> BeltResult<Vec<ProcessedRecord>> {
        records
            .iter()
            .map(|record| {
                let value = serde_json::to_value(record)?;
                Ok(ProcessedRecord::record(record.element_id(), value))
            })
            .collect()
    }
}
