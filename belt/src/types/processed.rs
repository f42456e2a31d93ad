use crate::error::BeltError;
use crate::types::ElementId;

/// Outcome of transforming one record: the sink-bound unit.
#[derive(Debug)]
pub struct ProcessedRecord {
    /// Id inherited from the input record or the transform response. When
    /// absent, the producer synthesizes one from the batch continuation.
    pub id: Option<ElementId>,
    pub payload: ProcessedPayload,
}

/// Either a transformed record ready for sink encoding or a per-record
/// failure. Routing to the sink is exclusive: a record is appended or
/// appended-as-error, never both.
#[derive(Debug)]
pub enum ProcessedPayload {
    Record(serde_json::Value),
    Failed(BeltError),
}

impl ProcessedRecord {
    pub fn record(id: Option<ElementId>, record: serde_json::Value) -> Self {
        Self {
            id,
            payload: ProcessedPayload::Record(record),
        }
    }

    pub fn failed(id: Option<ElementId>, error: BeltError) -> Self {
        Self {
            id,
            payload: ProcessedPayload::Failed(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.payload, ProcessedPayload::Failed(_))
    }
}
