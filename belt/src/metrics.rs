use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER_METRICS: Once = Once::new();

pub const BELT_BATCHES_READ_TOTAL: &str = "belt_batches_read_total";
pub const BELT_RECORDS_READ_TOTAL: &str = "belt_records_read_total";
pub const BELT_RECORDS_WRITTEN_TOTAL: &str = "belt_records_written_total";
pub const BELT_READ_BATCH_SIZE: &str = "belt_read_batch_size";
pub const BELT_BATCH_TRANSFORM_DURATION_SECONDS: &str = "belt_batch_transform_duration_seconds";

/// Label key for shard id.
pub const SHARD_LABEL: &str = "shard";
/// Label key for record outcome ("success" or "error").
pub const OUTCOME_LABEL: &str = "outcome";

/// Registers metrics emitted by the engine. Called before starting a job;
/// safe to call multiple times, registration happens only once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_counter!(
            BELT_BATCHES_READ_TOTAL,
            Unit::Count,
            "Total number of record batches drawn from source partitions"
        );

        describe_counter!(
            BELT_RECORDS_READ_TOTAL,
            Unit::Count,
            "Total number of records drawn from source partitions"
        );

        describe_counter!(
            BELT_RECORDS_WRITTEN_TOTAL,
            Unit::Count,
            "Total number of processed records routed to sinks, by outcome"
        );

        describe_histogram!(
            BELT_READ_BATCH_SIZE,
            Unit::Count,
            "Number of records in a batch drawn from a source partition"
        );

        describe_histogram!(
            BELT_BATCH_TRANSFORM_DURATION_SECONDS,
            Unit::Seconds,
            "Time taken to transform one batch and route it to the sink"
        );
    });
}
