//! Worker tasks driving the per-shard pipeline.

mod shard;

pub use shard::ShardWorker;
