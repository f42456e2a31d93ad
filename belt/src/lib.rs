pub mod chunks;
pub mod concurrency;
pub mod error;
pub mod executor;
mod macros;
pub mod metrics;
pub mod processor;
pub mod progress;
pub mod sink;
pub mod source;
pub mod types;
pub mod workers;
