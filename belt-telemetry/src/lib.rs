//! Telemetry initialization for belt binaries and tests.

pub mod tracing;
