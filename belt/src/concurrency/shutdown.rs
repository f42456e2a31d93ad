//! Shutdown signaling for graceful job cancellation.
//!
//! A shutdown channel is a watch channel carrying a single boolean. Readers
//! observe it at iteration boundaries; flipping it to `true` asks every
//! reader to stop producing further batches. Producers are not signaled
//! directly: they terminate when the buffer they drain is closed.

use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
pub type ShutdownTx = watch::Sender<bool>;

/// Receiver side of the shutdown channel.
///
/// Cheap to clone; every reader chunk holds its own receiver.
pub type ShutdownRx = watch::Receiver<bool>;

/// Creates a new shutdown channel in the "running" state.
///
/// Send `true` through the transmitter to request cancellation. Cancellation
/// is not an error: tasks observing it return cleanly.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}
