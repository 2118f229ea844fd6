//! Concurrency wrappers around plugins
//!
//! Each handler owns one plugin, the inbound hand-off queue feeding it and
//! the task(s) driving it. Queues hold a single batch, so a slow consumer
//! blocks its producer and back-pressure reaches all the way to the inlets.
//!
//! Stopping is cooperative: the handler's cancellation token is the signal,
//! after which a worker closes its queue, drains what is already queued and
//! releases the plugin.

use sluice_core::{Batch, BatchReceiver, BatchSender};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod flow;
mod inlet;
mod outlet;

pub use flow::FlowHandler;
pub use inlet::InletHandler;
pub use outlet::{OutletHandler, OutletStats};

/// Batches a hand-off queue holds before the sender waits
pub const HANDOFF_CAPACITY: usize = 1;

pub(crate) fn handoff() -> (BatchSender, BatchReceiver) {
    mpsc::channel(HANDOFF_CAPACITY)
}

/// Next queued batch, or `None` once the queue is closed and drained.
///
/// Cancellation closes the queue; batches already in it are still returned.
pub(crate) async fn next_batch(
    rx: &mut BatchReceiver,
    token: &CancellationToken,
) -> Option<Batch> {
    tokio::select! {
        biased;
        batch = rx.recv() => batch,
        _ = token.cancelled() => {
            rx.close();
            rx.recv().await
        }
    }
}
