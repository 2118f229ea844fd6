//! Outlet handler

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sluice_core::{Batch, BatchReceiver, BatchSender, Context, Outlet, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::{handoff, next_batch};

/// Record counters of one outlet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutletStats {
    /// Records taken off the inbound queue
    pub received: u64,
    /// Records the outlet accepted without error
    pub flushed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    flushed: AtomicU64,
}

/// Drives an [`Outlet`] from its inbound queue.
///
/// Every received batch is handed to the outlet straight away; batching
/// across receives is left to flows upstream. Stopping drains what is
/// already queued first.
pub struct OutletHandler {
    ctx: Context,
    outlet: Mutex<Option<Box<dyn Outlet>>>,
    tx: BatchSender,
    rx: Mutex<Option<BatchReceiver>>,
    counters: Arc<Counters>,
    token: CancellationToken,
    tracker: TaskTracker,
    stopped: AtomicBool,
}

impl OutletHandler {
    /// Wrap an outlet; it is opened by [`OutletHandler::start`]
    pub fn new(ctx: Context, outlet: Box<dyn Outlet>) -> Self {
        let (tx, rx) = handoff();
        Self {
            ctx,
            outlet: Mutex::new(Some(outlet)),
            tx,
            rx: Mutex::new(Some(rx)),
            counters: Arc::new(Counters::default()),
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Instance name
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// A sender into this outlet's inbound queue
    pub fn sender(&self) -> BatchSender {
        self.tx.clone()
    }

    /// Snapshot of the record counters
    pub fn stats(&self) -> OutletStats {
        OutletStats {
            received: self.counters.received.load(Ordering::Relaxed),
            flushed: self.counters.flushed.load(Ordering::Relaxed),
        }
    }

    /// Open the outlet and spawn its worker. Starting twice is a no-op.
    pub async fn start(&self) -> Result<()> {
        let Some(mut outlet) = self.outlet.lock().unwrap_or_else(PoisonError::into_inner).take()
        else {
            return Ok(());
        };
        let Some(mut rx) = self.rx.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(());
        };
        outlet.open().await?;

        let counters = Arc::clone(&self.counters);
        let token = self.token.clone();
        self.tracker.spawn(
            async move {
                while let Some(batch) = next_batch(&mut rx, &token).await {
                    counters.received.fetch_add(batch.len() as u64, Ordering::Relaxed);
                    flush(outlet.as_mut(), batch, &counters).await;
                }
                if let Err(e) = outlet.close().await {
                    tracing::warn!(error = %e, "Outlet failed to close");
                }
                tracing::info!(
                    received = counters.received.load(Ordering::Relaxed),
                    flushed = counters.flushed.load(Ordering::Relaxed),
                    "Outlet stopped"
                );
            }
            .instrument(self.ctx.span().clone()),
        );
        self.tracker.close();

        tracing::debug!(parent: self.ctx.span(), "Outlet started");
        Ok(())
    }

    /// Flush what is queued, then close the outlet. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn flush(outlet: &mut dyn Outlet, batch: Batch, counters: &Counters) {
    let n = batch.len() as u64;
    match outlet.handle(batch).await {
        Ok(()) => {
            counters.flushed.fetch_add(n, Ordering::Relaxed);
        }
        Err(e) => tracing::error!(error = %e, records = n, "Outlet failed, batch dropped"),
    }
}
