//! Flow handler: one stage of the transform chain

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sluice_core::{
    Batch, BatchReceiver, BatchSender, ComponentKind, ConfigMap, Context, Flow, Result,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::{handoff, next_batch};

/// Runs a [`Flow`] between an inbound queue and the next stage's queue.
///
/// With a parallelism of 1 batches are processed one at a time in arrival
/// order. Wider flows get a semaphore-bounded pool with one task per batch,
/// so results may leave out of order.
pub struct FlowHandler {
    ctx: Context,
    flow: Arc<dyn Flow>,
    tx: BatchSender,
    rx: Mutex<Option<BatchReceiver>>,
    downstream: Option<BatchSender>,
    token: CancellationToken,
    tracker: TaskTracker,
    stopped: AtomicBool,
}

impl FlowHandler {
    /// Wrap a flow; it is opened by [`FlowHandler::start`]
    pub fn new(ctx: Context, flow: Box<dyn Flow>) -> Self {
        let (tx, rx) = handoff();
        Self {
            ctx,
            flow: Arc::from(flow),
            tx,
            rx: Mutex::new(Some(rx)),
            downstream: None,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Merge point every inlet feeds into
    pub fn fan_in(parent: &Context) -> Self {
        let ctx = parent.derive(ComponentKind::Flow, "fan-in", &ConfigMap::new());
        Self::new(ctx, Box::new(FanIn))
    }

    /// Terminal stage copying each batch to every outlet queue
    pub fn fan_out(parent: &Context, outlets: Vec<BatchSender>) -> Self {
        let ctx = parent.derive(ComponentKind::Flow, "fan-out", &ConfigMap::new());
        Self::new(ctx, Box::new(FanOut { outlets }))
    }

    /// Instance name
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// A sender into this stage's inbound queue
    pub fn sender(&self) -> BatchSender {
        self.tx.clone()
    }

    /// Feed this stage's output into `tx`, usually the next stage's sender
    pub fn set_downstream(&mut self, tx: BatchSender) {
        self.downstream = Some(tx);
    }

    /// Open the flow and spawn its worker. Starting twice is a no-op.
    pub async fn start(&self) -> Result<()> {
        let Some(rx) = self.rx.lock().unwrap_or_else(PoisonError::into_inner).take() else {
            return Ok(());
        };
        self.flow.open().await?;

        let width = self.flow.parallelism().max(1);
        let flow = Arc::clone(&self.flow);
        let downstream = self.downstream.clone();
        let token = self.token.clone();
        self.tracker.spawn(
            async move {
                if width == 1 {
                    run_serial(flow.as_ref(), rx, downstream, token).await;
                } else {
                    run_pooled(&flow, rx, downstream, width, token).await;
                }
                if let Err(e) = flow.close().await {
                    tracing::warn!(error = %e, "Flow failed to close");
                }
                tracing::info!("Flow stopped");
            }
            .instrument(self.ctx.span().clone()),
        );
        self.tracker.close();

        tracing::debug!(parent: self.ctx.span(), parallelism = width, "Flow started");
        Ok(())
    }

    /// Close the inbound queue and wait for queued and in-flight batches to
    /// drain. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_serial(
    flow: &dyn Flow,
    mut rx: BatchReceiver,
    downstream: Option<BatchSender>,
    token: CancellationToken,
) {
    while let Some(batch) = next_batch(&mut rx, &token).await {
        forward(flow, downstream.as_ref(), batch).await;
    }
}

async fn run_pooled(
    flow: &Arc<dyn Flow>,
    mut rx: BatchReceiver,
    downstream: Option<BatchSender>,
    width: usize,
    token: CancellationToken,
) {
    let permits = Arc::new(Semaphore::new(width));
    let pool = TaskTracker::new();

    while let Some(batch) = next_batch(&mut rx, &token).await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let flow = Arc::clone(flow);
        let downstream = downstream.clone();
        pool.spawn(
            async move {
                forward(flow.as_ref(), downstream.as_ref(), batch).await;
                drop(permit);
            }
            .in_current_span(),
        );
    }

    pool.close();
    pool.wait().await;
    permits.close();
}

async fn forward(flow: &dyn Flow, downstream: Option<&BatchSender>, batch: Batch) {
    let out = match flow.process(batch).await {
        Ok(out) => out,
        Err(e) => {
            tracing::error!(error = %e, "Flow failed, batch dropped");
            return;
        }
    };
    if out.is_empty() {
        return;
    }
    let Some(tx) = downstream else {
        return;
    };
    if tx.send(out).await.is_err() {
        tracing::warn!("Downstream queue closed, batch dropped");
    }
}

struct FanIn;

#[async_trait]
impl Flow for FanIn {
    async fn process(&self, batch: Batch) -> Result<Batch> {
        Ok(batch)
    }
}

struct FanOut {
    outlets: Vec<BatchSender>,
}

#[async_trait]
impl Flow for FanOut {
    async fn process(&self, batch: Batch) -> Result<Batch> {
        let Some((last, rest)) = self.outlets.split_last() else {
            return Ok(Vec::new());
        };
        for tx in rest {
            if tx.send(batch.clone()).await.is_err() {
                tracing::debug!("Outlet queue closed");
            }
        }
        if last.send(batch).await.is_err() {
            tracing::debug!("Outlet queue closed");
        }
        Ok(Vec::new())
    }
}
