//! Inlet handler: scheduling, tagging and panic supervision for sources

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::FutureExt;
use sluice_core::{BatchSender, Context, Inlet, Next, Result, Source};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::FlowHandler;

/// Drives one [`Source`] and its private flow chain.
///
/// The inlet is opened when the handler is created. Periodic sources are
/// polled once per tick, never concurrently; push sources get a single
/// `process` call that runs until end of stream or stop.
pub struct InletHandler {
    ctx: Context,
    source: Mutex<Option<Source>>,
    flows: Vec<FlowHandler>,
    downstream: Option<BatchSender>,
    token: CancellationToken,
    tracker: TaskTracker,
    stopped: AtomicBool,
}

impl InletHandler {
    /// Open the inlet and wrap it. `flows` run on this inlet's batches only,
    /// before they reach the shared chain.
    pub async fn new(ctx: Context, mut source: Source, flows: Vec<FlowHandler>) -> Result<Self> {
        source.inlet_mut().open().await?;
        tracing::debug!(parent: ctx.span(), mode = ?source, "Inlet opened");
        Ok(Self {
            ctx,
            source: Mutex::new(Some(source)),
            flows,
            downstream: None,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            stopped: AtomicBool::new(false),
        })
    }

    /// Instance name
    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Send this inlet's output (after its private flows) into `tx`
    pub fn via(&mut self, tx: BatchSender) {
        let senders: Vec<BatchSender> = self.flows.iter().map(FlowHandler::sender).collect();
        for (i, flow) in self.flows.iter_mut().enumerate() {
            let next = senders.get(i + 1).cloned().unwrap_or_else(|| tx.clone());
            flow.set_downstream(next);
        }
        self.downstream = Some(senders.first().cloned().unwrap_or(tx));
    }

    /// Start the private flows, then spawn the inlet loop. Starting twice is
    /// a no-op.
    pub async fn start(&self) -> Result<()> {
        for flow in &self.flows {
            flow.start().await?;
        }
        let Some(source) = self.source.lock().unwrap_or_else(PoisonError::into_inner).take()
        else {
            return Ok(());
        };
        let Some(tx) = self.downstream.clone() else {
            tracing::warn!(parent: self.ctx.span(), "Inlet has no downstream, not started");
            self.source.lock().unwrap_or_else(PoisonError::into_inner).replace(source);
            return Ok(());
        };

        let next = Next::new(self.ctx.name(), tx);
        let token = self.token.clone();
        self.tracker
            .spawn(drive(source, next, token).instrument(self.ctx.span().clone()));
        self.tracker.close();

        tracing::debug!(parent: self.ctx.span(), "Inlet started");
        Ok(())
    }

    /// Wait for the inlet loop to finish on its own or through [`stop`](Self::stop)
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Stop polling, then stop the private flows in order. Idempotent.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;

        // never started: the inlet was opened at creation and still needs closing
        let idle = self.source.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut source) = idle {
            close(source.inlet_mut()).instrument(self.ctx.span().clone()).await;
        }

        for flow in &self.flows {
            flow.stop().await;
        }
        tracing::info!(parent: self.ctx.span(), "Inlet stopped");
    }
}

async fn drive(mut source: Source, mut next: Next, token: CancellationToken) {
    match &mut source {
        Source::Periodic { inlet, interval } => {
            run_periodic(inlet.as_mut(), *interval, &mut next, &token).await;
        }
        Source::Push(inlet) => run_push(inlet.as_mut(), &mut next, &token).await,
    }
    close(source.inlet_mut()).await;
    tracing::debug!(batches = next.batches_sent(), "Inlet finished");
}

async fn run_periodic(
    inlet: &mut dyn Inlet,
    interval: std::time::Duration,
    next: &mut Next,
    token: &CancellationToken,
) {
    let period = interval.max(Source::MIN_INTERVAL);
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let step = AssertUnwindSafe(inlet.process(next)).catch_unwind().await;
        match step {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                finish(&e);
                break;
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                if is_shutdown_race(&message) {
                    tracing::warn!(panic = %message, "Inlet panicked while the pipeline was stopping");
                    break;
                }
                tracing::error!(panic = %message, "Inlet panicked");
            }
        }
    }
}

async fn run_push(inlet: &mut dyn Inlet, next: &mut Next, token: &CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        result = inlet.process(next) => match result {
            Ok(()) => tracing::debug!("Inlet returned, treating as end of stream"),
            Err(e) => finish(&e),
        }
    }
}

fn finish(e: &sluice_core::Error) {
    if e.is_end_of_stream() {
        tracing::info!("Inlet reached end of stream");
    } else if e.is_handoff_closed() {
        tracing::debug!("Downstream closed");
    } else {
        tracing::error!(error = %e, "Inlet failed");
    }
}

async fn close(inlet: &mut dyn Inlet) {
    if let Err(e) = inlet.close().await {
        tracing::warn!(error = %e, "Inlet failed to close");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn is_shutdown_race(message: &str) -> bool {
    message.contains("closed channel") || message.contains("channel closed")
}
