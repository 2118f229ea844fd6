//! Plugin contracts
//!
//! Inlets produce batches, flows transform them, outlets deliver them. The
//! runtime wraps each in a handler that owns its lifecycle and concurrency;
//! plugin code only sees these traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::clock;
use crate::error::{Error, Result};
use crate::record::{Batch, TAG_SOURCE, TAG_TIMESTAMP};

/// Sending half of a hand-off queue between two stages
pub type BatchSender = mpsc::Sender<Batch>;

/// Receiving half of a hand-off queue between two stages
pub type BatchReceiver = mpsc::Receiver<Batch>;

/// Trait for sources
#[async_trait]
pub trait Inlet: Send {
    /// Acquire resources; called once when the inlet is built
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources; called once when the inlet finishes
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Produce data through `next`.
    ///
    /// Periodic inlets are called once per tick; push inlets are called
    /// once and keep sending until their data runs out. Return
    /// [`Error::EndOfStream`] to finish gracefully; any other error ends
    /// this inlet.
    async fn process(&mut self, next: &mut Next) -> Result<()>;
}

/// An inlet together with its scheduling mode
pub enum Source {
    /// Called on a timer
    Periodic {
        /// The wrapped inlet
        inlet: Box<dyn Inlet>,
        /// Tick period (floored at [`Source::MIN_INTERVAL`] by the handler)
        interval: Duration,
    },
    /// Called once; pushes until end of stream
    Push(Box<dyn Inlet>),
}

impl Source {
    /// Shortest tick period a periodic inlet runs at
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Wrap an inlet that is polled every `interval`
    pub fn periodic(inlet: impl Inlet + 'static, interval: Duration) -> Self {
        Self::Periodic {
            inlet: Box::new(inlet),
            interval,
        }
    }

    /// Wrap an inlet that pushes on its own schedule
    pub fn push(inlet: impl Inlet + 'static) -> Self {
        Self::Push(Box::new(inlet))
    }

    /// The tick period, for periodic sources
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Periodic { interval, .. } => Some(*interval),
            Self::Push(_) => None,
        }
    }

    /// The wrapped inlet
    pub fn inlet_mut(&mut self) -> &mut dyn Inlet {
        match self {
            Self::Periodic { inlet, .. } | Self::Push(inlet) => inlet.as_mut(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Periodic { interval, .. } => {
                f.debug_struct("Periodic").field("interval", interval).finish()
            }
            Self::Push(_) => f.write_str("Push"),
        }
    }
}

/// The callback an inlet hands its batches to.
///
/// Every batch is stamped with the inlet name ([`TAG_SOURCE`]) and one
/// capture of [`clock::now`] ([`TAG_TIMESTAMP`]) before it is forwarded.
/// Sending waits while the downstream queue is full.
#[derive(Debug)]
pub struct Next {
    source: Arc<str>,
    tx: BatchSender,
    sent: u64,
}

impl Next {
    /// Create an emitter for the named inlet
    pub fn new(source: &str, tx: BatchSender) -> Self {
        Self {
            source: Arc::from(source),
            tx,
            sent: 0,
        }
    }

    /// Name stamped into [`TAG_SOURCE`]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Stamp and forward a batch; empty batches are skipped.
    ///
    /// Fails with [`Error::HandoffClosed`] once the pipeline is stopping.
    pub async fn send(&mut self, mut batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let now = clock::now();
        for record in &mut batch {
            record.set_tag(TAG_SOURCE, &*self.source);
            record.set_tag(TAG_TIMESTAMP, now);
        }
        self.tx.send(batch).await.map_err(|_| Error::HandoffClosed)?;
        self.sent += 1;
        Ok(())
    }

    /// Number of batches forwarded so far
    pub fn batches_sent(&self) -> u64 {
        self.sent
    }
}

/// Trait for transform stages.
///
/// With `parallelism() > 1` several batches are processed at once, so
/// methods take `&self`; stateful flows keep their state behind a lock.
#[async_trait]
pub trait Flow: Send + Sync {
    /// Acquire resources; a failure aborts the pipeline run
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    /// Release resources once all queued work has drained
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Worker-pool width; 1 keeps batches in arrival order
    fn parallelism(&self) -> usize {
        1
    }

    /// Transform one batch. An empty result suppresses it.
    async fn process(&self, batch: Batch) -> Result<Batch>;
}

/// Trait for sinks
#[async_trait]
pub trait Outlet: Send {
    /// Acquire resources; a failing outlet is dropped from the pipeline
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources after the final flush
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Deliver one batch
    async fn handle(&mut self, batch: Batch) -> Result<()>;
}
