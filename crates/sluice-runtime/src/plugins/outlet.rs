//! Built-in outlets

use async_trait::async_trait;
use sluice_core::{Batch, Context, Outlet, Result};
use tokio::io::AsyncWriteExt;

/// Writes one line per record to standard output
#[derive(Debug, Default)]
pub struct Stdout;

#[async_trait]
impl Outlet for Stdout {
    async fn handle(&mut self, batch: Batch) -> Result<()> {
        let mut lines = String::new();
        for record in &batch {
            lines.push_str(&record.to_string());
            lines.push('\n');
        }
        let mut out = tokio::io::stdout();
        out.write_all(lines.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Emits one `tracing` event per record
#[derive(Debug)]
pub struct LogOutlet {
    outlet: String,
}

impl LogOutlet {
    /// Events carry the outlet's instance name
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            outlet: ctx.name().to_string(),
        }
    }
}

#[async_trait]
impl Outlet for LogOutlet {
    async fn handle(&mut self, batch: Batch) -> Result<()> {
        for record in &batch {
            tracing::info!(outlet = %self.outlet, record = %record, "Record");
        }
        Ok(())
    }
}
