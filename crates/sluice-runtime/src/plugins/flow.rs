//! Built-in stateless flows

use async_trait::async_trait;
use sluice_core::{Batch, Context, Error, Flow, Predicate, Result};

fn parallelism(ctx: &Context) -> usize {
    ctx.config().get_uint("parallelism", 1).max(1) as usize
}

/// Forwards batches unchanged
#[derive(Debug)]
pub struct Passthrough {
    parallelism: usize,
}

impl Passthrough {
    /// Build from `parallelism` (default 1)
    pub fn from_context(ctx: &Context) -> Self {
        Self {
            parallelism: parallelism(ctx),
        }
    }
}

#[async_trait]
impl Flow for Passthrough {
    fn parallelism(&self) -> usize {
        self.parallelism
    }

    async fn process(&self, batch: Batch) -> Result<Batch> {
        Ok(batch)
    }
}

/// Keeps (or with `action: drop`, removes) records matching `when`
#[derive(Debug)]
pub struct Filter {
    predicate: Predicate,
    keep: bool,
    parallelism: usize,
}

impl Filter {
    /// Filter with an explicit predicate
    pub fn new(predicate: Predicate, keep: bool) -> Self {
        Self {
            predicate,
            keep,
            parallelism: 1,
        }
    }

    /// Build from `when` (required), `action` and `parallelism`
    pub fn from_context(ctx: &Context) -> Result<Self> {
        let config = ctx.config();
        let when = config
            .get("when")
            .ok_or_else(|| Error::invalid("filter requires a 'when' predicate"))?;
        let keep = match config.get_str("action", "keep") {
            "keep" => true,
            "drop" => false,
            other => {
                return Err(Error::invalid(format!(
                    "filter action must be 'keep' or 'drop', got '{other}'"
                )));
            }
        };
        Ok(Self {
            predicate: Predicate::from_config(when)?,
            keep,
            parallelism: parallelism(ctx),
        })
    }
}

#[async_trait]
impl Flow for Filter {
    fn parallelism(&self) -> usize {
        self.parallelism
    }

    async fn process(&self, mut batch: Batch) -> Result<Batch> {
        batch.retain(|record| self.predicate.apply(record) == self.keep);
        Ok(batch)
    }
}
