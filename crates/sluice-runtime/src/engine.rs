//! Runtime engine for executing pipelines

use std::sync::Arc;

use futures::future::join_all;
use sluice_core::{ProjectConfig, Registry};

use crate::error::Result;
use crate::pipeline::Pipeline;

/// Runs every pipeline of a project side by side
pub struct Runtime {
    pipelines: Vec<Arc<Pipeline>>,
}

impl Runtime {
    /// Create a runtime for the project's pipelines
    pub fn new(project: &ProjectConfig, registry: Arc<Registry>) -> Self {
        let pipelines = project
            .pipelines
            .iter()
            .map(|config| {
                Arc::new(Pipeline::new(
                    config.clone(),
                    &project.defaults,
                    Arc::clone(&registry),
                ))
            })
            .collect();
        Self { pipelines }
    }

    /// Pipelines managed by this runtime
    pub fn pipelines(&self) -> &[Arc<Pipeline>] {
        &self.pipelines
    }

    /// Find a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.iter().find(|p| p.name() == name)
    }

    /// Check every pipeline's plugins and topology without starting anything
    pub fn check(&self) -> Result<()> {
        self.pipelines.iter().try_for_each(|p| p.check())
    }

    /// Run all pipelines until each has finished or been stopped.
    ///
    /// A failing pipeline does not affect the others; the first failure is
    /// returned once all of them are done.
    pub async fn run(&self) -> Result<()> {
        tracing::info!(pipelines = self.pipelines.len(), "Starting Sluice runtime");

        let results = join_all(self.pipelines.iter().map(|p| p.run())).await;

        let mut first = None;
        for (pipeline, result) in self.pipelines.iter().zip(results) {
            if let Err(e) = result {
                tracing::error!(pipeline = %pipeline.name(), error = %e, "Pipeline failed");
                first.get_or_insert(e);
            }
        }

        tracing::info!("Runtime finished");
        first.map_or(Ok(()), Err)
    }

    /// Gracefully shutdown the runtime
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down Sluice runtime");
        join_all(self.pipelines.iter().map(|p| p.stop())).await;
        tracing::info!("Runtime shutdown complete");
    }
}
