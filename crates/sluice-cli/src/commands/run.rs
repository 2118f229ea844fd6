//! Run pipelines

use anyhow::{Context, Result, bail};
use sluice_core::{Config, Registry};
use sluice_runtime::{Runtime, plugins};

/// Run every pipeline, or only `pipeline`, until the inlets finish or Ctrl+C
pub async fn run(config_path: &str, pipeline: Option<&str>) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;
    let mut project = config.project;
    if let Some(name) = pipeline {
        project.pipelines.retain(|p| p.name == name);
        if project.pipelines.is_empty() {
            bail!("No pipeline named '{name}'");
        }
    }

    let registry = Registry::global();
    plugins::register_all(&registry);
    let runtime = Runtime::new(&project, registry);
    runtime.check().context("Invalid pipeline configuration")?;

    tracing::info!("Starting runtime (press Ctrl+C to stop)");

    let running = runtime.run();
    tokio::pin!(running);

    tokio::select! {
        result = &mut running => {
            result.context("Runtime error")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to install Ctrl+C handler")?;
            tracing::info!("Received shutdown signal");
            runtime.shutdown().await;
            running.await.context("Runtime error")?;
        }
    }

    tracing::info!("Sluice stopped");
    Ok(())
}
