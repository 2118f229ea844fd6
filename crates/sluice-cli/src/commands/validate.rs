//! Validate configuration command

use anyhow::{Context, Result};
use sluice_core::{Config, Registry};
use sluice_runtime::{Runtime, plugins};

/// Load the project and check every pipeline against the registered plugins
pub fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;

    let registry = Registry::global();
    plugins::register_all(&registry);
    let runtime = Runtime::new(&config.project, registry);
    runtime.check().context("Invalid pipeline configuration")?;

    for pipeline in &config.project.pipelines {
        tracing::info!(
            "✓ Pipeline '{}': {} inlet(s), {} flow(s), {} outlet(s)",
            pipeline.name,
            pipeline.inlets.len(),
            pipeline.flows.len(),
            pipeline.outlets.len()
        );
    }

    tracing::info!("✓ Configuration is valid");
    Ok(())
}
