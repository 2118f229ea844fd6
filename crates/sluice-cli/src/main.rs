//! Sluice CLI
//!
//! Loads a project file, registers the built-in plugins and runs or checks
//! its pipelines.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use sluice_core::config::{LogConfig, LogFormat};
use sluice_core::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Sluice - record pipelines: inlets, flows, outlets
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project directory or configuration file
    #[arg(short, long, default_value = "sluice.yaml", env = "SLUICE_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format (defaults to the project's `log.format`)
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pipelines until their inlets finish or Ctrl+C
    Run {
        /// Run a single pipeline only
        #[arg(short, long)]
        pipeline: Option<String>,
    },

    /// Validate configuration without running
    Validate,

    /// List registered plugins
    Plugins,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn init_logging(cli: &Cli, log: &LogConfig) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level))
    };

    // stdout belongs to outlets
    let registry = tracing_subscriber::registry().with(filter);
    match cli.log_format.map_or(log.format, LogFormat::from) {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the project when it loads; commands report
    // load errors themselves
    let log = Config::load(&cli.config)
        .map(|config| config.project.log)
        .unwrap_or_default();
    init_logging(&cli, &log);

    match &cli.command {
        Commands::Run { pipeline } => {
            commands::run::run(&cli.config, pipeline.as_deref()).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config)?;
        }
        Commands::Plugins => {
            commands::plugins::run();
        }
    }

    Ok(())
}
