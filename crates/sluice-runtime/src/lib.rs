//! Sluice Runtime
//!
//! This crate provides the execution runtime for Sluice pipelines.
//!
//! # Features
//!
//! - Inlet, flow and outlet handlers with bounded hand-off queues
//! - Pipeline assembly, lifecycle and graceful stop
//! - A small set of built-in plugins
//!
//! # Usage
//!
//! ```rust,ignore
//! use sluice_core::{Config, Registry};
//! use sluice_runtime::{Runtime, plugins};
//!
//! let registry = Registry::global();
//! plugins::register_all(&registry);
//!
//! let config = Config::load("./sluice.yaml")?;
//! let runtime = Runtime::new(&config.project, registry);
//! runtime.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod handler;
pub mod pipeline;
pub mod plugins;

pub use engine::Runtime;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineState};
