//! Sluice Core Library
//!
//! This crate provides the data model and plugin contracts for Sluice:
//! - Typed values and tagged records
//! - Predicates and key-ordered tables
//! - Project configuration (YAML)
//! - Inlet, flow and outlet traits plus the plugin registry
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Inlets    │────▶│    Flows    │────▶│   Outlets   │
//! │  (sources)  │     │ (transform) │     │   (sinks)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sluice_core::{Config, Registry};
//!
//! let config = Config::load("./sluice.yaml")?;
//! for pipeline in &config.project.pipelines {
//!     println!("Pipeline: {}", pipeline.name);
//! }
//! println!("Inlets: {:?}", Registry::global().inlets.names());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod plugin;
pub mod predicate;
pub mod record;
pub mod registry;
pub mod table;
pub mod value;

pub use config::{
    ComponentConfig, Config, ConfigMap, ConfigValue, InletConfig, PipelineConfig, ProjectConfig,
};
pub use context::{ComponentKind, Context};
pub use error::{Error, Result};
pub use plugin::{BatchReceiver, BatchSender, Flow, Inlet, Next, Outlet, Source};
pub use predicate::{Comparator, Predicate};
pub use record::{Batch, Field, FieldLookup, Record, TAG_SOURCE, TAG_TIMESTAMP};
pub use registry::Registry;
pub use table::{Column, Table};
pub use value::{Value, ValueType};
