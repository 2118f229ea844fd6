//! Runtime error types
//!
//! Only setup failures surface as errors. Once a pipeline is running, plugin
//! failures are logged by the handlers and never cross a stage boundary.

use sluice_core::ComponentKind;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or starting a pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// No factory is registered under the configured plugin name
    #[error("unknown {kind} plugin '{name}'")]
    UnknownPlugin {
        /// Component kind that was looked up
        kind: ComponentKind,
        /// Plugin name from the configuration
        name: String,
    },

    /// A plugin factory rejected its configuration
    #[error("failed to create {component}: {source}")]
    Create {
        /// Component description, e.g. `flow 'merge'`
        component: String,
        /// Underlying error
        source: sluice_core::Error,
    },

    /// A plugin failed to open
    #[error("failed to open {component}: {source}")]
    Open {
        /// Component description, e.g. `inlet 'seed'`
        component: String,
        /// Underlying error
        source: sluice_core::Error,
    },

    /// The pipeline declares no inlets
    #[error("pipeline '{pipeline}' has no inlets")]
    NoInlets {
        /// Pipeline name
        pipeline: String,
    },

    /// The pipeline has no outlet that opened successfully
    #[error("pipeline '{pipeline}' has no usable outlets")]
    NoOutlets {
        /// Pipeline name
        pipeline: String,
    },

    /// Configuration or other core error
    #[error(transparent)]
    Config(#[from] sluice_core::Error),

    /// `run` was called on a pipeline that already ran or was stopped
    #[error("pipeline '{pipeline}' has already been run")]
    AlreadyRunning {
        /// Pipeline name
        pipeline: String,
    },
}

impl Error {
    pub(crate) fn create(kind: ComponentKind, name: &str, source: sluice_core::Error) -> Self {
        Self::Create {
            component: format!("{kind} '{name}'"),
            source,
        }
    }

    pub(crate) fn open(kind: ComponentKind, name: &str, source: sluice_core::Error) -> Self {
        Self::Open {
            component: format!("{kind} '{name}'"),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UnknownPlugin {
            kind: ComponentKind::Outlet,
            name: "kafka".into(),
        };
        assert_eq!(err.to_string(), "unknown outlet plugin 'kafka'");

        let err = Error::open(
            ComponentKind::Inlet,
            "seed",
            sluice_core::Error::plugin("static", "boom"),
        );
        assert_eq!(err.to_string(), "failed to open inlet 'seed': plugin 'static': boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
