//! Error types for sluice-core

use thiserror::Error;

/// Result type alias for sluice-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sluice-core and in plugin code
#[derive(Error, Debug)]
pub enum Error {
    /// The inlet has no more data. Not a failure: it drives the graceful
    /// shutdown of that one inlet.
    #[error("end of stream")]
    EndOfStream,

    /// The downstream hand-off queue has been closed (pipeline stopping)
    #[error("hand-off queue closed")]
    HandoffClosed,

    /// A plugin failed to open, process or close
    #[error("plugin '{plugin}': {message}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Description of the failure
        message: String,
    },

    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Failed to parse YAML configuration
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of what's invalid
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Plugin`] failure
    pub fn plugin(plugin: impl Into<String>, message: impl ToString) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a [`Error::ConfigInvalid`] failure
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Whether this is the end-of-stream sentinel
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Whether this error means the downstream queue went away
    pub fn is_handoff_closed(&self) -> bool {
        matches!(self, Self::HandoffClosed)
    }
}
