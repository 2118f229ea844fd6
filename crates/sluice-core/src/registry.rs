//! Plugin registry
//!
//! Plugins register a factory under a name per kind; pipelines look the
//! factory up when they are built and call it with the component's
//! [`Context`]. The process-wide instance is [`Registry::global`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::context::{ComponentKind, Context};
use crate::error::Result;
use crate::plugin::{Flow, Outlet, Source};

/// Builds an inlet (with its scheduling mode) from a context
pub type InletFactory = Arc<dyn Fn(&Context) -> Result<Source> + Send + Sync>;

/// Builds a flow from a context
pub type FlowFactory = Arc<dyn Fn(&Context) -> Result<Box<dyn Flow>> + Send + Sync>;

/// Builds an outlet from a context
pub type OutletFactory = Arc<dyn Fn(&Context) -> Result<Box<dyn Outlet>> + Send + Sync>;

static GLOBAL: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// Factories of one component kind, keyed by plugin name
pub struct Factories<F> {
    kind: ComponentKind,
    entries: RwLock<HashMap<String, F>>,
}

impl<F: Clone> Factories<F> {
    fn new(kind: ComponentKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Add a factory. Returns `false` and leaves the existing entry alone
    /// if the name is taken.
    pub fn register(&self, name: &str, factory: F) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            tracing::warn!(kind = %self.kind, plugin = %name, "Plugin already registered");
            return false;
        }
        entries.insert(name.to_string(), factory);
        tracing::debug!(kind = %self.kind, plugin = %name, "Registered plugin");
        true
    }

    /// Remove a factory; returns whether it was present
    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(name).is_some()
    }

    /// Find a factory by plugin name
    pub fn lookup(&self, name: &str) -> Option<F> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(name).cloned()
    }

    /// Whether a plugin of this name is registered
    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(name)
    }

    /// Registered plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Inlet, flow and outlet factories
pub struct Registry {
    /// Inlet factories
    pub inlets: Factories<InletFactory>,
    /// Flow factories
    pub flows: Factories<FlowFactory>,
    /// Outlet factories
    pub outlets: Factories<OutletFactory>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            inlets: Factories::new(ComponentKind::Inlet),
            flows: Factories::new(ComponentKind::Flow),
            outlets: Factories::new(ComponentKind::Outlet),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<Registry> {
        Arc::clone(&GLOBAL)
    }

    /// Register an inlet factory
    pub fn register_inlet<F>(&self, name: &str, factory: F) -> bool
    where
        F: Fn(&Context) -> Result<Source> + Send + Sync + 'static,
    {
        self.inlets.register(name, Arc::new(factory))
    }

    /// Register a flow factory
    pub fn register_flow<F>(&self, name: &str, factory: F) -> bool
    where
        F: Fn(&Context) -> Result<Box<dyn Flow>> + Send + Sync + 'static,
    {
        self.flows.register(name, Arc::new(factory))
    }

    /// Register an outlet factory
    pub fn register_outlet<F>(&self, name: &str, factory: F) -> bool
    where
        F: Fn(&Context) -> Result<Box<dyn Outlet>> + Send + Sync + 'static,
    {
        self.outlets.register(name, Arc::new(factory))
    }
}
