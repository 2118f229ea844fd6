//! Per-component context
//!
//! A [`Context`] bundles a component's merged parameters, its tracing span
//! and the name of the pipeline that owns it. Contexts are cheap to clone
//! and never mutated; [`Context::derive`] and [`Context::with_param`] return
//! new contexts with overrides applied.

use std::fmt;
use std::sync::Arc;

use tracing::Span;

use crate::config::{ConfigMap, ConfigValue};

/// What part of a pipeline a context belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// The pipeline itself
    Pipeline,
    /// A source
    Inlet,
    /// A transform stage
    Flow,
    /// A sink
    Outlet,
}

impl ComponentKind {
    /// Lower-case name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Inlet => "inlet",
            Self::Flow => "flow",
            Self::Outlet => "outlet",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration, logger and owner of one component
#[derive(Debug, Clone)]
pub struct Context {
    pipeline: Arc<str>,
    kind: ComponentKind,
    name: Arc<str>,
    config: Arc<ConfigMap>,
    span: Span,
}

impl Context {
    /// Root context for a pipeline, holding its defaults
    pub fn new(pipeline: &str, defaults: ConfigMap) -> Self {
        Self {
            pipeline: Arc::from(pipeline),
            kind: ComponentKind::Pipeline,
            name: Arc::from(pipeline),
            config: Arc::new(defaults),
            span: tracing::info_span!("pipeline", pipeline = %pipeline),
        }
    }

    /// Child context for a component; `params` override the inherited config
    pub fn derive(&self, kind: ComponentKind, name: &str, params: &ConfigMap) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            kind,
            name: Arc::from(name),
            config: Arc::new(self.config.merged(params)),
            span: tracing::info_span!(parent: &self.span, "component", kind = %kind, name = %name),
        }
    }

    /// Same context with one parameter overridden
    pub fn with_param(&self, key: &str, value: impl Into<ConfigValue>) -> Self {
        let mut config = (*self.config).clone();
        config.insert(key, value);
        Self {
            config: Arc::new(config),
            ..self.clone()
        }
    }

    /// Owning pipeline's name
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    /// Component kind
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Component instance name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Merged parameters
    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// Span to instrument the component's work with
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_merges_config() {
        let root = Context::new("p", ConfigMap::new().with("a", 1i64).with("b", 2i64));
        let child = root.derive(ComponentKind::Flow, "f", &ConfigMap::new().with("b", 20i64));

        assert_eq!(child.pipeline(), "p");
        assert_eq!(child.name(), "f");
        assert_eq!(child.kind(), ComponentKind::Flow);
        assert_eq!(child.config().get_int("a", 0), 1);
        assert_eq!(child.config().get_int("b", 0), 20);
        assert_eq!(root.config().get_int("b", 0), 2);
    }

    #[test]
    fn test_with_param_leaves_original() {
        let ctx = Context::new("p", ConfigMap::new());
        let derived = ctx.with_param("limit", 3i64);
        assert_eq!(derived.config().get_int("limit", 0), 3);
        assert!(!ctx.config().contains_key("limit"));
        assert_eq!(derived.name(), "p");
    }
}
