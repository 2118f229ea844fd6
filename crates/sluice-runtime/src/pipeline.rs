//! Pipeline assembly and lifecycle
//!
//! A pipeline wires its handlers into one chain:
//!
//! ```text
//! inlet ─▶ [inlet flows] ─┐
//! inlet ─▶ [inlet flows] ─┼─▶ fan-in ─▶ flow ─▶ … ─▶ fan-out ─┬─▶ outlet
//! inlet ─────────────────┘                                   └─▶ outlet
//! ```
//!
//! and moves through `Created → Built → Running → Stopped`. Building and
//! stopping happen at most once; repeating either is a no-op.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use sluice_core::{
    ComponentConfig, ComponentKind, ConfigMap, Context, InletConfig, PipelineConfig, Registry,
};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};
use crate::handler::{FlowHandler, InletHandler, OutletHandler, OutletStats};

/// Lifecycle state of a [`Pipeline`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Configured, nothing instantiated
    Created,
    /// Plugins instantiated and inlets opened
    Built,
    /// Handlers started
    Running,
    /// Stopped; terminal
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Built => "built",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Handlers instantiated by `build`, not yet wired
struct Topology {
    inlets: Vec<InletHandler>,
    flows: Vec<FlowHandler>,
    outlets: Vec<OutletHandler>,
}

/// Handlers owned by a running pipeline, in stop order
#[derive(Default)]
struct Active {
    inlets: Vec<Arc<InletHandler>>,
    flows: Vec<Arc<FlowHandler>>,
    outlets: Vec<Arc<OutletHandler>>,
}

/// One configured pipeline
pub struct Pipeline {
    config: PipelineConfig,
    ctx: Context,
    registry: Arc<Registry>,
    built: OnceCell<()>,
    stopped: OnceCell<()>,
    lifecycle: tokio::sync::Mutex<()>,
    topology: Mutex<Option<Topology>>,
    active: Mutex<Active>,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    /// Create a pipeline. `defaults` are the project-wide defaults; the
    /// pipeline's own defaults and each item's parameters override them.
    pub fn new(config: PipelineConfig, defaults: &ConfigMap, registry: Arc<Registry>) -> Self {
        let ctx = Context::new(&config.name, defaults.merged(&config.defaults));
        Self {
            config,
            ctx,
            registry,
            built: OnceCell::new(),
            stopped: OnceCell::new(),
            lifecycle: tokio::sync::Mutex::new(()),
            topology: Mutex::new(None),
            active: Mutex::new(Active::default()),
            state: Mutex::new(PipelineState::Created),
        }
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record counters of every started outlet
    pub fn outlet_stats(&self) -> Vec<(String, OutletStats)> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active
            .outlets
            .iter()
            .map(|o| (o.name().to_string(), o.stats()))
            .collect()
    }

    /// Check that every configured plugin is registered and the pipeline
    /// has at least one inlet and one outlet, without instantiating anything.
    pub fn check(&self) -> Result<()> {
        let registry = &self.registry;
        for inlet in &self.config.inlets {
            let component = &inlet.component;
            require(registry.inlets.contains(&component.plugin), ComponentKind::Inlet, component)?;
            for flow in &inlet.flows {
                require(registry.flows.contains(&flow.plugin), ComponentKind::Flow, flow)?;
            }
        }
        for flow in &self.config.flows {
            require(registry.flows.contains(&flow.plugin), ComponentKind::Flow, flow)?;
        }
        for outlet in &self.config.outlets {
            let registered = registry.outlets.contains(&outlet.plugin);
            require(registered, ComponentKind::Outlet, outlet)?;
        }
        if self.config.inlets.is_empty() {
            return Err(Error::NoInlets {
                pipeline: self.config.name.clone(),
            });
        }
        if self.config.outlets.is_empty() {
            return Err(Error::NoOutlets {
                pipeline: self.config.name.clone(),
            });
        }
        Ok(())
    }

    /// Instantiate every plugin and open the inlets.
    ///
    /// Runs once; later calls return immediately. A failed build can be
    /// retried. Unknown plugins and factory or inlet-open failures are fatal.
    pub async fn build(&self) -> Result<()> {
        self.built
            .get_or_try_init(|| async {
                let topology = self.instantiate().await?;
                tracing::info!(
                    parent: self.ctx.span(),
                    inlets = topology.inlets.len(),
                    flows = topology.flows.len(),
                    outlets = topology.outlets.len(),
                    "Pipeline built"
                );
                *self.topology.lock().unwrap_or_else(PoisonError::into_inner) = Some(topology);
                self.set_state(PipelineState::Built);
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    /// Build, start every stage and block until all inlets have finished,
    /// then stop.
    ///
    /// Outlets that fail to open are dropped. A flow or inlet that fails to
    /// open, or a pipeline left without inlets or outlets, aborts the run.
    pub async fn run(&self) -> Result<()> {
        self.build().await?;

        let started = {
            let _guard = self.lifecycle.lock().await;
            let topology = self.topology.lock().unwrap_or_else(PoisonError::into_inner).take();
            match topology {
                Some(topology) if !self.stopped.initialized() => {
                    self.set_state(PipelineState::Running);
                    tracing::info!(parent: self.ctx.span(), "Starting pipeline");
                    self.start(topology).await
                }
                Some(topology) => {
                    close_idle(topology).await;
                    return Err(self.already_run());
                }
                None => return Err(self.already_run()),
            }
        };

        let inlets = match started {
            Ok(inlets) => inlets,
            Err(e) => {
                tracing::error!(parent: self.ctx.span(), error = %e, "Pipeline failed to start");
                self.stop().await;
                return Err(e);
            }
        };

        join_all(inlets.iter().map(|inlet| inlet.wait())).await;
        tracing::info!(parent: self.ctx.span(), "All inlets finished");

        self.stop().await;
        Ok(())
    }

    /// Stop inlets, then flows in chain order, then outlets.
    ///
    /// Idempotent; concurrent callers all wait for the first stop to finish.
    pub async fn stop(&self) {
        self.stopped
            .get_or_init(|| async {
                let _guard = self.lifecycle.lock().await;

                let (inlets, flows, outlets) = {
                    let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
                    (active.inlets.clone(), active.flows.clone(), active.outlets.clone())
                };
                for inlet in &inlets {
                    inlet.stop().await;
                }
                for flow in &flows {
                    flow.stop().await;
                }
                for outlet in &outlets {
                    outlet.stop().await;
                }

                let idle = self.topology.lock().unwrap_or_else(PoisonError::into_inner).take();
                if let Some(topology) = idle {
                    close_idle(topology).await;
                }

                self.set_state(PipelineState::Stopped);
                tracing::info!(parent: self.ctx.span(), "Pipeline stopped");
            })
            .await;
    }

    async fn instantiate(&self) -> Result<Topology> {
        let flows = self
            .config
            .flows
            .iter()
            .map(|c| self.flow(c))
            .collect::<Result<Vec<_>>>()?;
        let outlets = self
            .config
            .outlets
            .iter()
            .map(|c| self.outlet(c))
            .collect::<Result<Vec<_>>>()?;

        let mut inlets = Vec::with_capacity(self.config.inlets.len());
        for config in &self.config.inlets {
            match self.inlet(config).await {
                Ok(inlet) => inlets.push(inlet),
                Err(e) => {
                    for opened in &inlets {
                        opened.stop().await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(Topology {
            inlets,
            flows,
            outlets,
        })
    }

    async fn inlet(&self, config: &InletConfig) -> Result<InletHandler> {
        let component = &config.component;
        let name = component.instance_name();
        let factory = self
            .registry
            .inlets
            .lookup(&component.plugin)
            .ok_or_else(|| unknown(ComponentKind::Inlet, component))?;

        let flows = config
            .flows
            .iter()
            .map(|c| self.flow(c))
            .collect::<Result<Vec<_>>>()?;

        let ctx = self.ctx.derive(ComponentKind::Inlet, name, &component.params);
        let source = factory(&ctx).map_err(|e| Error::create(ComponentKind::Inlet, name, e))?;
        InletHandler::new(ctx, source, flows)
            .await
            .map_err(|e| Error::open(ComponentKind::Inlet, name, e))
    }

    fn flow(&self, config: &ComponentConfig) -> Result<FlowHandler> {
        let name = config.instance_name();
        let factory = self
            .registry
            .flows
            .lookup(&config.plugin)
            .ok_or_else(|| unknown(ComponentKind::Flow, config))?;
        let ctx = self.ctx.derive(ComponentKind::Flow, name, &config.params);
        let flow = factory(&ctx).map_err(|e| Error::create(ComponentKind::Flow, name, e))?;
        Ok(FlowHandler::new(ctx, flow))
    }

    fn outlet(&self, config: &ComponentConfig) -> Result<OutletHandler> {
        let name = config.instance_name();
        let factory = self
            .registry
            .outlets
            .lookup(&config.plugin)
            .ok_or_else(|| unknown(ComponentKind::Outlet, config))?;
        let ctx = self.ctx.derive(ComponentKind::Outlet, name, &config.params);
        let outlet = factory(&ctx).map_err(|e| Error::create(ComponentKind::Outlet, name, e))?;
        Ok(OutletHandler::new(ctx, outlet))
    }

    /// Start outlets, wire and start the flow chain, then start the inlets.
    /// Returns the started inlets to wait on.
    async fn start(&self, topology: Topology) -> Result<Vec<Arc<InletHandler>>> {
        let Topology {
            inlets,
            flows,
            outlets,
        } = topology;

        let mut started = Vec::with_capacity(outlets.len());
        for outlet in outlets {
            match outlet.start().await {
                Ok(()) => started.push(Arc::new(outlet)),
                Err(e) => tracing::error!(
                    parent: self.ctx.span(),
                    outlet = %outlet.name(),
                    error = %e,
                    "Outlet failed to open, dropped"
                ),
            }
        }

        let fan_out = FlowHandler::fan_out(&self.ctx, started.iter().map(|o| o.sender()).collect());
        let mut chain = Vec::with_capacity(flows.len() + 2);
        chain.push(FlowHandler::fan_in(&self.ctx));
        chain.extend(flows);
        chain.push(fan_out);
        for i in 1..chain.len() {
            let next = chain[i].sender();
            chain[i - 1].set_downstream(next);
        }

        let head = chain[0].sender();
        let inlets: Vec<Arc<InletHandler>> = inlets
            .into_iter()
            .map(|mut inlet| {
                inlet.via(head.clone());
                Arc::new(inlet)
            })
            .collect();
        drop(head);
        let chain: Vec<Arc<FlowHandler>> = chain.into_iter().map(Arc::new).collect();

        {
            let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            active.inlets = inlets.clone();
            active.flows = chain.clone();
            active.outlets = started.clone();
        }

        for flow in &chain {
            flow.start()
                .await
                .map_err(|e| Error::open(ComponentKind::Flow, flow.name(), e))?;
        }

        if inlets.is_empty() {
            return Err(Error::NoInlets {
                pipeline: self.config.name.clone(),
            });
        }
        if started.is_empty() {
            return Err(Error::NoOutlets {
                pipeline: self.config.name.clone(),
            });
        }

        for inlet in &inlets {
            inlet
                .start()
                .await
                .map_err(|e| Error::open(ComponentKind::Inlet, inlet.name(), e))?;
        }
        Ok(inlets)
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn already_run(&self) -> Error {
        Error::AlreadyRunning {
            pipeline: self.config.name.clone(),
        }
    }
}

async fn close_idle(topology: Topology) {
    for inlet in &topology.inlets {
        inlet.stop().await;
    }
}

fn unknown(kind: ComponentKind, config: &ComponentConfig) -> Error {
    Error::UnknownPlugin {
        kind,
        name: config.plugin.clone(),
    }
}

fn require(registered: bool, kind: ComponentKind, config: &ComponentConfig) -> Result<()> {
    if registered {
        Ok(())
    } else {
        Err(unknown(kind, config))
    }
}
