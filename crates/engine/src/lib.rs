//! # Engine
//!
//! The core of a Pulumi-style deployment engine: given a resource model
//! (URNs, snapshots), a dependency graph, a provider plugin registry, and
//! an autonaming resolver, the [`Planner`](engine_planner::Planner) decides
//! a Create/Update/Replace/Delete step for every resource a user program
//! registers and assembles the resulting snapshot.
//!
//! This crate is a thin facade: it depends on nothing its members don't
//! already depend on, and exists only to give embedders one crate to
//! depend on and one prelude to import from.
//!
//! ```ignore
//! use engine::prelude::*;
//!
//! let cfg = config::load_config()?;
//! init_logging(&cfg);
//! let engine = Engine::new(&cfg, StackContext::new("acme", "proj", "dev"), host)?;
//! let outcome = engine.apply(&old_snapshot, &registrations, None, &cancel).await?;
//! ```

pub use engine_core as core;
pub use engine_graph as graph;
pub use engine_naming as naming;
pub use engine_planner as planner;
pub use engine_registry as registry;
pub use engine_runtime as runtime;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use engine_core::{
        Id, PluginHost, PropertyMap, PropertyValue, Provider, ProviderReference, ResourceState, Snapshot, Urn,
    };
    pub use engine_graph::DependencyGraph;
    pub use engine_naming::NamingConfig;
    pub use engine_planner::{PlanOutcome, Planner, Registration, Step, StepKind};
    pub use engine_registry::ProviderRegistry;
    pub use engine_runtime::{Engine, EngineOutcome, PlanOperation, StackContext, config, init_logging};
}
