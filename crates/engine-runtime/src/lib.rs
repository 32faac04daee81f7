//! # Engine Runtime
//!
//! The ambient orchestration layer the core modules need to run as a real
//! program rather than a library in isolation: config loading, logging
//! setup, and the `Engine` that wires the Provider Registry, Dependency
//! Graph, and Autonaming Resolver together and drives a planning operation
//! end to end.
//!
//! ```ignore
//! use engine_runtime::{config, Engine, StackContext};
//!
//! let cfg = config::load_config()?;
//! engine_runtime::init_logging(&cfg);
//! let engine = Engine::new(&cfg, StackContext::new("acme", "proj", "dev"), host)?;
//! let outcome = engine.apply(&old_snapshot, &registrations, None, &cancel).await?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{Engine, EngineOutcome, PlanOperation, StackContext, init_logging};

// Re-export tracing for use by embedders without an extra dependency line.
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
