//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use engine_planner::PlannerError;
use engine_registry::RegistryError;

/// Errors that can occur while building or driving an [`crate::Engine`].
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The plugin host could not acquire a provider plugin needed before
    /// planning could even begin (e.g. at startup-time provider warm-up).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The planning pass itself failed (spec §7 taxonomy, minus `Bail`,
    /// which is reported as [`engine_planner::PlanOutcome::Bailed`]).
    #[error(transparent)]
    Planner(#[from] PlannerError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
