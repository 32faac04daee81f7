//! The planner's error taxonomy (spec §7 "Error Handling Design").

use engine_core::{CheckFailure, Urn};
use engine_graph::GraphError;
use engine_registry::RegistryError;
use thiserror::Error;

/// Failure modes of a planning pass.
///
/// `ProtectedDeletion` and `CheckFailed` are user errors; `Registry`/`Graph`
/// wrap plugin or graph-construction failures; `SnapshotIntegrity` is the
/// one fatal, abort-with-full-state-dump condition (spec §4.5 "Snapshot
/// assembly"). `Bail` is deliberately not a variant here — a cooperative
/// abort is reported as [`crate::PlanOutcome::Bailed`], not an error.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// A deletion was required for a resource with `Protect = true`.
    #[error("resource '{0}' is protected and cannot be deleted")]
    ProtectedDeletion(Urn),

    /// A post-step integrity validation failed. Fatal.
    #[error("snapshot integrity violated after planning '{0}': {1}")]
    SnapshotIntegrity(Urn, String),

    /// A resource's `Check` reported validation failures.
    #[error("check failed for resource '{urn}': {failures:?}")]
    CheckFailed {
        /// The resource that failed validation.
        urn: Urn,
        /// The reported failures.
        failures: Vec<CheckFailure>,
    },

    /// A custom resource registration carried no provider reference.
    #[error("custom resource '{0}' has no provider reference")]
    MissingProvider(Urn),

    /// A target URN named in the target set does not appear in the old
    /// snapshot or new registration stream.
    #[error("targeted operation named unknown URN '{0}'")]
    UnknownTarget(Urn),

    /// The dependency graph could not be constructed from the registration
    /// stream (not topologically ordered, or references a URN never
    /// registered).
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A plugin RPC, wrapped with URN and operation context, failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for planning operations.
pub type PlannerResult<T> = Result<T, PlannerError>;
