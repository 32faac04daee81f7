//! Errors raised while constructing a [`crate::DependencyGraph`].

use engine_core::Urn;
use thiserror::Error;

/// Failure modes for graph construction (spec §4.2).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A resource references a URN that never appears anywhere in the input
    /// sequence.
    #[error("resource graph references unknown URN '{0}'")]
    UnknownUrn(Urn),

    /// A resource references a URN that appears later in the input — the
    /// caller did not provide a topologically ordered sequence.
    #[error("resource graph input is not topologically ordered: '{0}' is referenced before it appears")]
    CyclicInput(Urn),
}

/// Result type for graph construction.
pub type GraphResult<T> = Result<T, GraphError>;
