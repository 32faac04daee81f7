//! Error types for the resource model.

use thiserror::Error;

use crate::urn::Urn;

// =============================================================================
// URN errors
// =============================================================================

/// Errors that occur while parsing or constructing a [`Urn`](crate::urn::Urn).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UrnError {
    /// The URN string did not parse into the expected five-segment form.
    #[error("invalid URN: {0}")]
    InvalidUrn(String),
}

/// Result type for URN operations.
pub type UrnResult<T> = Result<T, UrnError>;

// =============================================================================
// Provider reference errors
// =============================================================================

/// Errors that occur while parsing a provider reference string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// The reference string lacks the `::` separator between URN and ID.
    #[error("invalid provider reference: {0}")]
    InvalidReference(String),

    /// The URN half of a reference is not a provider type.
    #[error("invalid provider reference: URN '{0}' is not a provider type")]
    NotAProviderType(Urn),
}

/// Result type for provider reference operations.
pub type ReferenceResult<T> = Result<T, ReferenceError>;

// =============================================================================
// Snapshot errors
// =============================================================================

/// Errors raised when a [`Snapshot`](crate::snapshot::Snapshot) fails an
/// integrity check.
///
/// Every variant names the offending invariant from the resource model
/// (`§3 Snapshot integrity invariants`) and the URN responsible.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// A URN referenced in `parent`/`dependencies`/`property_dependencies`/
    /// `deleted_with`/`provider` does not resolve to an earlier entry.
    #[error("resource '{urn}' references unknown or forward URN '{reference}' via {via}")]
    DanglingReference {
        /// The resource doing the referencing.
        urn: Urn,
        /// The URN it references.
        reference: Urn,
        /// Which field produced the reference (for diagnostics).
        via: &'static str,
    },

    /// Two entries share a URN and both have `delete == false`.
    #[error("duplicate live entry for URN '{0}'")]
    DuplicateLiveEntry(Urn),

    /// A provider reference's URN entry is not of a `pulumi:providers:` type.
    #[error("provider reference for '{urn}' names non-provider URN '{provider_urn}'")]
    NotAProvider {
        /// The resource whose `provider` field is invalid.
        urn: Urn,
        /// The URN it names as its provider.
        provider_urn: Urn,
    },

    /// A cycle was detected in the union of parent/dependency edges.
    #[error("cycle detected involving URN '{0}'")]
    Cycle(Urn),

    /// A custom resource has no provider and is not a builtin-package resource.
    #[error("custom resource '{0}' has no provider")]
    MissingProvider(Urn),
}

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;
