//! # Engine Core
//!
//! The resource model shared by every other crate in the deployment engine:
//! URNs, IDs, property values, resource state, snapshots, and the plugin
//! capability interface a provider must implement.
//!
//! ## Layers
//!
//! - **Identity**: [`Urn`], [`Id`], [`ProviderReference`] — the opaque,
//!   string-backed identifiers that thread through every other crate.
//! - **Values**: [`PropertyValue`], [`PropertyMap`] — the tagged value type
//!   stored in resource inputs/outputs, with `Computed`/`Secret` handling.
//! - **State**: [`ResourceState`], [`Snapshot`] — the persisted record of
//!   what the engine believes is deployed, plus its integrity invariants.
//! - **Capability**: [`Provider`], [`PluginHost`] — the async trait a
//!   concrete plugin (or a test double) implements; no crate here depends on
//!   how a provider is actually transported.

pub mod error;
pub mod id;
pub mod provider;
pub mod reference;
pub mod resource;
pub mod snapshot;
pub mod urn;
pub mod value;

pub use error::{ReferenceError, ReferenceResult, SnapshotError, SnapshotResult, UrnError, UrnResult};
pub use id::Id;
pub use provider::{
    CheckFailure, DiffKind, DiffResult, HostError, OpStatus, ParameterizeResponse, PluginHost,
    Provider, ProviderError, ProviderResult,
};
pub use reference::{ProviderReference, DENY_DEFAULT_ID};
pub use resource::ResourceState;
pub use snapshot::{Manifest, Snapshot};
pub use urn::Urn;
pub use value::{maps_deep_eq, PropertyMap, PropertyValue};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::*;
    pub use super::id::Id;
    pub use super::provider::{
        CheckFailure, DiffKind, DiffResult, HostError, OpStatus, ParameterizeResponse, PluginHost,
        Provider, ProviderError, ProviderResult,
    };
    pub use super::reference::{ProviderReference, DENY_DEFAULT_ID};
    pub use super::resource::ResourceState;
    pub use super::snapshot::{Manifest, Snapshot};
    pub use super::urn::Urn;
    pub use super::value::{maps_deep_eq, PropertyMap, PropertyValue};
}
