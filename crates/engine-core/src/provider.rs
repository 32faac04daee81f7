//! The plugin capability interface (spec §6 "External Interfaces").
//!
//! `engine-registry` is the only consumer of [`Provider`]; this crate only
//! states the contract, the same way `alloy-core` declares the `Adapter`
//! trait without depending on any concrete transport implementation.

use async_trait::async_trait;
use serde_json::Value;

use crate::id::Id;
use crate::urn::Urn;
use crate::value::PropertyMap;

/// Coarse classification of a diff result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// No observable change.
    None,
    /// An in-place update suffices.
    Some,
    /// The resource must be deleted and recreated.
    Replace,
}

/// The result of a `Check{Config,}`/`Diff{Config,}` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Coarse change classification.
    pub change: DiffKind,
    /// Property keys that triggered `Replace`, if any.
    pub replace_keys: Vec<String>,
    /// Whether this provider requires delete-before-replace for these keys.
    pub delete_before_replace: bool,
    /// Keys whose values the provider considers stable across replace.
    pub stable_keys: Vec<String>,
    /// All property keys the provider considers changed (superset of
    /// `replace_keys` when `change != None`).
    pub changed_properties: Vec<String>,
}

impl DiffResult {
    /// A `None`-kind result with no changed properties.
    pub fn none() -> Self {
        DiffResult {
            change: DiffKind::None,
            replace_keys: Vec::new(),
            delete_before_replace: false,
            stable_keys: Vec::new(),
            changed_properties: Vec::new(),
        }
    }
}

/// Validation failures returned by `Check`/`CheckConfig`.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    /// The offending property key, or empty for a resource-wide failure.
    pub property: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Outcome of a `Create`/`Update`/`Delete` call that did not return a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    /// The operation completed successfully.
    Ok,
    /// The operation partially applied; the resource exists but may not
    /// match the requested inputs.
    Partial,
}

/// A provider-reported error from any RPC, carrying enough context for the
/// registry/planner to wrap it with URN and operation (spec §7 "Plugin
/// errors").
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// The underlying provider-reported message.
    pub message: String,
}

impl ProviderError {
    /// Wraps a message as a provider error.
    pub fn new(message: impl Into<String>) -> Self {
        ProviderError { message: message.into() }
    }
}

/// Result type for provider RPCs.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Plugin capability interface consumed by `engine-registry`.
///
/// Every method is async and context-cancellable (cancellation is modeled
/// by the caller dropping the future — see spec §5 "Suspension points").
#[async_trait]
pub trait Provider: Send + Sync {
    /// Exchanges capabilities with the plugin.
    async fn handshake(&self, engine_info: &Value) -> ProviderResult<Value>;

    /// Binds a parameterized package; the response's `name` must echo the
    /// request's `name` or the caller treats this as a fatal load error.
    async fn parameterize(
        &self,
        name: &str,
        version: &str,
        bytes: &[u8],
    ) -> ProviderResult<ParameterizeResponse>;

    /// Validates provider configuration.
    async fn check_config(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
        allow_unknowns: bool,
    ) -> ProviderResult<(PropertyMap, Vec<CheckFailure>)>;

    /// Classifies a provider configuration change.
    async fn diff_config(
        &self,
        urn: &Urn,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
    ) -> ProviderResult<DiffResult>;

    /// Binds the final configuration. Must be called at most once per plugin
    /// instance.
    async fn configure(&self, inputs: &PropertyMap) -> ProviderResult<Value>;

    /// Validates resource inputs.
    async fn check(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> ProviderResult<(PropertyMap, Vec<CheckFailure>)>;

    /// Classifies a resource change.
    async fn diff(
        &self,
        urn: &Urn,
        id: &Id,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
    ) -> ProviderResult<DiffResult>;

    /// Creates a resource. Returns [`Id::unknown`] under preview.
    async fn create(
        &self,
        urn: &Urn,
        props: &PropertyMap,
        preview: bool,
    ) -> ProviderResult<(Id, PropertyMap, OpStatus)>;

    /// Updates a resource in place.
    async fn update(
        &self,
        urn: &Urn,
        id: &Id,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        preview: bool,
    ) -> ProviderResult<(PropertyMap, OpStatus)>;

    /// Deletes a resource.
    async fn delete(
        &self,
        urn: &Urn,
        id: &Id,
        inputs: &PropertyMap,
        outputs: &PropertyMap,
    ) -> ProviderResult<OpStatus>;

    /// Refreshes a resource from ground truth. An empty returned `Id` means
    /// "deleted".
    async fn read(
        &self,
        urn: &Urn,
        id: &Id,
        inputs: &PropertyMap,
        state: &PropertyMap,
    ) -> ProviderResult<(Id, PropertyMap, PropertyMap, OpStatus)>;

    /// Hints the plugin to begin a graceful shutdown. Best-effort.
    async fn signal_cancellation(&self) -> ProviderResult<()>;

    /// Releases the plugin. Must be idempotent.
    async fn close(&self) -> ProviderResult<()>;

    /// Whether this provider indicates that a change to `keys` during
    /// replace requires the resource be deleted before its replacement is
    /// created (spec §4.5 "DeleteBeforeReplace flag").
    fn delete_before_replace(&self) -> bool {
        false
    }
}

/// Response to [`Provider::parameterize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterizeResponse {
    /// The package name the plugin reports binding to. Must equal the
    /// request's `name`.
    pub name: String,
}

/// The external collaborator that can load a named plugin at a version and
/// close it. `engine-registry`'s only escape hatch to the outside world.
#[async_trait]
pub trait PluginHost: Send + Sync {
    /// Loads (or reuses a cached) plugin process for `(package, version)`.
    async fn load(
        &self,
        package: &str,
        version: &str,
        download_url: Option<&str>,
        checksums: Option<&PropertyMap>,
    ) -> Result<std::sync::Arc<dyn Provider>, HostError>;

    /// Installs a missing plugin. Called once, only after `load` reports
    /// [`HostError::MissingPlugin`] and auto-install is enabled.
    async fn install(&self, package: &str, version: &str) -> Result<(), HostError>;
}

/// Errors from the plugin host (spec §4.3 "Plugin acquisition").
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// The plugin is not installed locally.
    #[error("plugin '{package}' version '{version}' is not installed")]
    MissingPlugin {
        /// The package name.
        package: String,
        /// The required version.
        version: String,
    },
    /// The plugin's checksum did not match the expected value.
    #[error("checksum mismatch for plugin '{package}' version '{version}'")]
    ChecksumMismatch {
        /// The package name.
        package: String,
        /// The required version.
        version: String,
    },
    /// Any other host-reported failure.
    #[error("{0}")]
    Other(String),
}
