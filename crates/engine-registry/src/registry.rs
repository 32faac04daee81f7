//! [`ProviderRegistry`] — the concurrent provider lifecycle map (spec §4.3).
//!
//! A provider's own Check/Diff/Create/Update/Delete (`urn.is_provider_type()`,
//! dispatched with `provider: None` below) follow the teacher pattern of
//! detaching an entry under a brief exclusive lock, doing the slow work (a
//! plugin RPC) with no lock held, then reacquiring the lock to install the
//! result. A *resource*'s own CRUD (`provider: Some(reference)`) never
//! touches that lifecycle at all: it looks up the already-resolved, shared
//! instance behind `reference` and dispatches straight to it, so that many
//! resources configured against the same provider reference share exactly
//! one loaded plugin instance (spec §4.3/§4.5 step 1 "Resolve the provider
//! via the Registry").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engine_core::{
    DiffKind, DiffResult, HostError, Id, OpStatus, PluginHost, Provider, ProviderReference,
    PropertyMap, PropertyValue, ResourceState, Urn, maps_deep_eq,
};
use parking_lot::RwLock as SyncRwLock;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RegistryError, RegistryResult};
use crate::internal::{self, InternalConfig};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

type Key = (Urn, Id);

/// The concurrent mapping from provider reference to live plugin instance.
pub struct ProviderRegistry {
    host: Arc<dyn PluginHost>,
    entries: AsyncRwLock<HashMap<Key, Arc<dyn Provider>>>,
    aliases: SyncRwLock<HashMap<Urn, Vec<Urn>>>,
    denied_default_packages: SyncRwLock<std::collections::HashSet<String>>,
    disable_automatic_acquisition: bool,
}

impl ProviderRegistry {
    /// Builds an empty registry backed by `host`. `disable_automatic_acquisition`
    /// mirrors `DISABLE_AUTOMATIC_PLUGIN_ACQUISITION` (spec §4.3.2): when set,
    /// a missing plugin is never installed on the caller's behalf, it is
    /// reported as an acquisition failure instead.
    pub fn new(host: Arc<dyn PluginHost>, disable_automatic_acquisition: bool) -> Self {
        ProviderRegistry {
            host,
            entries: AsyncRwLock::new(HashMap::new()),
            aliases: SyncRwLock::new(HashMap::new()),
            denied_default_packages: SyncRwLock::new(std::collections::HashSet::new()),
            disable_automatic_acquisition,
        }
    }

    /// Forbids resolving a default provider for `package`; subsequent
    /// requests for it fail with [`RegistryError::DeniedDefaultProvider`].
    pub fn deny_default_provider(&self, package: impl Into<String>) {
        self.denied_default_packages.write().insert(package.into());
    }

    /// Registers `alias` as a mirror of `urn`: the next time an entry is
    /// installed under `(urn, id)`, it is also installed under `(alias, id)`.
    /// Self-aliasing is ignored.
    pub fn register_alias(&self, urn: &Urn, alias: Urn) {
        if &alias == urn {
            return;
        }
        self.aliases.write().entry(urn.clone()).or_default().push(alias);
    }

    /// Resolves `reference` to a loaded, configured provider instance shared
    /// by every resource that carries the same reference (spec §4.3/§4.5
    /// step 1). Reuses an already-resolved instance if one is registered at
    /// `(reference.urn(), reference.id())`; otherwise loads and configures
    /// one from `provider_state.inputs` — the provider's OWN resource state,
    /// not the dependent resource's — and installs it under the reference's
    /// own identity so later resources sharing this reference find it too.
    pub async fn resolve_provider(
        &self,
        reference: &ProviderReference,
        provider_state: Option<&ResourceState>,
    ) -> RegistryResult<Arc<dyn Provider>> {
        if let Ok(provider) = self.find(reference.urn(), reference.id()).await {
            return Ok(provider);
        }
        let Some(state) = provider_state else {
            return Err(RegistryError::NotLoaded(reference.urn().clone()));
        };
        let provider = self.acquire(reference.urn(), &state.inputs).await?;
        self.configure(reference.urn(), &provider, &state.inputs).await?;
        self.install(reference.urn().clone(), reference.id().clone(), Arc::clone(&provider)).await;
        Ok(provider)
    }

    /// Validates a provider configuration (spec table: `Check`).
    pub async fn check(
        &self,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> RegistryResult<(PropertyMap, Vec<engine_core::CheckFailure>)> {
        require_provider_type(urn)?;
        self.reject_denied_default(urn)?;

        let provider = self.acquire(urn, news).await?;
        let (normalized, failures) = provider
            .check_config(urn, &internal::strip_internal(olds), &internal::strip_internal(news), false)
            .await?;

        if !failures.is_empty() {
            let _ = provider.close().await;
            return Ok((news.clone(), failures));
        }

        self.install(urn.clone(), Id::unconfigured(), provider).await;
        Ok((with_internal_restored(news, normalized), Vec::new()))
    }

    /// Validates resource inputs (spec §6 capability table: `Check`, as
    /// opposed to [`ProviderRegistry::check`]'s `CheckConfig`). Acquires and
    /// configures a plugin for `urn` exactly like `Create`/`Diff` do, so it
    /// can run standalone against a resource that has never been loaded.
    pub async fn resource_check(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        olds: &PropertyMap,
        news: &PropertyMap,
    ) -> RegistryResult<(PropertyMap, Vec<engine_core::CheckFailure>)> {
        let (provider, owned) = match provider {
            Some(reference) => (self.find(reference.urn(), reference.id()).await?, false),
            None => (self.acquire(urn, news).await?, true),
        };
        if owned {
            self.configure(urn, &provider, news).await?;
        }
        let (normalized, failures) = provider
            .check(urn, &internal::strip_internal(olds), &internal::strip_internal(news))
            .await?;
        if owned {
            self.install(urn.clone(), Id::unconfigured(), provider).await;
        }
        Ok((with_internal_restored(news, normalized), failures))
    }

    /// Refreshes a resource from ground truth (spec table: `Read`). An empty
    /// returned ID signals the resource no longer exists.
    pub async fn read(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        id: &Id,
        inputs: &PropertyMap,
        state: &PropertyMap,
    ) -> RegistryResult<(Id, PropertyMap, PropertyMap, OpStatus)> {
        let (provider, owned) = match provider {
            Some(reference) => (self.find(reference.urn(), reference.id()).await?, false),
            None => {
                let provider = match self.find(urn, id).await {
                    Ok(p) => p,
                    Err(RegistryError::NotLoaded(_)) => self.acquire(urn, inputs).await?,
                    Err(e) => return Err(e),
                };
                (provider, true)
            }
        };
        if owned {
            self.configure(urn, &provider, inputs).await?;
        }
        let (new_id, new_inputs, outputs, status) = provider
            .read(urn, id, &internal::strip_internal(inputs), &internal::strip_internal(state))
            .await?;
        if owned && !new_id.is_empty() {
            self.install(urn.clone(), new_id.clone(), Arc::clone(&provider)).await;
        }
        Ok((new_id, with_internal_restored(inputs, new_inputs), with_internal_restored(state, outputs), status))
    }

    /// Classifies a configuration or resource change (spec table: `Diff`).
    pub async fn diff(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        id: &Id,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
    ) -> RegistryResult<DiffResult> {
        let forwarded_new = internal::strip_internal(new_inputs);
        if forwarded_new.values().any(PropertyValue::is_unknown) {
            let forwarded_old_outputs = internal::strip_internal(old_outputs);
            return Ok(if maps_deep_eq(&forwarded_old_outputs, &forwarded_new) {
                DiffResult::none()
            } else {
                DiffResult { change: DiffKind::Some, ..DiffResult::none() }
            });
        }

        let resolved = match provider {
            Some(reference) => self.find(reference.urn(), reference.id()).await?,
            None => self.find(urn, id).await?,
        };
        let result = resolved
            .diff(
                urn,
                id,
                &internal::strip_internal(old_inputs),
                &internal::strip_internal(old_outputs),
                &forwarded_new,
            )
            .await?;

        if provider.is_none()
            && result.change == DiffKind::Replace
            && let Some(resolved) = self.detach(&(urn.clone(), Id::unconfigured())).await
        {
            let _ = resolved.close().await;
        }
        Ok(result)
    }

    /// Ensures a provider is loaded and configured at `(urn, id)` (spec
    /// table: `Same`).
    pub async fn same(&self, state: &ResourceState) -> RegistryResult<()> {
        let Some(id) = &state.id else {
            return Err(RegistryError::NotLoaded(state.urn.clone()));
        };
        if id.is_empty() || id.is_unknown() {
            return Err(RegistryError::NotLoaded(state.urn.clone()));
        }
        if self.entries.read().await.contains_key(&(state.urn.clone(), id.clone())) {
            return Ok(());
        }

        let provider = self.acquire(&state.urn, &state.inputs).await?;
        self.configure(&state.urn, &provider, &state.inputs).await?;
        self.install(state.urn.clone(), id.clone(), provider).await;
        Ok(())
    }

    /// Creates a resource (spec table: `Create`).
    pub async fn create(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        props: &PropertyMap,
        preview: bool,
    ) -> RegistryResult<(Id, PropertyMap, OpStatus)> {
        let (resolved, owned) = match provider {
            Some(reference) => (self.find(reference.urn(), reference.id()).await?, false),
            None => (self.acquire(urn, props).await?, true),
        };
        if owned {
            self.configure(urn, &resolved, props).await?;
        }

        let forwarded = internal::strip_internal(props);
        let (provider_id, outputs, status) = resolved.create(urn, &forwarded, preview).await?;

        let id = if preview {
            Id::unknown()
        } else if provider_id.is_empty() {
            Id::new(Uuid::new_v4().to_string())
        } else {
            provider_id
        };

        if owned {
            self.install(urn.clone(), id.clone(), resolved).await;
        }
        Ok((id, with_internal_restored(props, outputs), status))
    }

    /// Updates a resource in place (spec table: `Update`).
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        id: &Id,
        old_inputs: &PropertyMap,
        old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        preview: bool,
    ) -> RegistryResult<(PropertyMap, OpStatus)> {
        let (resolved, owned) = match provider {
            Some(reference) => (self.find(reference.urn(), reference.id()).await?, false),
            None => {
                let resolved = match self.detach(&(urn.clone(), Id::unconfigured())).await {
                    Some(p) => p,
                    None => match self.entries.read().await.get(&(urn.clone(), id.clone())) {
                        Some(p) => Arc::clone(p),
                        None => self.acquire(urn, new_inputs).await?,
                    },
                };
                (resolved, true)
            }
        };
        if owned {
            self.configure(urn, &resolved, new_inputs).await?;
        }

        let (outputs, status) = resolved
            .update(
                urn,
                id,
                &internal::strip_internal(old_inputs),
                &internal::strip_internal(old_outputs),
                &internal::strip_internal(new_inputs),
                preview,
            )
            .await?;

        if owned {
            self.install(urn.clone(), id.clone(), resolved).await;
        }
        Ok((with_internal_restored(new_inputs, outputs), status))
    }

    /// Deletes a resource (spec table: `Delete`). Idempotent no-op if no
    /// plugin is registered for `(urn, id)`.
    pub async fn delete(
        &self,
        provider: Option<&ProviderReference>,
        urn: &Urn,
        id: &Id,
        inputs: &PropertyMap,
        outputs: &PropertyMap,
    ) -> RegistryResult<()> {
        match provider {
            Some(reference) => {
                let resolved = match self.find(reference.urn(), reference.id()).await {
                    Ok(p) => p,
                    Err(RegistryError::NotLoaded(_)) => return Ok(()),
                    Err(e) => return Err(e),
                };
                resolved
                    .delete(urn, id, &internal::strip_internal(inputs), &internal::strip_internal(outputs))
                    .await
                    .map(|_| ())
                    .map_err(RegistryError::from)
            }
            None => {
                let Some(resolved) = self.detach(&(urn.clone(), id.clone())).await else {
                    return Ok(());
                };
                let result = resolved
                    .delete(urn, id, &internal::strip_internal(inputs), &internal::strip_internal(outputs))
                    .await;
                let _ = resolved.close().await;
                result.map(|_| ()).map_err(RegistryError::from)
            }
        }
    }

    /// Calls `SignalCancellation` on every registered plugin with a bounded
    /// timeout, then releases all entries. Errors (including timeouts) are
    /// collected rather than treated as fatal.
    pub async fn close(&self) -> Vec<RegistryError> {
        let drained: Vec<Arc<dyn Provider>> = self.entries.write().await.drain().map(|(_, p)| p).collect();
        let mut errors = Vec::new();
        for provider in drained {
            match tokio::time::timeout(CLOSE_TIMEOUT, provider.signal_cancellation()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(RegistryError::Provider(e)),
                Err(_) => errors.push(RegistryError::CloseTimedOut(1)),
            }
            if let Err(e) = provider.close().await {
                errors.push(RegistryError::Provider(e));
            }
        }
        errors
    }

    // ── internal helpers ──────────────────────────────────────────────

    async fn find(&self, urn: &Urn, id: &Id) -> RegistryResult<Arc<dyn Provider>> {
        let entries = self.entries.read().await;
        if let Some(p) = entries.get(&(urn.clone(), Id::unconfigured())) {
            return Ok(Arc::clone(p));
        }
        if let Some(p) = entries.get(&(urn.clone(), id.clone())) {
            return Ok(Arc::clone(p));
        }
        Err(RegistryError::NotLoaded(urn.clone()))
    }

    async fn detach(&self, key: &Key) -> Option<Arc<dyn Provider>> {
        self.entries.write().await.remove(key)
    }

    async fn install(&self, urn: Urn, id: Id, provider: Arc<dyn Provider>) {
        let mirrors = self.aliases.read().get(&urn).cloned().unwrap_or_default();
        let mut entries = self.entries.write().await;
        for alias in mirrors {
            entries.insert((alias, id.clone()), Arc::clone(&provider));
        }
        entries.insert((urn, id), provider);
    }

    async fn configure(&self, urn: &Urn, provider: &Arc<dyn Provider>, props: &PropertyMap) -> RegistryResult<()> {
        provider
            .configure(&internal::strip_internal(props))
            .await
            .map(|_| ())
            .map_err(|source| RegistryError::ConfigureFailed { urn: urn.clone(), source })
    }

    /// Loads (or reuses an already-unconfigured) plugin for `urn`, handling
    /// plugin acquisition and parameterization. Does not configure it.
    async fn acquire(&self, urn: &Urn, props: &PropertyMap) -> RegistryResult<Arc<dyn Provider>> {
        if let Some(provider) = self.detach(&(urn.clone(), Id::unconfigured())).await {
            return Ok(provider);
        }

        let internal = InternalConfig::read(props);
        let package = internal.name.clone().unwrap_or_else(|| urn.package().to_string());
        let version = internal
            .parameterized_version
            .clone()
            .or_else(|| internal::package_version(props).map(str::to_string))
            .unwrap_or_default();

        let provider = self
            .load_with_retry(urn, &package, &version, internal.download_url.as_deref(), internal.checksums.as_ref())
            .await?;

        if let Some(bytes) = &internal.parameterization {
            let response = provider
                .parameterize(&package, &version, bytes)
                .await
                .map_err(RegistryError::from)?;
            if response.name != package {
                return Err(RegistryError::ParameterizeMismatch {
                    urn: urn.clone(),
                    got: response.name,
                    expected: package,
                });
            }
        }

        Ok(provider)
    }

    async fn load_with_retry(
        &self,
        urn: &Urn,
        package: &str,
        version: &str,
        download_url: Option<&str>,
        checksums: Option<&PropertyMap>,
    ) -> RegistryResult<Arc<dyn Provider>> {
        match self.host.load(package, version, download_url, checksums).await {
            Ok(provider) => Ok(provider),
            Err(HostError::MissingPlugin { package, version }) if !self.disable_automatic_acquisition => {
                warn!(%package, %version, "plugin not installed, attempting install");
                self.host
                    .install(&package, &version)
                    .await
                    .map_err(|source| RegistryError::Acquisition { urn: urn.clone(), source })?;
                self.host
                    .load(&package, &version, download_url, checksums)
                    .await
                    .map_err(|source| RegistryError::Acquisition { urn: urn.clone(), source })
            }
            Err(source) => Err(RegistryError::Acquisition { urn: urn.clone(), source }),
        }
    }

    fn reject_denied_default(&self, urn: &Urn) -> RegistryResult<()> {
        if urn.is_default_provider() && self.denied_default_packages.read().contains(urn.package()) {
            return Err(RegistryError::DeniedDefaultProvider(urn.package().to_string()));
        }
        Ok(())
    }
}

/// Resolves a default provider reference for `package`, returning the
/// deny-default sentinel if the caller forbade it.
pub fn resolve_default_provider(urn: Urn, id: Id, denied: bool) -> RegistryResult<ProviderReference> {
    if denied {
        info!(package = %urn.package(), "default provider denied, returning sentinel reference");
        return ProviderReference::deny_default(urn.clone()).map_err(|_| RegistryError::NotAProviderType(urn));
    }
    ProviderReference::new(urn.clone(), id).map_err(|_| RegistryError::NotAProviderType(urn))
}

fn require_provider_type(urn: &Urn) -> RegistryResult<()> {
    if !urn.is_provider_type() {
        return Err(RegistryError::NotAProviderType(urn.clone()));
    }
    Ok(())
}

fn with_internal_restored(original: &PropertyMap, mut result: PropertyMap) -> PropertyMap {
    if let Some(internal) = original.get("__internal") {
        result.insert("__internal".to_string(), internal.clone());
    }
    result
}
