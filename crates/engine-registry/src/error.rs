//! Errors raised by [`crate::ProviderRegistry`] operations.

use engine_core::{CheckFailure, HostError, ProviderError, Urn};
use thiserror::Error;

/// Failure modes for registry operations (spec §4.3).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The URN passed to a registry operation is not a provider type.
    #[error("'{0}' is not a provider URN")]
    NotAProviderType(Urn),

    /// `CheckConfig` rejected the proposed configuration.
    #[error("provider configuration for '{urn}' failed validation")]
    InvalidConfig {
        /// The provider URN.
        urn: Urn,
        /// The reported failures.
        failures: Vec<CheckFailure>,
    },

    /// `Configure` failed after the plugin was loaded.
    #[error("failed to configure provider '{urn}': {source}")]
    ConfigureFailed {
        /// The provider URN.
        urn: Urn,
        /// The underlying provider error.
        source: ProviderError,
    },

    /// No plugin is registered for this (urn, id) and none could be loaded.
    #[error("no plugin registered for provider '{0}'")]
    NotLoaded(Urn),

    /// The plugin host could not load or install the requested plugin.
    #[error("failed to acquire plugin for '{urn}': {source}")]
    Acquisition {
        /// The provider URN.
        urn: Urn,
        /// The underlying host error.
        source: HostError,
    },

    /// A request named a default provider the caller has forbidden.
    #[error("default provider for package '{0}' was denied by the caller")]
    DeniedDefaultProvider(String),

    /// A parameterized load's response did not echo the requested name.
    #[error("parameterize for '{urn}' returned name '{got}', expected '{expected}'")]
    ParameterizeMismatch {
        /// The provider URN.
        urn: Urn,
        /// The name the response echoed.
        got: String,
        /// The name that was requested.
        expected: String,
    },

    /// A provider RPC returned an error.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// `Close` did not finish within its bounded timeout.
    #[error("registry close timed out waiting for {0} plugin(s) to acknowledge cancellation")]
    CloseTimedOut(usize),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
