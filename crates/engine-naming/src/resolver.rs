//! The three-level naming configuration tree and its resolution order.

use std::collections::BTreeMap;

use engine_core::Urn;
use serde::Deserialize;

use crate::error::NamingResult;
use crate::pattern;
use crate::strategy::{NamingStrategy, RawDirective};

/// Resolved naming policy for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNaming {
    /// The strategy to apply.
    pub strategy: NamingStrategy,
    /// True when the strategy came from a provider- or resource-specific
    /// slot, meaning user intent is unambiguous and a provider that ignores
    /// it should be warned about.
    pub warn_if_no_support: bool,
}

/// Per-package naming configuration: an optional package-wide default and
/// per-resource-token overrides.
#[derive(Debug, Clone, Default)]
pub struct ProviderNaming {
    /// The strategy applied when no resource-specific entry matches.
    pub default: Option<NamingStrategy>,
    /// Resource-token → strategy overrides.
    pub resources: BTreeMap<String, NamingStrategy>,
}

/// The naming configuration tree (spec §4.4): stack-level context plus the
/// three-level `providers[P].resources[T]` → `providers[P]` → global
/// resolution chain.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// The Pulumi organization name, substituted for `${organization}`.
    pub organization: String,
    /// The project name, substituted for `${project}`.
    pub project: String,
    /// The stack name, substituted for `${stack}`.
    pub stack: String,
    /// Arbitrary `${config.<key>}` substitution values.
    pub config: BTreeMap<String, String>,
    /// The global default strategy, used when no provider-level entry matches.
    pub global_default: Option<NamingStrategy>,
    /// Per-package naming configuration.
    pub providers: BTreeMap<String, ProviderNaming>,
    /// A global seed mixed into every per-resource random-token seed.
    pub seed: u64,
}

impl NamingConfig {
    /// Builds an empty configuration (every resource resolves to `Default`).
    pub fn new(organization: impl Into<String>, project: impl Into<String>, stack: impl Into<String>) -> Self {
        NamingConfig {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
            config: BTreeMap::new(),
            global_default: None,
            providers: BTreeMap::new(),
            seed: 0,
        }
    }

    /// Resolves the naming strategy for a URN whose type has package `P` and
    /// token `T` (spec §4.4 "Resolution order").
    pub fn resolve(&self, package: &str, token: &str) -> ResolvedNaming {
        if let Some(provider) = self.providers.get(package) {
            if let Some(strategy) = provider.resources.get(token) {
                return ResolvedNaming { strategy: strategy.clone(), warn_if_no_support: true };
            }
            if let Some(strategy) = &provider.default {
                return ResolvedNaming { strategy: strategy.clone(), warn_if_no_support: true };
            }
        }
        if let Some(strategy) = &self.global_default {
            return ResolvedNaming { strategy: strategy.clone(), warn_if_no_support: false };
        }
        ResolvedNaming { strategy: NamingStrategy::Default, warn_if_no_support: false }
    }

    /// Proposes a physical name for `urn` under `strategy`, or `None` when
    /// the strategy leaves naming entirely to the provider.
    pub fn propose_name(&self, urn: &Urn, strategy: &NamingStrategy) -> Option<String> {
        match strategy {
            NamingStrategy::Default | NamingStrategy::Disabled => None,
            NamingStrategy::Verbatim => Some(urn.name().to_string()),
            NamingStrategy::Pattern { pattern: p, .. } => {
                Some(pattern::substitute(p, urn, self, pattern::seed_for(urn, self.seed)))
            }
        }
    }
}

/// The raw, deserializable shape of the naming configuration tree, as it
/// appears under the engine's stack configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNamingConfig {
    /// The global default directive.
    #[serde(default)]
    pub default: Option<RawDirective>,
    /// Per-package directives.
    #[serde(default)]
    pub providers: BTreeMap<String, RawProviderNaming>,
}

/// The raw shape of one package's naming configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProviderNaming {
    /// The package-wide default directive.
    #[serde(default)]
    pub default: Option<RawDirective>,
    /// Per-resource-token directives. An entry with no fields set is
    /// rejected (spec: "mode or pattern must be specified").
    #[serde(default)]
    pub resources: BTreeMap<String, RawDirective>,
}

impl RawNamingConfig {
    /// Validates this raw tree and merges it with stack-level context into a
    /// resolvable [`NamingConfig`].
    pub fn into_config(
        self,
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
        config_values: BTreeMap<String, String>,
        seed: u64,
    ) -> NamingResult<NamingConfig> {
        let global_default = self.default.map(RawDirective::into_strategy).transpose()?;

        let mut providers = BTreeMap::new();
        for (package, raw_provider) in self.providers {
            let default = raw_provider.default.map(RawDirective::into_strategy).transpose()?;
            let mut resources = BTreeMap::new();
            for (token, raw) in raw_provider.resources {
                if raw.is_empty() {
                    return Err(crate::error::NamingError::EmptyDirective);
                }
                resources.insert(token, raw.into_strategy()?);
            }
            providers.insert(package, ProviderNaming { default, resources });
        }

        Ok(NamingConfig {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
            config: config_values,
            global_default,
            providers,
            seed,
        })
    }
}
