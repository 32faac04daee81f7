//! The deployment loop: wires the Provider Registry, Dependency Graph (via
//! the planner), and Autonaming Resolver together and drives one planning
//! operation against an old snapshot and a registration stream (spec §6
//! "ambient, added").

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use engine_core::{PluginHost, Snapshot, Urn};
use engine_naming::NamingConfig;
use engine_planner::{PlanOutcome, Planner, PlannerError, PlannerResult, Registration};
use engine_registry::ProviderRegistry;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{ConfigError, EngineConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging::LoggingBuilder;

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// The stack-level context the Autonaming Resolver substitutes into
/// patterns (spec §4.4: `${organization}`, `${project}`, `${stack}`,
/// `${config.<key>}`) plus the deterministic seed for random tokens.
#[derive(Debug, Clone, Default)]
pub struct StackContext {
    /// The Pulumi organization name.
    pub organization: String,
    /// The project name.
    pub project: String,
    /// The stack name.
    pub stack: String,
    /// Arbitrary `${config.<key>}` substitution values.
    pub config_values: BTreeMap<String, String>,
    /// A seed mixed into every per-resource random-token seed, for
    /// deterministic pattern generation (spec §8 property 7).
    pub seed: u64,
}

impl StackContext {
    /// Builds a context with no `${config.<key>}` values and seed `0`.
    pub fn new(organization: impl Into<String>, project: impl Into<String>, stack: impl Into<String>) -> Self {
        StackContext {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
            config_values: BTreeMap::new(),
            seed: 0,
        }
    }
}

/// Which planning operation [`Engine::run`] should perform (spec §4.5,
/// §9 "V1 vs V2 destroy").
pub enum PlanOperation<'a> {
    /// `Update`: process the registration stream, cascade replaces, delete
    /// anything no longer registered.
    Update {
        /// If true, no Create/Update/Delete RPCs are issued; only Check/Diff.
        preview: bool,
        /// Restrict planning to these URNs plus their dependencies/dependents.
        targets: Option<&'a HashSet<Urn>>,
    },
    /// `DestroyV2`: re-run the registration stream, then delete anything not
    /// re-registered. Preferred over `Destroy` (spec §9).
    DestroyV2,
    /// `Destroy` (V1): delete every resource in the old snapshot without
    /// re-running the user program.
    Destroy {
        /// Restrict deletion to these URNs plus their dependents.
        targets: Option<&'a HashSet<Urn>>,
    },
    /// `Refresh`: read actual provider state for every custom resource and
    /// reconcile the snapshot.
    Refresh,
}

/// Ties the Provider Registry, Dependency Graph, and Autonaming Resolver
/// together (via [`Planner`]) and drives one planning operation over an
/// old snapshot and a registration stream.
pub struct Engine {
    registry: Arc<ProviderRegistry>,
    planner: Planner,
}

impl Engine {
    /// Builds an engine from a loaded [`EngineConfig`], a stack context, and
    /// a concrete plugin host.
    pub fn new(config: &EngineConfig, stack: StackContext, host: Arc<dyn PluginHost>) -> RuntimeResult<Self> {
        let registry = Arc::new(ProviderRegistry::new(host, config.disable_automatic_plugin_acquisition));
        let naming = config
            .naming
            .clone()
            .into_config(stack.organization, stack.project, stack.stack, stack.config_values, stack.seed)
            .map_err(|e| RuntimeError::Config(ConfigError::validation(e.to_string())))?;
        let planner = Planner::new(Arc::clone(&registry), naming);
        Ok(Engine { registry, planner })
    }

    /// Builds an engine from an already-resolved [`NamingConfig`], bypassing
    /// config-file parsing. Useful for tests and embedders that construct
    /// naming configuration programmatically. `disable_automatic_acquisition`
    /// mirrors [`EngineConfig::disable_automatic_plugin_acquisition`], which
    /// this constructor has no config to read it from.
    pub fn with_naming(naming: NamingConfig, host: Arc<dyn PluginHost>, disable_automatic_acquisition: bool) -> Self {
        let registry = Arc::new(ProviderRegistry::new(host, disable_automatic_acquisition));
        let planner = Planner::new(Arc::clone(&registry), naming);
        Engine { registry, planner }
    }

    /// Returns a reference to the provider registry.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Runs one planning operation to completion or cooperative cancellation.
    pub async fn run(
        &self,
        operation: PlanOperation<'_>,
        old: &Snapshot,
        registrations: &[Registration],
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        match operation {
            PlanOperation::Update { preview, targets } => {
                self.planner.plan_update(old, registrations, preview, targets, cancel).await
            }
            PlanOperation::DestroyV2 => self.planner.plan_destroy_v2(old, registrations, cancel).await,
            PlanOperation::Destroy { targets } => self.planner.plan_destroy(old, targets, cancel).await,
            PlanOperation::Refresh => self.planner.refresh(old, cancel).await,
        }
    }

    /// Previews an `Update`: runs Check/Diff without issuing any
    /// Create/Update/Delete RPCs.
    pub async fn plan(
        &self,
        old: &Snapshot,
        registrations: &[Registration],
        targets: Option<&HashSet<Urn>>,
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        self.run(PlanOperation::Update { preview: true, targets }, old, registrations, cancel).await
    }

    /// Applies an `Update`: runs the full decision algorithm and issues
    /// Create/Update/Delete RPCs.
    pub async fn apply(
        &self,
        old: &Snapshot,
        registrations: &[Registration],
        targets: Option<&HashSet<Urn>>,
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        self.run(PlanOperation::Update { preview: false, targets }, old, registrations, cancel).await
    }
}

/// Initializes logging from an [`EngineConfig`]'s logging section. Idempotent:
/// only the first call in a process takes effect.
pub fn init_logging(config: &EngineConfig) {
    if LOGGING_INITIALIZED.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
        let mut builder = LoggingBuilder::new()
            .with_level(config.logging.level.to_tracing_level())
            .with_target(config.logging.with_target)
            .with_thread_ids(config.logging.with_thread_ids)
            .span_events(config.logging.span_events.to_span_events());

        for (target, level) in &config.logging.filters {
            builder = builder.directive(&format!("{target}={}", level.as_str()));
        }

        builder.init();
        info!(level = %config.logging.level, "logging initialized");
    }
}

/// Classification of a finished (or failed) planning pass, used only to
/// compute the process exit code (spec §6 exit-code table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    /// The pass completed with no issues.
    Success,
    /// Cooperative cancellation was observed; no retry.
    Bailed,
    /// The pass completed but skipped one or more resources due to
    /// non-fatal user errors (spec §7 "independent failures aggregated").
    UserError,
    /// A plugin RPC or graph-construction failure aborted the pass.
    InternalError,
    /// The assembled snapshot failed its integrity check. Always fatal.
    SnapshotIntegrityViolation,
}

impl EngineOutcome {
    /// Classifies the result of a planning pass.
    pub fn classify(result: &PlannerResult<PlanOutcome>) -> Self {
        match result {
            Ok(PlanOutcome::Bailed { .. }) => EngineOutcome::Bailed,
            Ok(PlanOutcome::Completed { issues, .. }) if !issues.is_empty() => EngineOutcome::UserError,
            Ok(PlanOutcome::Completed { .. }) => EngineOutcome::Success,
            Err(PlannerError::SnapshotIntegrity(..)) => EngineOutcome::SnapshotIntegrityViolation,
            Err(_) => EngineOutcome::InternalError,
        }
    }

    /// The process exit code for this outcome (spec §6).
    pub fn exit_code(self) -> i32 {
        match self {
            EngineOutcome::Success => 0,
            EngineOutcome::Bailed | EngineOutcome::UserError => 1,
            EngineOutcome::InternalError => 2,
            EngineOutcome::SnapshotIntegrityViolation => 255,
        }
    }
}
