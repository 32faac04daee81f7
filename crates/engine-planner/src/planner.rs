//! The deployment algorithm itself (spec §4.5 "Step Planner").

use std::collections::{BTreeMap, HashSet};

use engine_core::{DiffKind, Id, OpStatus, PropertyMap, PropertyValue, ResourceState, Snapshot, Urn};
use engine_graph::DependencyGraph;
use engine_naming::NamingConfig;
use engine_registry::ProviderRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{PlannerError, PlannerResult};
use crate::registration::Registration;
use crate::step::Step;

const PROPOSED_NAME_KEY: &str = "name";

/// The outcome of a planning pass: either it ran to completion (possibly
/// with non-fatal user-error issues alongside successful steps) or it was
/// cooperatively cancelled.
#[derive(Debug)]
pub enum PlanOutcome {
    /// The pass completed. `issues` holds non-fatal user errors for
    /// resources the planner skipped (their dependents may in turn fail
    /// integrity checks, which is reported as those resources' own issue).
    Completed {
        /// Steps emitted, in execution order.
        steps: Vec<Step>,
        /// The resulting snapshot, already integrity-checked.
        snapshot: Snapshot,
        /// Non-fatal user errors, one per skipped resource.
        issues: Vec<PlannerError>,
    },
    /// Cancellation was observed before the pass finished. No retry; the
    /// caller gets back whatever snapshot had been assembled so far.
    Bailed {
        /// Steps emitted before cancellation was observed.
        steps: Vec<Step>,
        /// The partial snapshot.
        snapshot: Snapshot,
    },
}

/// Ties the Registry, Graph, and Autonaming Resolver together to run the
/// per-registration decision algorithm and assemble the resulting snapshot.
pub struct Planner {
    registry: std::sync::Arc<ProviderRegistry>,
    naming: NamingConfig,
}

impl Planner {
    /// Builds a planner over a registry and a resolved naming configuration.
    pub fn new(registry: std::sync::Arc<ProviderRegistry>, naming: NamingConfig) -> Self {
        Planner { registry, naming }
    }

    /// Plans and executes an `Update` operation: processes the registration
    /// stream, cascades replaces, then deletes anything absent from it.
    pub async fn plan_update(
        &self,
        old: &Snapshot,
        registrations: &[Registration],
        preview: bool,
        targets: Option<&HashSet<Urn>>,
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        let new_graph = DependencyGraph::build(&placeholder_states(registrations))?;
        let old_graph = DependencyGraph::build(&old.resources)?;

        let included = targets.map(|t| transitive_dependencies(&new_graph, t));

        let mut issues: Vec<PlannerError> = Vec::new();
        let mut natural_replace: Vec<(Registration, ResourceState, bool)> = Vec::new();
        let mut committed: Vec<Step> = Vec::new();
        let mut seen: HashSet<Urn> = HashSet::new();
        let order: Vec<Urn> = registrations.iter().map(|r| r.urn.clone()).collect();

        // Pass 1: decide every registration independently. Same/Update/Create
        // are provisionally committed here; a cascade-forced replace below
        // discards a provisional Same/Update in favor of a Replace pair.
        for registration in registrations {
            if cancel.is_cancelled() {
                let snapshot = snapshot_from_committed(old, &committed);
                return Ok(PlanOutcome::Bailed { steps: committed, snapshot });
            }
            seen.insert(registration.urn.clone());

            let old_state = old.live(&registration.urn).cloned();

            if let Some(included) = &included
                && !included.contains(&registration.urn)
            {
                if let Some(state) = old_state {
                    committed.push(Step::same(state));
                }
                continue;
            }

            match self.plan_one(registration, old_state.as_ref(), old, preview).await {
                Ok(Decision::Same(state)) => committed.push(Step::same(state)),
                Ok(Decision::Create(new_state)) => committed.push(Step::create(new_state)),
                Ok(Decision::Update(old_s, new_s)) => committed.push(Step::update(old_s, new_s)),
                Ok(Decision::NaturalReplace(dbr)) => {
                    natural_replace.push((registration.clone(), old_state.expect("replace implies old state"), dbr));
                }
                Err(PlannerError::CheckFailed { urn, failures }) => {
                    issues.push(PlannerError::CheckFailed { urn, failures });
                }
                Err(e) => return Err(e),
            }
        }

        // Cascade: anything transitively depending on a naturally replaced
        // resource must also replace, even if its own decision above said
        // otherwise — discard that provisional step.
        let mut replaced: HashSet<Urn> = natural_replace.iter().map(|(r, _, _)| r.urn.clone()).collect();
        let mut frontier: Vec<Urn> = replaced.iter().cloned().collect();
        let mut cascaded: BTreeMap<Urn, ResourceState> = BTreeMap::new();
        while let Some(urn) = frontier.pop() {
            for dependent in old_graph.depending_on(&urn, &HashSet::new()) {
                if replaced.contains(dependent) {
                    continue;
                }
                let Some(old_dep_state) = old.live(dependent) else { continue };
                replaced.insert(dependent.clone());
                cascaded.insert(dependent.clone(), old_dep_state.clone());
                frontier.push(dependent.clone());
            }
        }
        committed.retain(|step| !replaced.contains(&step.urn));

        let registration_by_urn: BTreeMap<Urn, Registration> =
            registrations.iter().map(|r| (r.urn.clone(), r.clone())).collect();

        let (dbr_group, rest_group): (Vec<_>, Vec<_>) =
            natural_replace.into_iter().partition(|(_, _, dbr)| *dbr);

        let mut replace_steps: Vec<Step> = Vec::new();

        for (registration, old_state, _) in dbr_group {
            if old_state.protect {
                return Err(PlannerError::ProtectedDeletion(registration.urn.clone()));
            }
            self.ensure_loaded(&old_state, old).await?;
            self.registry
                .delete(
                    old_state.provider.as_ref(),
                    &old_state.urn,
                    old_state.id.as_ref().unwrap_or(&Id::default()),
                    &old_state.inputs,
                    &old_state.outputs,
                )
                .await?;
            replace_steps.push(Step::replace_delete(old_state.clone()));

            let new_state = self.create_new_state(&registration, old, preview).await?;
            replace_steps.push(Step::replace_create(old_state, new_state));
        }

        // Non-DBR group (including cascaded dependents that never had an
        // explicit registration change but must still be recreated under
        // the same, unchanged inputs): creates first, in dependency order,
        // then deletes, in reverse dependency order (spec §8 Scenario B).
        let mut rest_urns: Vec<Urn> = rest_group.iter().map(|(r, _, _)| r.urn.clone()).collect();
        rest_urns.extend(cascaded.keys().cloned());

        let mut old_by_urn: BTreeMap<Urn, ResourceState> =
            rest_group.iter().map(|(r, old, _)| (r.urn.clone(), old.clone())).collect();
        old_by_urn.extend(cascaded.clone());

        for urn in &rest_urns {
            let old_state = old_by_urn.get(urn).expect("tracked above").clone();
            if old_state.protect {
                return Err(PlannerError::ProtectedDeletion(urn.clone()));
            }
            let registration = registration_by_urn
                .get(urn)
                .cloned()
                .unwrap_or_else(|| registration_from_state(&old_state));
            let new_state = self.create_new_state(&registration, old, preview).await?;
            replace_steps.push(Step::replace_create(old_state, new_state));
        }
        for urn in rest_urns.iter().rev() {
            let old_state = old_by_urn.get(urn).expect("tracked above").clone();
            self.ensure_loaded(&old_state, old).await?;
            self.registry
                .delete(
                    old_state.provider.as_ref(),
                    &old_state.urn,
                    old_state.id.as_ref().unwrap_or(&Id::default()),
                    &old_state.inputs,
                    &old_state.outputs,
                )
                .await?;
            replace_steps.push(Step::replace_delete(old_state));
        }

        // Post-pass deletions: anything in the old snapshot not re-registered
        // and not already handled by a replace, in reverse topological order.
        let mut delete_steps: Vec<Step> = Vec::new();
        for old_state in old.resources.iter().filter(|r| !r.delete).rev() {
            if seen.contains(&old_state.urn) || replaced.contains(&old_state.urn) {
                continue;
            }
            if old_state.protect {
                return Err(PlannerError::ProtectedDeletion(old_state.urn.clone()));
            }
            self.ensure_loaded(old_state, old).await?;
            self.registry
                .delete(
                    old_state.provider.as_ref(),
                    &old_state.urn,
                    old_state.id.as_ref().unwrap_or(&Id::default()),
                    &old_state.inputs,
                    &old_state.outputs,
                )
                .await?;
            delete_steps.push(Step::delete(old_state.clone()));
        }

        // Assemble the final snapshot from every surviving URN's latest
        // state, in the new program's topological order.
        let mut final_state: BTreeMap<Urn, ResourceState> = BTreeMap::new();
        for step in committed.iter().chain(replace_steps.iter()) {
            // `ReplaceDelete` carries no `new` state, but it targets the same
            // URN its paired `ReplaceCreate` already recorded the survivor
            // under — only a plain `Delete` should clear an entry.
            if step.kind == crate::step::StepKind::Delete {
                final_state.remove(&step.urn);
            } else if let Some(state) = &step.new {
                final_state.insert(step.urn.clone(), state.clone());
            }
        }
        let mut assembled = Snapshot { manifest: old.manifest.clone(), ..Snapshot::new() };
        for urn in &order {
            if let Some(state) = final_state.remove(urn) {
                assembled.resources.push(state);
            }
        }

        let mut steps = committed;
        steps.extend(replace_steps);
        steps.extend(delete_steps);

        assembled.check_integrity().map_err(|e| {
            PlannerError::SnapshotIntegrity(
                assembled.resources.last().map(|r| r.urn.clone()).unwrap_or_else(|| Urn::new("unknown", "unknown", "", "pulumi:engine:diagnostic", "snapshot")),
                e.to_string(),
            )
        })?;

        Ok(PlanOutcome::Completed { steps, snapshot: assembled, issues })
    }

    /// `DestroyV2`: re-runs the user program (so dependency info is
    /// current), then deletes everything not re-registered. This is
    /// exactly `plan_update`'s own post-pass deletion behavior, so V2 is
    /// implemented as a direct call into it (spec §9 "prefer V2 semantics").
    pub async fn plan_destroy_v2(
        &self,
        old: &Snapshot,
        registrations: &[Registration],
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        self.plan_update(old, registrations, false, None, cancel).await
    }

    /// `Destroy` (V1): deletes every resource in the old snapshot (or, if
    /// targeted, `T` and its dependents) without re-running the user
    /// program. Deprecated in favor of `DestroyV2` (spec §9).
    pub async fn plan_destroy(
        &self,
        old: &Snapshot,
        targets: Option<&HashSet<Urn>>,
        cancel: &CancellationToken,
    ) -> PlannerResult<PlanOutcome> {
        let graph = DependencyGraph::build(&old.resources)?;
        let to_delete: HashSet<Urn> = match targets {
            None => old.resources.iter().filter(|r| !r.delete).map(|r| r.urn.clone()).collect(),
            Some(targets) => {
                let mut set: HashSet<Urn> = targets.clone();
                for t in targets {
                    set.extend(graph.depending_on(t, &HashSet::new()).into_iter().cloned());
                }
                set
            }
        };

        let mut steps = Vec::new();
        let mut assembled = old.clone();
        for old_state in old.resources.iter().filter(|r| !r.delete).rev() {
            if cancel.is_cancelled() {
                return Ok(PlanOutcome::Bailed { steps, snapshot: assembled });
            }
            if !to_delete.contains(&old_state.urn) {
                continue;
            }
            if old_state.protect {
                return Err(PlannerError::ProtectedDeletion(old_state.urn.clone()));
            }
            self.ensure_loaded(old_state, old).await?;
            self.registry
                .delete(
                    old_state.provider.as_ref(),
                    &old_state.urn,
                    old_state.id.as_ref().unwrap_or(&Id::default()),
                    &old_state.inputs,
                    &old_state.outputs,
                )
                .await?;
            assembled.resources.retain(|r| r.urn != old_state.urn);
            steps.push(Step::delete(old_state.clone()));
        }

        assembled.check_integrity().map_err(|e| {
            PlannerError::SnapshotIntegrity(
                Urn::new("unknown", "unknown", "", "pulumi:engine:diagnostic", "destroy"),
                e.to_string(),
            )
        })?;
        Ok(PlanOutcome::Completed { steps, snapshot: assembled, issues: Vec::new() })
    }

    /// `Refresh`: calls `Read` on every live custom resource and merges the
    /// returned outputs; a "deleted" response (empty ID) removes the entry.
    pub async fn refresh(&self, old: &Snapshot, cancel: &CancellationToken) -> PlannerResult<PlanOutcome> {
        let mut steps = Vec::new();
        let mut assembled = Snapshot { manifest: old.manifest.clone(), ..Snapshot::new() };

        for old_state in old.resources.iter().filter(|r| !r.delete) {
            if cancel.is_cancelled() {
                return Ok(PlanOutcome::Bailed { steps, snapshot: assembled });
            }
            if !old_state.custom {
                push_step(&mut assembled, Some(old_state.clone()));
                continue;
            }
            let Some(id) = &old_state.id else {
                push_step(&mut assembled, Some(old_state.clone()));
                continue;
            };
            self.ensure_loaded(old_state, old).await?;
            let (new_id, new_inputs, new_outputs, _status) = self
                .registry
                .read(old_state.provider.as_ref(), &old_state.urn, id, &old_state.inputs, &old_state.outputs)
                .await?;

            if new_id.is_empty() {
                info!(urn = %old_state.urn, "refresh observed deletion, removing from snapshot");
                steps.push(Step::delete(old_state.clone()));
                continue;
            }

            let mut refreshed = old_state.clone();
            refreshed.id = Some(new_id);
            refreshed.inputs = new_inputs;
            refreshed.outputs = new_outputs;
            push_step(&mut assembled, Some(refreshed.clone()));
            steps.push(Step::read(old_state.clone(), refreshed));
        }

        assembled.check_integrity().map_err(|e| {
            PlannerError::SnapshotIntegrity(Urn::new("unknown", "unknown", "", "pulumi:engine:diagnostic", "refresh"), e.to_string())
        })?;
        Ok(PlanOutcome::Completed { steps, snapshot: assembled, issues: Vec::new() })
    }

    async fn plan_one(
        &self,
        registration: &Registration,
        old_state: Option<&ResourceState>,
        old: &Snapshot,
        preview: bool,
    ) -> PlannerResult<Decision> {
        if registration.custom && !registration.urn.is_provider_type() && registration.provider.is_none() {
            return Err(PlannerError::MissingProvider(registration.urn.clone()));
        }

        // Step 1: if the URN carries over with an unchanged type, ensure
        // its provider is resolved (loaded+configured, and shared if this
        // resource has its own provider reference) under the old identity.
        let type_unchanged = old_state.is_some_and(|s| s.type_ == registration.type_);
        if let (Some(state), true) = (old_state, type_unchanged) {
            self.ensure_loaded(state, old).await?;
        }

        // Step 2: autonaming.
        let resolved = self.naming.resolve(registration.urn.package(), registration.urn.own_type());
        let mut inputs = registration.inputs.clone();
        if let Some(proposed) = self.naming.propose_name(&registration.urn, &resolved.strategy)
            && !inputs.contains_key(PROPOSED_NAME_KEY)
        {
            inputs.insert(PROPOSED_NAME_KEY.to_string(), PropertyValue::String(proposed));
        }
        if resolved.warn_if_no_support && !resolved.strategy.requires_delete_before_replace() {
            warn!(urn = %registration.urn, "provider may not honor the requested autonaming strategy");
        }

        // Step 3: resource-level Check.
        let olds = old_state.map(|s| s.inputs.clone()).unwrap_or_default();
        let (checked_inputs, failures) =
            self.registry.resource_check(registration.provider.as_ref(), &registration.urn, &olds, &inputs).await?;
        if !failures.is_empty() {
            return Err(PlannerError::CheckFailed { urn: registration.urn.clone(), failures });
        }

        let Some(old_state) = old_state else {
            let new_state = build_state(registration, &checked_inputs, &self.registry, old, preview).await?;
            return Ok(Decision::Create(new_state));
        };

        if !type_unchanged {
            return Ok(Decision::NaturalReplace(resolved.strategy.requires_delete_before_replace()));
        }

        let diff = self
            .registry
            .diff(
                registration.provider.as_ref(),
                &registration.urn,
                old_state.id.as_ref().unwrap_or(&Id::default()),
                &old_state.inputs,
                &old_state.outputs,
                &checked_inputs,
            )
            .await?;

        let unknown_transition = checked_inputs.iter().any(|(k, v)| {
            let was_unknown = old_state.outputs.get(k).is_some_and(PropertyValue::is_unknown);
            was_unknown != v.is_unknown()
        });

        match diff.change {
            DiffKind::None if !unknown_transition => Ok(Decision::Same(old_state.clone())),
            DiffKind::Some if diff.replace_keys.is_empty() && !resolved.strategy.requires_delete_before_replace() && !unknown_transition => {
                let (outputs, _status) = self
                    .registry
                    .update(
                        registration.provider.as_ref(),
                        &registration.urn,
                        old_state.id.as_ref().unwrap_or(&Id::default()),
                        &old_state.inputs,
                        &old_state.outputs,
                        &checked_inputs,
                        preview,
                    )
                    .await?;
                let mut new_state = old_state.clone();
                new_state.inputs = checked_inputs;
                new_state.outputs = outputs;
                new_state.parent = registration.parent.clone();
                new_state.dependencies = registration.dependencies.clone();
                new_state.property_dependencies = registration.property_dependencies.clone();
                new_state.protect = registration.protect;
                new_state.retain_on_delete = registration.retain_on_delete;
                Ok(Decision::Update(old_state.clone(), new_state))
            }
            _ => Ok(Decision::NaturalReplace(
                diff.delete_before_replace || resolved.strategy.requires_delete_before_replace(),
            )),
        }
    }

    /// Makes sure a resource's provider is resolved before the registry's
    /// `Delete`/`Read` is invoked. Touching a resource that was never
    /// otherwise visited this pass (e.g. the post-pass sweep, `Destroy`, or
    /// `Refresh`) would otherwise hit the registry's idempotent "no plugin
    /// loaded" no-op instead of actually calling the provider.
    ///
    /// A resource that carries its own `provider` reference is resolved via
    /// the shared [`ProviderRegistry::resolve_provider`], keyed on the
    /// *provider's* own urn/id, looking up the provider's own live state in
    /// `old` to configure it if it isn't already loaded. A resource with no
    /// provider reference (a provider itself, or a component) falls back to
    /// the original self-referential `same`.
    async fn ensure_loaded(&self, state: &ResourceState, old: &Snapshot) -> PlannerResult<()> {
        if !state.custom || state.id.is_none() {
            return Ok(());
        }
        match &state.provider {
            Some(reference) => {
                self.registry.resolve_provider(reference, old.live(reference.urn())).await?;
            }
            None => {
                self.registry.same(state).await?;
            }
        }
        Ok(())
    }

    async fn create_new_state(
        &self,
        registration: &Registration,
        old: &Snapshot,
        preview: bool,
    ) -> PlannerResult<ResourceState> {
        let resolved = self.naming.resolve(registration.urn.package(), registration.urn.own_type());
        let mut inputs = registration.inputs.clone();
        if let Some(proposed) = self.naming.propose_name(&registration.urn, &resolved.strategy)
            && !inputs.contains_key(PROPOSED_NAME_KEY)
        {
            inputs.insert(PROPOSED_NAME_KEY.to_string(), PropertyValue::String(proposed));
        }
        build_state(registration, &inputs, &self.registry, old, preview).await
    }
}

enum Decision {
    Same(ResourceState),
    Create(ResourceState),
    Update(ResourceState, ResourceState),
    /// Carries the delete-before-replace ordering flag.
    NaturalReplace(bool),
}

async fn build_state(
    registration: &Registration,
    inputs: &PropertyMap,
    registry: &ProviderRegistry,
    old: &Snapshot,
    preview: bool,
) -> PlannerResult<ResourceState> {
    if let Some(reference) = &registration.provider {
        registry.resolve_provider(reference, old.live(reference.urn())).await?;
    }
    let (id, outputs, status) = registry.create(registration.provider.as_ref(), &registration.urn, inputs, preview).await?;
    if status == OpStatus::Partial {
        warn!(urn = %registration.urn, "create reported partial success");
    }
    let mut state = ResourceState::new(registration.urn.clone(), registration.type_.clone());
    state.id = Some(id);
    state.custom = registration.custom;
    state.parent = registration.parent.clone();
    state.provider = registration.provider.clone();
    state.inputs = inputs.clone();
    state.outputs = outputs;
    state.dependencies = registration.dependencies.clone();
    state.property_dependencies = registration.property_dependencies.clone();
    state.deleted_with = registration.deleted_with.clone();
    state.protect = registration.protect;
    state.retain_on_delete = registration.retain_on_delete;
    state.aliases = registration.aliases.clone();
    Ok(state)
}

fn registration_from_state(state: &ResourceState) -> Registration {
    Registration {
        urn: state.urn.clone(),
        type_: state.type_.clone(),
        custom: state.custom,
        parent: state.parent.clone(),
        provider: state.provider.clone(),
        inputs: state.inputs.clone(),
        dependencies: state.dependencies.clone(),
        property_dependencies: state.property_dependencies.clone(),
        deleted_with: state.deleted_with.clone(),
        protect: state.protect,
        retain_on_delete: state.retain_on_delete,
        aliases: state.aliases.clone(),
    }
}

fn placeholder_states(registrations: &[Registration]) -> Vec<ResourceState> {
    registrations
        .iter()
        .map(|r| {
            let mut state = ResourceState::new(r.urn.clone(), r.type_.clone());
            state.custom = r.custom;
            state.parent = r.parent.clone();
            state.provider = r.provider.clone();
            state.dependencies = r.dependencies.clone();
            state.property_dependencies = r.property_dependencies.clone();
            state
        })
        .collect()
}

fn transitive_dependencies(graph: &DependencyGraph, targets: &HashSet<Urn>) -> HashSet<Urn> {
    let mut included: HashSet<Urn> = targets.clone();
    let mut frontier: Vec<Urn> = targets.iter().cloned().collect();
    while let Some(urn) = frontier.pop() {
        for dep in graph.dependencies_of(&urn) {
            if included.insert(dep.clone()) {
                frontier.push(dep.clone());
            }
        }
    }
    included
}

fn push_step(snapshot: &mut Snapshot, state: Option<ResourceState>) {
    if let Some(state) = state {
        snapshot.resources.push(state);
    }
}

/// Assembles a partial snapshot from whatever provisional steps had been
/// committed before a cancellation was observed (spec §5 Bail semantics).
fn snapshot_from_committed(old: &Snapshot, committed: &[Step]) -> Snapshot {
    let mut assembled = Snapshot { manifest: old.manifest.clone(), ..Snapshot::new() };
    for step in committed {
        if let Some(state) = &step.new {
            assembled.resources.push(state.clone());
        }
    }
    assembled
}
