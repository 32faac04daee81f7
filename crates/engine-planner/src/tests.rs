use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use engine_core::{
    CheckFailure, DiffKind, DiffResult, HostError, Id, OpStatus, ParameterizeResponse, PluginHost,
    Provider, ProviderResult, PropertyMap, PropertyValue, ResourceState, Snapshot, Urn,
};
use engine_naming::NamingConfig;
use engine_registry::ProviderRegistry;
use tokio_util::sync::CancellationToken;

use crate::planner::{PlanOutcome, Planner};
use crate::registration::Registration;
use crate::step::StepKind;

/// State shared across the provider-type `MockProvider` instance (created
/// once, on first resolution of `provider_urn()`) and any self-referential
/// instances `MockHost::load` hands out for the provider's own Check/Diff.
/// `loads` counts `MockHost::load` calls, so tests can assert the registry
/// resolves a resource's provider reference to one shared instance instead
/// of loading a fresh plugin per dependent resource.
#[derive(Default)]
struct SharedState {
    diffs: Mutex<HashMap<Urn, DiffResult>>,
    creates: Mutex<Vec<Urn>>,
    deletes: Mutex<Vec<Urn>>,
    check_failures: Mutex<HashMap<Urn, Vec<CheckFailure>>>,
    loads: AtomicUsize,
}

struct MockProvider {
    shared: Arc<SharedState>,
}

#[async_trait]
impl Provider for MockProvider {
    async fn handshake(&self, _engine_info: &serde_json::Value) -> ProviderResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn parameterize(&self, name: &str, _version: &str, _bytes: &[u8]) -> ProviderResult<ParameterizeResponse> {
        Ok(ParameterizeResponse { name: name.to_string() })
    }

    async fn check_config(
        &self,
        _urn: &Urn,
        _olds: &PropertyMap,
        news: &PropertyMap,
        _allow_unknowns: bool,
    ) -> ProviderResult<(PropertyMap, Vec<CheckFailure>)> {
        Ok((news.clone(), Vec::new()))
    }

    async fn diff_config(
        &self,
        _urn: &Urn,
        _old_inputs: &PropertyMap,
        _old_outputs: &PropertyMap,
        _new_inputs: &PropertyMap,
    ) -> ProviderResult<DiffResult> {
        Ok(DiffResult::none())
    }

    async fn configure(&self, _inputs: &PropertyMap) -> ProviderResult<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn check(
        &self,
        urn: &Urn,
        _olds: &PropertyMap,
        news: &PropertyMap,
    ) -> ProviderResult<(PropertyMap, Vec<CheckFailure>)> {
        let failures = self.shared.check_failures.lock().unwrap().get(urn).cloned().unwrap_or_default();
        Ok((news.clone(), failures))
    }

    async fn diff(
        &self,
        urn: &Urn,
        _id: &Id,
        _old_inputs: &PropertyMap,
        _old_outputs: &PropertyMap,
        _new_inputs: &PropertyMap,
    ) -> ProviderResult<DiffResult> {
        Ok(self.shared.diffs.lock().unwrap().get(urn).cloned().unwrap_or_else(DiffResult::none))
    }

    async fn create(
        &self,
        urn: &Urn,
        props: &PropertyMap,
        preview: bool,
    ) -> ProviderResult<(Id, PropertyMap, OpStatus)> {
        self.shared.creates.lock().unwrap().push(urn.clone());
        let id = if preview { Id::unknown() } else { Id::new(format!("id-{}", urn.name())) };
        Ok((id, props.clone(), OpStatus::Ok))
    }

    async fn update(
        &self,
        _urn: &Urn,
        _id: &Id,
        _old_inputs: &PropertyMap,
        _old_outputs: &PropertyMap,
        new_inputs: &PropertyMap,
        _preview: bool,
    ) -> ProviderResult<(PropertyMap, OpStatus)> {
        Ok((new_inputs.clone(), OpStatus::Ok))
    }

    async fn delete(
        &self,
        urn: &Urn,
        _id: &Id,
        _inputs: &PropertyMap,
        _outputs: &PropertyMap,
    ) -> ProviderResult<OpStatus> {
        self.shared.deletes.lock().unwrap().push(urn.clone());
        Ok(OpStatus::Ok)
    }

    async fn read(
        &self,
        _urn: &Urn,
        id: &Id,
        inputs: &PropertyMap,
        state: &PropertyMap,
    ) -> ProviderResult<(Id, PropertyMap, PropertyMap, OpStatus)> {
        Ok((id.clone(), inputs.clone(), state.clone(), OpStatus::Ok))
    }

    async fn signal_cancellation(&self) -> ProviderResult<()> {
        Ok(())
    }

    async fn close(&self) -> ProviderResult<()> {
        Ok(())
    }
}

struct MockHost {
    shared: Arc<SharedState>,
}

#[async_trait]
impl PluginHost for MockHost {
    async fn load(
        &self,
        _package: &str,
        _version: &str,
        _download_url: Option<&str>,
        _checksums: Option<&PropertyMap>,
    ) -> Result<Arc<dyn Provider>, HostError> {
        self.shared.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockProvider { shared: Arc::clone(&self.shared) }))
    }

    async fn install(&self, _package: &str, _version: &str) -> Result<(), HostError> {
        Ok(())
    }
}

fn urn(name: &str) -> Urn {
    Urn::new("dev", "proj", "", "random:index/randomPet:RandomPet", name)
}

fn provider_source_urn() -> Urn {
    Urn::new("dev", "proj", "", "pulumi:providers:random", "default")
}

fn provider_urn() -> engine_core::ProviderReference {
    engine_core::ProviderReference::new(provider_source_urn(), Id::new("default-provider")).unwrap()
}

fn harness() -> (Planner, Arc<SharedState>) {
    let shared = Arc::new(SharedState::default());
    let registry = Arc::new(ProviderRegistry::new(Arc::new(MockHost { shared: Arc::clone(&shared) }), false));
    let naming = NamingConfig::new("acme", "proj", "dev");
    (Planner::new(registry, naming), shared)
}

/// The provider resource itself, which every test snapshot/registration
/// list must carry so the dependency graph can resolve resources' provider
/// references.
fn provider_state() -> ResourceState {
    let mut state = ResourceState::new(provider_source_urn(), "pulumi:providers:random");
    state.id = Some(Id::new("default-provider"));
    state
}

fn provider_registration() -> Registration {
    Registration::new(provider_source_urn(), "pulumi:providers:random")
}

fn registration(name: &str) -> Registration {
    let mut r = Registration::new(urn(name), "random:index/randomPet:RandomPet");
    r.provider = Some(provider_urn());
    r
}

fn state_for(name: &str, inputs: PropertyMap) -> ResourceState {
    let mut state = ResourceState::new(urn(name), "random:index/randomPet:RandomPet");
    state.id = Some(Id::new(format!("id-{name}")));
    state.provider = Some(provider_urn());
    state.inputs = inputs;
    state.outputs = PropertyMap::new();
    state
}

/// Prepends the provider resource/registration to a test's snapshot and
/// registration lists.
fn with_provider(old: &mut Snapshot, regs: &mut Vec<Registration>) {
    old.resources.insert(0, provider_state());
    regs.insert(0, provider_registration());
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

#[tokio::test]
async fn plan_update_creates_new_resources() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    let mut regs = vec![registration("pet-0")];
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, issues } = outcome else { panic!("expected Completed") };

    assert!(issues.is_empty());
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[1].kind, StepKind::Create);
    assert_eq!(snapshot.resources.len(), 2);
    assert_eq!(shared.creates.lock().unwrap().as_slice(), &[urn("pet-0")]);
}

/// Multiple resources carrying the same `provider` reference must resolve
/// to one shared plugin instance rather than each acquiring their own (spec
/// §4.3/§4.5 step 1 "Resolve the provider via the Registry"): the number of
/// `MockHost::load` calls the provider's own bookkeeping takes must not
/// scale with how many dependent resources share its reference.
#[tokio::test]
async fn plan_update_shares_one_provider_instance_across_dependent_resources() {
    let (planner_one, shared_one) = harness();
    let mut old_one = Snapshot::new();
    let mut regs_one = vec![registration("pet-0")];
    with_provider(&mut old_one, &mut regs_one);
    let outcome_one = planner_one.plan_update(&old_one, &regs_one, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps: steps_one, .. } = outcome_one else { panic!("expected Completed") };
    assert_eq!(steps_one.iter().filter(|s| s.kind == StepKind::Create).count(), 1);

    let (planner_three, shared_three) = harness();
    let mut old_three = Snapshot::new();
    let mut regs_three = vec![registration("pet-0"), registration("pet-1"), registration("pet-2")];
    with_provider(&mut old_three, &mut regs_three);
    let outcome_three = planner_three.plan_update(&old_three, &regs_three, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps: steps_three, .. } = outcome_three else { panic!("expected Completed") };
    assert_eq!(steps_three.iter().filter(|s| s.kind == StepKind::Create).count(), 3);

    assert_eq!(
        shared_one.loads.load(Ordering::SeqCst),
        shared_three.loads.load(Ordering::SeqCst),
        "load count must not scale with the number of resources sharing a provider reference"
    );
}

#[tokio::test]
async fn plan_update_is_a_no_op_when_nothing_changed() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    let mut regs = vec![registration("pet-0")];
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    assert!(steps.iter().all(|s| s.kind == StepKind::Same));
    assert_eq!(snapshot.resources.len(), 2);
    assert!(shared.creates.lock().unwrap().is_empty());
    assert!(shared.deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn plan_update_diffs_some_into_an_update() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    shared.diffs.lock().unwrap().insert(urn("pet-0"), DiffResult { change: DiffKind::Some, ..DiffResult::none() });

    let mut regs = vec![registration("pet-0")];
    regs[0].inputs.insert("length".into(), PropertyValue::Number(2.0));
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    assert_eq!(steps.iter().filter(|s| s.kind == StepKind::Update).count(), 1);
    assert_eq!(snapshot.resources.len(), 2);
}

#[tokio::test]
async fn plan_update_deletes_resources_no_longer_registered() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    let mut regs = Vec::new();
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    assert_eq!(steps.iter().filter(|s| s.kind == StepKind::Delete).count(), 1);
    assert_eq!(snapshot.resources.len(), 1);
    assert_eq!(shared.deletes.lock().unwrap().as_slice(), &[urn("pet-0")]);
}

#[tokio::test]
async fn plan_update_aborts_on_protected_deletion() {
    let (planner, _shared) = harness();
    let mut old = Snapshot::new();
    let mut state = state_for("pet-0", PropertyMap::new());
    state.protect = true;
    old.resources.push(state);
    let mut regs = Vec::new();
    with_provider(&mut old, &mut regs);

    let err = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap_err();
    assert!(matches!(err, crate::error::PlannerError::ProtectedDeletion(u) if u == urn("pet-0")));
}

/// Scenario B (spec §8): `A` replaces, `B` depends on `A` and is otherwise
/// unchanged. Expected step order: `ReplaceCreate(A')`, `ReplaceCreate(B')`,
/// `ReplaceDelete(B)`, `ReplaceDelete(A)`, with `DeleteBeforeReplace=false`.
#[tokio::test]
async fn plan_update_cascades_replace_to_dependents() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("a", PropertyMap::new()));
    let mut b = state_for("b", PropertyMap::new());
    b.dependencies.push(urn("a"));
    old.resources.push(b);

    shared.diffs.lock().unwrap().insert(urn("a"), DiffResult { change: DiffKind::Replace, ..DiffResult::none() });

    let mut reg_a = registration("a");
    reg_a.inputs.insert("length".into(), PropertyValue::Number(3.0));
    let mut reg_b = registration("b");
    reg_b.dependencies.push(urn("a"));
    let mut regs = vec![reg_a, reg_b];
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    let replace_kinds: Vec<StepKind> =
        steps.iter().filter(|s| s.urn != provider_source_urn()).map(|s| s.kind).collect();
    assert_eq!(
        replace_kinds,
        vec![StepKind::ReplaceCreate, StepKind::ReplaceCreate, StepKind::ReplaceDelete, StepKind::ReplaceDelete]
    );
    let replace_urns: Vec<&Urn> = steps.iter().filter(|s| s.urn != provider_source_urn()).map(|s| &s.urn).collect();
    assert_eq!(replace_urns, vec![&urn("a"), &urn("b"), &urn("b"), &urn("a")]);

    assert_eq!(snapshot.resources.len(), 3);
    snapshot.check_integrity().expect("no duplicate live entries");
}

/// When the provider reports `delete_before_replace`, the old resource is
/// deleted before its replacement is created (spec §4.5 "DeleteBeforeReplace
/// flag"), the reverse of the default ordering.
#[tokio::test]
async fn plan_update_honors_delete_before_replace_ordering() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));

    let mut regs = vec![registration("pet-0")];
    regs[0].inputs.insert("length".into(), PropertyValue::Number(5.0));
    with_provider(&mut old, &mut regs);

    shared.diffs.lock().unwrap().insert(
        urn("pet-0"),
        DiffResult { change: DiffKind::Replace, delete_before_replace: true, ..DiffResult::none() },
    );

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    let kinds: Vec<StepKind> =
        steps.iter().filter(|s| s.urn != provider_source_urn()).map(|s| s.kind).collect();
    assert_eq!(kinds, vec![StepKind::ReplaceDelete, StepKind::ReplaceCreate]);

    assert_eq!(snapshot.resources.len(), 2);
    snapshot.check_integrity().expect("no duplicate live entries");
}

#[tokio::test]
async fn refresh_observes_provider_deletion() {
    let (planner, _shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    old.resources.insert(0, provider_state());

    let outcome = planner.refresh(&old, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    assert_eq!(steps.iter().filter(|s| s.kind == StepKind::Read).count(), 2);
    assert_eq!(snapshot.resources.len(), 2);
}

#[tokio::test]
async fn plan_destroy_removes_everything_in_reverse_order() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("a", PropertyMap::new()));
    let mut b = state_for("b", PropertyMap::new());
    b.dependencies.push(urn("a"));
    old.resources.push(b);
    old.resources.insert(0, provider_state());

    let outcome = planner.plan_destroy(&old, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    let delete_urns: Vec<&Urn> = steps.iter().map(|s| &s.urn).collect();
    assert_eq!(delete_urns, vec![&urn("b"), &urn("a"), &provider_source_urn()]);
    assert!(snapshot.resources.is_empty());
    assert_eq!(
        shared.deletes.lock().unwrap().as_slice(),
        &[urn("b"), urn("a"), provider_source_urn()]
    );
}

/// A registration outside the target set (and not a dependency of it) is
/// left as a `Same` step carrying its old state forward untouched, while a
/// targeted registration is planned normally (spec §4.5 "targeted
/// operations").
#[tokio::test]
async fn plan_update_restricts_planning_to_targets_and_their_dependencies() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("a", PropertyMap::new()));
    old.resources.push(state_for("b", PropertyMap::new()));

    shared.diffs.lock().unwrap().insert(urn("b"), DiffResult { change: DiffKind::Some, ..DiffResult::none() });

    let mut regs = vec![registration("a"), registration("b")];
    regs[1].inputs.insert("length".into(), PropertyValue::Number(9.0));
    with_provider(&mut old, &mut regs);

    let targets: std::collections::HashSet<Urn> = std::collections::HashSet::from([urn("b")]);
    let outcome = planner.plan_update(&old, &regs, false, Some(&targets), &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, .. } = outcome else { panic!("expected Completed") };

    let kind_for = |name: &str| steps.iter().find(|s| s.urn == urn(name)).map(|s| s.kind).unwrap();
    assert_eq!(kind_for("a"), StepKind::Same);
    assert_eq!(kind_for("b"), StepKind::Update);
    assert!(shared.creates.lock().unwrap().is_empty());
}

/// `DestroyV2` re-runs the registration stream and deletes whatever wasn't
/// re-registered, exactly like `plan_update`'s post-pass deletion (spec §9).
#[tokio::test]
async fn plan_destroy_v2_deletes_unregistered_resources() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    let mut regs = Vec::new();
    with_provider(&mut old, &mut regs);

    let outcome = planner.plan_destroy_v2(&old, &regs, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, .. } = outcome else { panic!("expected Completed") };

    assert_eq!(steps.iter().filter(|s| s.kind == StepKind::Delete).count(), 1);
    assert_eq!(snapshot.resources.len(), 1);
    assert_eq!(shared.deletes.lock().unwrap().as_slice(), &[urn("pet-0")]);
}

/// A `Check` failure on one resource is recorded as a non-fatal issue
/// alongside the rest of the pass completing normally (spec §7 "independent
/// failures aggregated").
#[tokio::test]
async fn plan_update_surfaces_check_failure_as_an_issue_without_aborting() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    let mut regs = vec![registration("pet-0"), registration("pet-1")];
    with_provider(&mut old, &mut regs);

    shared.check_failures.lock().unwrap().insert(
        urn("pet-0"),
        vec![CheckFailure { property: "length".into(), reason: "must be positive".into() }],
    );

    let outcome = planner.plan_update(&old, &regs, false, None, &cancel()).await.unwrap();
    let PlanOutcome::Completed { steps, snapshot, issues } = outcome else { panic!("expected Completed") };

    assert_eq!(issues.len(), 1);
    assert!(matches!(&issues[0], crate::error::PlannerError::CheckFailed { urn: u, .. } if *u == urn("pet-0")));
    assert!(steps.iter().any(|s| s.urn == urn("pet-1") && s.kind == StepKind::Create));
    assert!(snapshot.resources.iter().any(|r| r.urn == urn("pet-1")));
    assert!(!snapshot.resources.iter().any(|r| r.urn == urn("pet-0")));
}

/// Cooperative cancellation observed mid-pass yields `Bailed` with whatever
/// had already been committed, rather than completing or erroring (spec §4.5
/// "cooperative cancellation").
#[tokio::test]
async fn plan_update_bails_on_cancellation_before_processing_registrations() {
    let (planner, shared) = harness();
    let mut old = Snapshot::new();
    old.resources.push(state_for("pet-0", PropertyMap::new()));
    let mut regs = vec![registration("pet-0")];
    with_provider(&mut old, &mut regs);

    let token = cancel();
    token.cancel();
    let outcome = planner.plan_update(&old, &regs, false, None, &token).await.unwrap();
    let PlanOutcome::Bailed { steps, snapshot } = outcome else { panic!("expected Bailed") };

    assert!(steps.is_empty());
    assert!(snapshot.resources.is_empty());
    assert!(shared.creates.lock().unwrap().is_empty());
}
