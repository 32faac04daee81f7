//! [`Step`] — one unit of planned work against a resource (spec §4.5).

use engine_core::{ResourceState, Urn};

/// The kind of change a [`Step`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// No change; the resource carries over unmodified.
    Same,
    /// The resource did not exist and was created.
    Create,
    /// The resource was updated in place.
    Update,
    /// The first half of a replace pair: the new resource was created.
    ReplaceCreate,
    /// The second half of a replace pair: the old resource was deleted.
    ReplaceDelete,
    /// The resource existed in the old snapshot but not the new program.
    Delete,
    /// A `Read` refresh against ground truth.
    Read,
}

/// One planned unit of work.
#[derive(Debug, Clone)]
pub struct Step {
    /// What kind of change this step performs.
    pub kind: StepKind,
    /// The URN this step acts on.
    pub urn: Urn,
    /// The resource's state before this step, if it existed.
    pub old: Option<ResourceState>,
    /// The resource's state after this step, if it exists afterward.
    pub new: Option<ResourceState>,
    /// Whether this step reflects a user-visible change. `Same` steps (and
    /// the carried-over state of out-of-target resources) are not logical.
    pub logical: bool,
}

impl Step {
    /// Builds a `Same` step: the resource carries over unchanged.
    pub fn same(state: ResourceState) -> Self {
        Step { kind: StepKind::Same, urn: state.urn.clone(), old: Some(state.clone()), new: Some(state), logical: false }
    }

    /// Builds a `Create` step.
    pub fn create(new: ResourceState) -> Self {
        Step { kind: StepKind::Create, urn: new.urn.clone(), old: None, new: Some(new), logical: true }
    }

    /// Builds an `Update` step.
    pub fn update(old: ResourceState, new: ResourceState) -> Self {
        Step { kind: StepKind::Update, urn: new.urn.clone(), old: Some(old), new: Some(new), logical: true }
    }

    /// Builds a `ReplaceCreate` step — the new half of a replace pair.
    pub fn replace_create(old: ResourceState, new: ResourceState) -> Self {
        Step { kind: StepKind::ReplaceCreate, urn: new.urn.clone(), old: Some(old), new: Some(new), logical: true }
    }

    /// Builds a `ReplaceDelete` step — the old half of a replace pair.
    pub fn replace_delete(old: ResourceState) -> Self {
        Step { kind: StepKind::ReplaceDelete, urn: old.urn.clone(), old: Some(old), new: None, logical: true }
    }

    /// Builds a `Delete` step.
    pub fn delete(old: ResourceState) -> Self {
        Step { kind: StepKind::Delete, urn: old.urn.clone(), old: Some(old), new: None, logical: true }
    }

    /// Builds a `Read` (refresh) step.
    pub fn read(old: ResourceState, new: ResourceState) -> Self {
        Step { kind: StepKind::Read, urn: new.urn.clone(), old: Some(old), new: Some(new), logical: true }
    }
}
