//! [`ResourceState`] — the persistent record for one managed resource.

use serde::{Deserialize, Serialize};

use crate::reference::ProviderReference;
use crate::urn::Urn;
use crate::value::PropertyMap;

/// The persisted state of one resource, as it appears in a [`Snapshot`](crate::snapshot::Snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// The resource's URN. Required.
    pub urn: Urn,
    /// The resource's type token (redundant with `urn.own_type()` but kept
    /// as its own field to match the persisted wire format). Required.
    pub type_: String,
    /// The provider-assigned physical ID, if created.
    #[serde(default)]
    pub id: Option<crate::id::Id>,
    /// `false` for a component (non-custom) resource.
    #[serde(default = "default_custom")]
    pub custom: bool,
    /// The URN of this resource's parent, if any.
    #[serde(default)]
    pub parent: Option<Urn>,
    /// The provider reference string responsible for this resource's CRUD.
    #[serde(default)]
    pub provider: Option<ProviderReference>,
    /// The resource's input properties as last registered.
    #[serde(default)]
    pub inputs: PropertyMap,
    /// The resource's output properties as last returned by the provider.
    #[serde(default)]
    pub outputs: PropertyMap,
    /// Explicit dependency URNs (from `dependsOn`).
    #[serde(default)]
    pub dependencies: Vec<Urn>,
    /// Per-property dependency URNs.
    #[serde(default)]
    pub property_dependencies: std::collections::BTreeMap<String, Vec<Urn>>,
    /// A URN this resource is considered deleted together with.
    #[serde(default)]
    pub deleted_with: Option<Urn>,
    /// If true, deleting this resource requires explicit confirmation.
    #[serde(default)]
    pub protect: bool,
    /// If true, deleting this resource does not invoke the provider's Delete.
    #[serde(default)]
    pub retain_on_delete: bool,
    /// True when this resource is queued for a deferred (create-first) replace.
    #[serde(default)]
    pub pending_replacement: bool,
    /// True when this entry is the old, superseded copy kept only for
    /// cleanup (a second entry with the same URN and `delete == false` may
    /// coexist during a pending replace).
    #[serde(default)]
    pub delete: bool,
    /// Alternate URNs this resource is also known by (for renames/migrations).
    #[serde(default)]
    pub aliases: Vec<Urn>,
}

fn default_custom() -> bool {
    true
}

impl ResourceState {
    /// A minimal custom resource with no provider, inputs, or outputs set —
    /// useful as a test fixture builder starting point.
    pub fn new(urn: Urn, type_: impl Into<String>) -> Self {
        ResourceState {
            urn,
            type_: type_.into(),
            id: None,
            custom: true,
            parent: None,
            provider: None,
            inputs: PropertyMap::new(),
            outputs: PropertyMap::new(),
            dependencies: Vec::new(),
            property_dependencies: std::collections::BTreeMap::new(),
            deleted_with: None,
            protect: false,
            retain_on_delete: false,
            pending_replacement: false,
            delete: false,
            aliases: Vec::new(),
        }
    }

    /// All URNs this resource directly refers to: `parent`, every entry in
    /// `dependencies`, every URN across `property_dependencies`, and the URN
    /// half of `provider` if set. Does not include `deleted_with` (that
    /// relation does not imply ordering the same way).
    pub fn referenced_urns(&self) -> Vec<&Urn> {
        let mut out: Vec<&Urn> = Vec::new();
        if let Some(p) = &self.parent {
            out.push(p);
        }
        out.extend(self.dependencies.iter());
        for urns in self.property_dependencies.values() {
            out.extend(urns.iter());
        }
        if let Some(provider) = &self.provider {
            out.push(provider.urn());
        }
        out
    }
}
