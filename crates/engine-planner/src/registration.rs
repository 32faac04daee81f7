//! [`Registration`] — one resource as declared by the running user program.

use std::collections::BTreeMap;

use engine_core::{ProviderReference, PropertyMap, Urn};

/// A resource registration from the user program's current run, in the
/// order the program declared them (must be topologically ordered — see
/// [`engine_graph::DependencyGraph::build`]).
#[derive(Debug, Clone)]
pub struct Registration {
    /// The resource's URN.
    pub urn: Urn,
    /// The resource's type token.
    pub type_: String,
    /// `false` for a component (non-custom) resource.
    pub custom: bool,
    /// The URN of this resource's parent, if any.
    pub parent: Option<Urn>,
    /// The provider responsible for this resource's CRUD. Required for
    /// custom resources that are not themselves a provider.
    pub provider: Option<ProviderReference>,
    /// The resource's requested input properties.
    pub inputs: PropertyMap,
    /// Explicit dependency URNs (from `dependsOn`).
    pub dependencies: Vec<Urn>,
    /// Per-property dependency URNs.
    pub property_dependencies: BTreeMap<String, Vec<Urn>>,
    /// A URN this resource is considered deleted together with.
    pub deleted_with: Option<Urn>,
    /// If true, deleting this resource is refused.
    pub protect: bool,
    /// If true, deleting this resource does not invoke the provider's Delete.
    pub retain_on_delete: bool,
    /// Alternate URNs this registration is also known by.
    pub aliases: Vec<Urn>,
}

impl Registration {
    /// A minimal custom resource registration with no provider or inputs —
    /// a test fixture builder starting point.
    pub fn new(urn: Urn, type_: impl Into<String>) -> Self {
        Registration {
            urn,
            type_: type_.into(),
            custom: true,
            parent: None,
            provider: None,
            inputs: PropertyMap::new(),
            dependencies: Vec::new(),
            property_dependencies: BTreeMap::new(),
            deleted_with: None,
            protect: false,
            retain_on_delete: false,
            aliases: Vec::new(),
        }
    }
}
