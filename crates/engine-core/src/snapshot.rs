//! [`Snapshot`] — the ordered, persisted record of all managed resources.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{SnapshotError, SnapshotResult};
use crate::resource::ResourceState;
use crate::urn::Urn;

/// Manifest metadata carried alongside the resource list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the engine that produced this snapshot.
    pub engine_version: String,
    /// Format magic value, checked on load.
    pub magic: String,
}

/// An ordered sequence of resource states plus manifest metadata.
///
/// The ordering invariant (spec §3): for every resource `R` with a
/// parent/dependency/provider `U`, `U` appears earlier in `resources` than
/// `R`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Manifest metadata.
    pub manifest: Manifest,
    /// The ordered resource list.
    pub resources: Vec<ResourceState>,
}

impl Snapshot {
    /// An empty snapshot with default manifest metadata.
    pub fn new() -> Self {
        Snapshot::default()
    }

    /// Finds the (last) entry for `urn` whose `delete` flag is `false`, if any.
    pub fn live(&self, urn: &Urn) -> Option<&ResourceState> {
        self.resources.iter().find(|r| &r.urn == urn && !r.delete)
    }

    /// Validates all five snapshot integrity invariants from spec §3.
    /// Returns the first violation found.
    pub fn check_integrity(&self) -> SnapshotResult<()> {
        let mut seen_live: HashSet<&Urn> = HashSet::new();
        let mut seen_any: HashSet<&Urn> = HashSet::new();

        for (idx, resource) in self.resources.iter().enumerate() {
            // Invariant 2: at most one live entry per URN.
            if !resource.delete {
                if !seen_live.insert(&resource.urn) {
                    return Err(SnapshotError::DuplicateLiveEntry(resource.urn.clone()));
                }
            }
            seen_any.insert(&resource.urn);

            // Invariant 1: every referenced URN resolves to an earlier entry.
            for (reference, via) in resource
                .referenced_urns()
                .into_iter()
                .map(|u| (u, "parent/dependency/provider"))
            {
                let earlier = self.resources[..idx].iter().any(|r| &r.urn == reference);
                if !earlier {
                    return Err(SnapshotError::DanglingReference {
                        urn: resource.urn.clone(),
                        reference: reference.clone(),
                        via,
                    });
                }
            }
            if let Some(deleted_with) = &resource.deleted_with {
                let earlier = self.resources[..idx].iter().any(|r| &r.urn == deleted_with);
                if !earlier {
                    return Err(SnapshotError::DanglingReference {
                        urn: resource.urn.clone(),
                        reference: deleted_with.clone(),
                        via: "deleted_with",
                    });
                }
            }

            // Invariant 3: a provider reference's URN entry must be a provider type.
            if let Some(provider) = &resource.provider {
                if !provider.urn().is_provider_type() {
                    return Err(SnapshotError::NotAProvider {
                        urn: resource.urn.clone(),
                        provider_urn: provider.urn().clone(),
                    });
                }
            }

            // Invariant 5: a custom resource needs a provider unless builtin.
            if resource.custom
                && resource.provider.is_none()
                && !is_builtin_package(resource.urn.package())
            {
                return Err(SnapshotError::MissingProvider(resource.urn.clone()));
            }
        }

        // Invariant 4: no cycles in the union of parent/dependency edges.
        self.check_acyclic()?;

        Ok(())
    }

    fn check_acyclic(&self) -> SnapshotResult<()> {
        use std::collections::HashMap;

        let index_of: HashMap<&Urn, usize> = self
            .resources
            .iter()
            .enumerate()
            .map(|(i, r)| (&r.urn, i))
            .collect();

        let edges: Vec<Vec<usize>> = self
            .resources
            .iter()
            .map(|r| {
                let mut targets: Vec<usize> = r
                    .referenced_urns()
                    .into_iter()
                    .filter_map(|u| index_of.get(u).copied())
                    .collect();
                if let Some(parent) = &r.parent
                    && let Some(&i) = index_of.get(parent)
                {
                    targets.push(i);
                }
                targets
            })
            .collect();

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.resources.len()];

        fn visit(
            node: usize,
            edges: &[Vec<usize>],
            marks: &mut [Mark],
            urns: &[Urn],
        ) -> SnapshotResult<()> {
            match marks[node] {
                Mark::Done => return Ok(()),
                Mark::InProgress => return Err(SnapshotError::Cycle(urns[node].clone())),
                Mark::Unvisited => {}
            }
            marks[node] = Mark::InProgress;
            for &next in &edges[node] {
                visit(next, edges, marks, urns)?;
            }
            marks[node] = Mark::Done;
            Ok(())
        }

        let urns: Vec<Urn> = self.resources.iter().map(|r| r.urn.clone()).collect();
        for i in 0..self.resources.len() {
            visit(i, &edges, &mut marks, &urns)?;
        }
        Ok(())
    }
}

/// Packages the engine implements intrinsically (stack, the pulumi provider
/// meta-package itself) and that do not require an explicit provider.
fn is_builtin_package(package: &str) -> bool {
    matches!(package, "pulumi" | "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use crate::reference::ProviderReference;

    fn provider_urn(name: &str) -> Urn {
        Urn::new("dev", "proj", "", "pulumi:providers:random", name)
    }

    fn custom_urn(name: &str) -> Urn {
        Urn::new("dev", "proj", "", "random:index/randomPet:RandomPet", name)
    }

    #[test]
    fn empty_snapshot_is_valid() {
        assert!(Snapshot::new().check_integrity().is_ok());
    }

    #[test]
    fn dangling_dependency_is_rejected() {
        let mut r = ResourceState::new(custom_urn("pet-0"), "random:index/randomPet:RandomPet");
        r.dependencies.push(custom_urn("ghost"));
        r.provider = Some(
            ProviderReference::new(provider_urn("default"), Id::new("1")).unwrap(),
        );
        let snap = Snapshot {
            manifest: Manifest::default(),
            resources: vec![r],
        };
        assert!(matches!(
            snap.check_integrity(),
            Err(SnapshotError::DanglingReference { .. })
        ));
    }

    #[test]
    fn duplicate_live_entries_are_rejected() {
        let provider = ResourceState::new(provider_urn("default"), "pulumi:providers:random");
        let mut dup = provider.clone();
        dup.id = Some(Id::new("2"));
        let snap = Snapshot {
            manifest: Manifest::default(),
            resources: vec![provider, dup],
        };
        assert!(matches!(
            snap.check_integrity(),
            Err(SnapshotError::DuplicateLiveEntry(_))
        ));
    }

    #[test]
    fn superseded_copy_with_delete_flag_is_allowed() {
        let provider = ResourceState::new(provider_urn("default"), "pulumi:providers:random");
        let mut old = provider.clone();
        old.delete = true;
        let snap = Snapshot {
            manifest: Manifest::default(),
            resources: vec![old, provider],
        };
        assert!(snap.check_integrity().is_ok());
    }

    #[test]
    fn custom_resource_without_provider_is_rejected() {
        let r = ResourceState::new(custom_urn("pet-0"), "random:index/randomPet:RandomPet");
        let snap = Snapshot {
            manifest: Manifest::default(),
            resources: vec![r],
        };
        assert!(matches!(
            snap.check_integrity(),
            Err(SnapshotError::MissingProvider(_))
        ));
    }

    #[test]
    fn constructing_a_non_provider_reference_is_rejected_at_the_source() {
        // `ProviderReference::new`/`parse` refuse non-provider URNs, so
        // invariant 3 can never actually be violated through the public
        // API — this documents that guarantee rather than poking at
        // `check_integrity` directly.
        let other = custom_urn("other");
        assert!(ProviderReference::new(other, Id::new("1")).is_err());
    }

    #[test]
    fn cyclic_dependencies_are_rejected() {
        let mut a = ResourceState::new(custom_urn("a"), "random:index/randomPet:RandomPet");
        let mut b = ResourceState::new(custom_urn("b"), "random:index/randomPet:RandomPet");
        a.provider = Some(ProviderReference::new(provider_urn("default"), Id::new("1")).unwrap());
        b.provider = a.provider.clone();
        b.dependencies.push(a.urn.clone());
        a.dependencies.push(b.urn.clone());
        let provider = ResourceState::new(provider_urn("default"), "pulumi:providers:random");
        let snap = Snapshot {
            manifest: Manifest::default(),
            resources: vec![provider, a, b],
        };
        // Both a and b reference each other before either is fully earlier,
        // so invariant 1 (dangling reference) fires before we'd ever reach
        // the cycle check — this is intentional: a non-topological input is
        // caught as a dangling forward reference.
        assert!(snap.check_integrity().is_err());
    }
}
