//! [`DependencyGraph`] construction and queries (spec §4.2).

use std::collections::{HashMap, HashSet};

use engine_core::{ResourceState, Urn};
use tracing::warn;

use crate::error::{GraphError, GraphResult};

/// A dependency graph built from a topologically-ordered resource sequence.
///
/// Nodes are resources, identified by their index in the input sequence.
/// Edges point from a resource to the resources it depends on (its
/// `Dependencies`, its provider, and — after component expansion — anything
/// that transitively depends on one of its component ancestors).
#[derive(Debug)]
pub struct DependencyGraph {
    urns: Vec<Urn>,
    index_of: HashMap<Urn, usize>,
    /// Outgoing edges: `edges[i]` is the set of nodes `i` depends on.
    edges: Vec<HashSet<usize>>,
    /// Incoming edges: `reverse[i]` is the set of nodes that depend on `i`.
    reverse: Vec<HashSet<usize>>,
}

impl DependencyGraph {
    /// Builds a graph from a topologically-ordered resource sequence.
    pub fn build(resources: &[ResourceState]) -> GraphResult<Self> {
        let urns: Vec<Urn> = resources.iter().map(|r| r.urn.clone()).collect();
        let final_index: HashMap<Urn, usize> = urns
            .iter()
            .enumerate()
            .map(|(i, u)| (u.clone(), i))
            .collect();

        let mut index_of: HashMap<Urn, usize> = HashMap::new();
        let mut edges: Vec<HashSet<usize>> = vec![HashSet::new(); resources.len()];

        // Step 1 + 2: allocate nodes and add dependency/provider edges,
        // checking each referenced URN has already been registered.
        for (i, resource) in resources.iter().enumerate() {
            let mut references: Vec<&Urn> = resource.dependencies.iter().collect();
            for urns in resource.property_dependencies.values() {
                references.extend(urns.iter());
            }
            if let Some(provider) = &resource.provider {
                references.push(provider.urn());
            }

            for reference in references {
                let &target = index_of.get(reference).ok_or_else(|| {
                    if final_index.contains_key(reference) {
                        GraphError::CyclicInput(reference.clone())
                    } else {
                        GraphError::UnknownUrn(reference.clone())
                    }
                })?;
                edges[i].insert(target);
            }

            index_of.insert(resource.urn.clone(), i);
        }

        // Step 3: component expansion.
        for i in 0..resources.len() {
            let mut ancestor = resources[i].parent.clone();
            while let Some(parent_urn) = ancestor {
                let Some(&parent_idx) = index_of.get(&parent_urn) else {
                    break;
                };
                if resources[parent_idx].custom {
                    break;
                }
                let dependers: Vec<usize> = (0..resources.len())
                    .filter(|&x| x != i && edges[x].contains(&parent_idx))
                    .collect();
                for x in dependers {
                    if x == i || reaches(&edges, i, x) {
                        continue;
                    }
                    edges[x].insert(i);
                }
                ancestor = resources[parent_idx].parent.clone();
            }
        }

        // Step 4: parent edges, added last so they don't feed expansion.
        for (i, resource) in resources.iter().enumerate() {
            if let Some(parent) = &resource.parent {
                if let Some(&parent_idx) = index_of.get(parent) {
                    edges[i].insert(parent_idx);
                } else {
                    warn!(urn = %resource.urn, parent = %parent, "parent URN not present in graph input");
                }
            }
        }

        let mut reverse: Vec<HashSet<usize>> = vec![HashSet::new(); resources.len()];
        for (i, targets) in edges.iter().enumerate() {
            for &t in targets {
                reverse[t].insert(i);
            }
        }

        Ok(DependencyGraph { urns, index_of, edges, reverse })
    }

    /// The immediate outgoing neighbors of `urn` — what it directly depends
    /// on, in input order.
    pub fn dependencies_of(&self, urn: &Urn) -> Vec<&Urn> {
        let Some(&i) = self.index_of.get(urn) else {
            return Vec::new();
        };
        let mut targets: Vec<usize> = self.edges[i].iter().copied().collect();
        targets.sort_unstable();
        targets.into_iter().map(|t| &self.urns[t]).collect()
    }

    /// All nodes transitively reverse-reachable from `urn` (i.e. everything
    /// that depends on it, directly or via component expansion), excluding
    /// `urn` itself and anything in `ignore`. Returned in input topological
    /// order.
    pub fn depending_on(&self, urn: &Urn, ignore: &HashSet<Urn>) -> Vec<&Urn> {
        let Some(&start) = self.index_of.get(urn) else {
            return Vec::new();
        };
        let mut seen: HashSet<usize> = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            for &next in &self.reverse[node] {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        let mut result: Vec<usize> = seen
            .into_iter()
            .filter(|&i| i != start && !ignore.contains(&self.urns[i]))
            .collect();
        result.sort_unstable();
        result.into_iter().map(|i| &self.urns[i]).collect()
    }
}

/// Depth-first reachability check over the current edge set: does `from`
/// reach `to` by following outgoing edges?
fn reaches(edges: &[HashSet<usize>], from: usize, to: usize) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        stack.extend(edges[node].iter().copied());
    }
    false
}
