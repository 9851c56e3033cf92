use std::collections::BTreeMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use unicase::UniCase;
use warren_common::Manifest;
use warren_fetch::Package;
use warren_spec::PackageSpec;

use crate::graph::Graph;

#[derive(Debug, Clone)]
pub struct Node {
    /// Index of this Node inside its [`Graph`].
    pub(crate) idx: NodeIndex,
    /// Resolved [`Package`] for this Node.
    pub(crate) package: Package,
    /// Resolved [`Manifest`] for this Node.
    pub(crate) manifest: Manifest,
    /// Name-indexed map of outgoing requirement edges from this Node. The
    /// *incoming* edges of a node are its requiredby set.
    pub(crate) dependencies: BTreeMap<UniCase<String>, EdgeIndex>,
    /// Parent, if any, of this Node in the logical filesystem hierarchy.
    pub(crate) parent: Option<NodeIndex>,
    /// Children of this node in the logical filesystem hierarchy. These are
    /// not necessarily dependencies, and this Node's dependencies may not all
    /// be in this map.
    pub(crate) children: BTreeMap<UniCase<String>, NodeIndex>,
    /// The first requirement descriptor this node was placed for.
    pub(crate) requested: Option<PackageSpec>,
    /// Additional requirement descriptors this node turned out to satisfy.
    pub(crate) constraints: Vec<PackageSpec>,
    /// True once this node's own dependencies have been expanded.
    pub(crate) loaded: bool,
    /// True for nodes read back from disk when seeding an ideal tree.
    pub(crate) seeded: bool,
    /// Hoist barrier: upward placement and satisfaction walks stop here.
    /// Set on direct dev-dependency children of the root, so dev-only
    /// transitives never influence runtime placement.
    pub(crate) hoist_barrier: bool,
}

impl Node {
    pub(crate) fn new(package: Package, manifest: Manifest) -> Self {
        Self {
            package,
            manifest,
            idx: NodeIndex::new(0),
            parent: None,
            children: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            requested: None,
            constraints: Vec::new(),
            loaded: false,
            seeded: false,
            hoist_barrier: false,
        }
    }

    pub(crate) fn name(&self) -> UniCase<String> {
        UniCase::new(self.package.name().to_string())
    }

    /// This Node's depth in the logical filesystem hierarchy.
    pub(crate) fn depth(&self, graph: &Graph) -> usize {
        graph.node_path(self.idx).len()
    }

    /// Record that this node now also satisfies `spec`. The first descriptor
    /// becomes `requested`; later distinct ones accumulate as constraints.
    pub(crate) fn merge_requested(&mut self, spec: &PackageSpec) {
        match &self.requested {
            None => self.requested = Some(spec.clone()),
            Some(prev) if prev != spec && !self.constraints.contains(spec) => {
                self.constraints.push(spec.clone())
            }
            _ => {}
        }
    }
}
