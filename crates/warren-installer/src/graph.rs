use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Write as _;
use std::ops::{Index, IndexMut};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use unicase::UniCase;
use warren_common::Manifest;
use warren_fetch::Package;

use crate::edge::{DepType, Edge};
use crate::error::InstallerError;
use crate::node::Node;

/// The package tree: an arena of [`Node`]s with requirement [`Edge`]s
/// between them. The hierarchy (who sits inside whose `node_modules`) lives
/// in each node's `parent`/`children` links; the petgraph edges carry only
/// the requirement relation.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    pub(crate) root: NodeIndex,
    pub(crate) inner: StableGraph<Node, Edge>,
}

impl Index<NodeIndex> for Graph {
    type Output = Node;

    fn index(&self, index: NodeIndex) -> &Self::Output {
        &self.inner[index]
    }
}

impl IndexMut<NodeIndex> for Graph {
    fn index_mut(&mut self, index: NodeIndex) -> &mut Self::Output {
        &mut self.inner[index]
    }
}

pub(crate) struct TreeEntry {
    pub(crate) idx: NodeIndex,
    pub(crate) name: String,
    pub(crate) ident: String,
    pub(crate) depth: usize,
}

impl Graph {
    /// A new tree holding only the given root package.
    pub(crate) fn for_root(package: Package, manifest: Manifest) -> Self {
        let mut graph = Graph::default();
        let root = graph.inner.add_node(Node::new(package, manifest));
        graph.root = root;
        graph[root].idx = root;
        graph
    }

    /// Number of packages in the tree, excluding the root itself.
    pub fn package_count(&self) -> usize {
        self.inner.node_count().saturating_sub(1)
    }

    /// Chain of names from (but not including) the root down to `idx`.
    pub(crate) fn node_path(&self, idx: NodeIndex) -> VecDeque<UniCase<String>> {
        let mut path = VecDeque::new();
        let mut current = Some(idx);
        while let Some(i) = current {
            if i == self.root {
                break;
            }
            let node = &self.inner[i];
            path.push_front(node.name());
            current = node.parent;
        }
        path
    }

    /// The node's logical location under `node_modules/`, e.g.
    /// `a/node_modules/b`.
    pub(crate) fn subpath_str(&self, idx: NodeIndex) -> String {
        self.node_path(idx)
            .iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>()
            .join("/node_modules/")
    }

    /// Nearest node visible from `from` under `name`, walking ancestor-or-self
    /// and checking each visited node's own name and children. The walk does
    /// not cross hoist barriers.
    pub(crate) fn find_by_name(
        &self,
        from: NodeIndex,
        name: &UniCase<String>,
    ) -> Option<NodeIndex> {
        let mut current = Some(from);
        while let Some(i) = current {
            let node = &self.inner[i];
            if i != self.root && &node.name() == name {
                return Some(i);
            }
            if let Some(&child) = node.children.get(name) {
                return Some(child);
            }
            if node.hoist_barrier {
                break;
            }
            current = node.parent;
        }
        None
    }

    /// Flat view of the hierarchy keyed by logical subpath, used by the
    /// differ. BTreeMap keys give a deterministic ordering for free.
    pub(crate) fn tree_entries(&self) -> BTreeMap<String, TreeEntry> {
        let mut entries = BTreeMap::new();
        let mut queue = VecDeque::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            for &child_idx in self.inner[idx].children.values() {
                let child = &self.inner[child_idx];
                let path = self.subpath_str(child_idx);
                entries.insert(
                    path,
                    TreeEntry {
                        idx: child_idx,
                        name: child.name().to_string(),
                        ident: child.package.resolved().ident(),
                        depth: child.depth(self),
                    },
                );
                queue.push_back(child_idx);
            }
        }
        entries
    }

    /// Renders the tree as sorted `subpath ident` lines. Mostly useful for
    /// tests and debug logging.
    pub fn render_paths(&self) -> String {
        let mut out = String::new();
        for (path, entry) in self.tree_entries() {
            writeln!(out, "{path} {}", entry.ident).expect("writing to a String is infallible");
        }
        out
    }

    /// Clears the `loaded` flag on every node, so the dependency loader will
    /// re-walk the whole tree. Used when seeding an ideal tree from the
    /// current one.
    pub(crate) fn reset_loaded(&mut self) {
        let indices: Vec<NodeIndex> = self.inner.node_indices().collect();
        for idx in indices {
            self.inner[idx].loaded = false;
        }
    }

    /// Nodes that are only reachable from the root through optional
    /// requirement edges. Failures inside these subtrees degrade to warnings.
    pub(crate) fn optional_shielded(&self) -> HashSet<NodeIndex> {
        let mut required = HashSet::from([self.root]);
        let mut queue = VecDeque::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            for edge in self.inner.edges_directed(idx, Direction::Outgoing) {
                if edge.weight().dep_type != DepType::Opt && required.insert(edge.target()) {
                    queue.push_back(edge.target());
                }
            }
        }
        self.inner
            .node_indices()
            .filter(|idx| !required.contains(idx))
            .collect()
    }

    /// Whether nothing in the tree requires this node.
    pub(crate) fn is_unrequired(&self, idx: NodeIndex) -> bool {
        self.inner
            .edges_directed(idx, Direction::Incoming)
            .next()
            .is_none()
    }

    /// Removes a node and its whole hierarchy subtree from the arena,
    /// unhooking it from its parent and from the requirement maps of any
    /// remaining dependents.
    pub(crate) fn detach_subtree(&mut self, idx: NodeIndex) {
        if let Some(parent) = self.inner[idx].parent {
            let name = self.inner[idx].name();
            self.inner[parent].children.remove(&name);
        }
        let mut stack = vec![idx];
        while let Some(i) = stack.pop() {
            stack.extend(self.inner[i].children.values().copied());
            let name = self.inner[i].name();
            let dependents: Vec<(NodeIndex, petgraph::stable_graph::EdgeIndex)> = self
                .inner
                .edges_directed(i, Direction::Incoming)
                .map(|edge| (edge.source(), edge.id()))
                .collect();
            for (dependent, edge_idx) in dependents {
                if self.inner[dependent].dependencies.get(&name) == Some(&edge_idx) {
                    self.inner[dependent].dependencies.remove(&name);
                }
            }
            self.inner.remove_node(i);
        }
    }

    /// Reconstructs requirement edges for a tree read back from disk, from
    /// each node's declared dependencies to the nearest visible satisfying
    /// copy. Used when explicit install targets must leave the rest of the
    /// tree untouched: the edges justify the existing placements without
    /// re-resolving anything.
    pub(crate) fn connect_seeded_requirements(&mut self) {
        let indices: Vec<NodeIndex> = self.inner.node_indices().collect();
        for idx in indices {
            let manifest = self.inner[idx].manifest.clone();
            let mut sections = vec![
                (&manifest.dependencies, DepType::Prod),
                (&manifest.optional_dependencies, DepType::Opt),
            ];
            if idx == self.root {
                sections.push((&manifest.dev_dependencies, DepType::Dev));
            }
            for (deps, dep_type) in sections {
                for (name, range) in deps {
                    let name_key = UniCase::new(name.clone());
                    if self.inner[idx].dependencies.contains_key(&name_key) {
                        continue;
                    }
                    let Some(found) = self.find_by_name(idx, &name_key) else {
                        continue;
                    };
                    let Ok(requested) = format!("{name}@{range}").parse::<warren_spec::PackageSpec>()
                    else {
                        continue;
                    };
                    if matches!(
                        self.inner[found].package.resolved().satisfies(&requested),
                        Ok(true)
                    ) {
                        let edge_idx =
                            self.inner
                                .add_edge(idx, found, Edge::new(requested, dep_type.clone()));
                        self.inner[idx].dependencies.insert(name_key, edge_idx);
                    }
                }
            }
        }
    }

    /// Drops every node that is not reachable from the root over requirement
    /// edges. Returns the subpaths that were removed.
    pub(crate) fn prune_extraneous(&mut self) -> Vec<String> {
        let mut live = HashSet::from([self.root]);
        let mut queue = VecDeque::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            for edge in self.inner.edges_directed(idx, Direction::Outgoing) {
                if live.insert(edge.target()) {
                    queue.push_back(edge.target());
                }
            }
        }
        let dead: Vec<NodeIndex> = self
            .inner
            .node_indices()
            .filter(|idx| !live.contains(idx))
            .collect();
        let mut removed = Vec::new();
        for &idx in &dead {
            removed.push(self.subpath_str(idx));
        }
        for idx in dead {
            if let Some(parent) = self.inner[idx].parent {
                if live.contains(&parent) {
                    let name = self.inner[idx].name();
                    self.inner[parent].children.remove(&name);
                }
            }
            self.inner.remove_node(idx);
        }
        removed.sort();
        removed
    }

    /// Checks the tree invariants: parent/child agreement, acyclicity,
    /// reachability, non-empty requiredby sets, and that every requirement
    /// edge is satisfied by the nearest visible copy of its name.
    pub fn validate(&self) -> Result<(), InstallerError> {
        let mut seen = HashSet::from([self.root]);
        let mut queue = VecDeque::from([self.root]);
        while let Some(idx) = queue.pop_front() {
            let node = &self.inner[idx];
            for (name, &child_idx) in &node.children {
                let Some(child) = self.inner.node_weight(child_idx) else {
                    return Err(InstallerError::ValidationDetached(name.to_string()));
                };
                if child.parent != Some(idx) || &child.name() != name {
                    return Err(InstallerError::ValidationParentMismatch {
                        parent: node.name().to_string(),
                        child: name.to_string(),
                    });
                }
                if !seen.insert(child_idx) {
                    return Err(InstallerError::ValidationCycle(name.to_string()));
                }
                queue.push_back(child_idx);
            }
        }
        for idx in self.inner.node_indices() {
            if !seen.contains(&idx) {
                return Err(InstallerError::ValidationDetached(
                    self.inner[idx].name().to_string(),
                ));
            }
            // Packages already on disk before this run are grandfathered:
            // explicit installs leave them (and any junk among them) alone.
            if idx != self.root
                && !self.inner[idx].seeded
                && self
                    .inner
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            {
                return Err(InstallerError::ValidationUnrequired(self.subpath_str(idx)));
            }
            let node = &self.inner[idx];
            for (name, &edge_idx) in &node.dependencies {
                let Some(edge) = self.inner.edge_weight(edge_idx) else {
                    return Err(InstallerError::ValidationDetached(name.to_string()));
                };
                let satisfied = match self.find_by_name(idx, name) {
                    Some(found) => self.inner[found]
                        .package
                        .resolved()
                        .satisfies(&edge.requested)?,
                    None => false,
                };
                if !satisfied {
                    return Err(InstallerError::ValidationUnsatisfied {
                        dependent: node.name().to_string(),
                        name: name.to_string(),
                    });
                }
            }
            // The node must also still satisfy every descriptor that was
            // merged into it during placement.
            for spec in node.requested.iter().chain(node.constraints.iter()) {
                let checkable = matches!(
                    spec,
                    warren_spec::PackageSpec::Npm {
                        requested: Some(
                            warren_spec::VersionSpec::Version(_) | warren_spec::VersionSpec::Range(_)
                        ),
                        ..
                    }
                );
                if checkable && !node.package.resolved().satisfies(spec)? {
                    return Err(InstallerError::ValidationUnsatisfied {
                        dependent: node.name().to_string(),
                        name: spec.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
