use std::collections::{HashSet, VecDeque};

use futures::StreamExt;
use petgraph::stable_graph::NodeIndex;
use unicase::UniCase;
use warren_common::Manifest;
use warren_fetch::{Depot, FetchError, Package};
use warren_spec::PackageSpec;

use crate::edge::{DepType, Edge};
use crate::error::InstallerError;
use crate::graph::Graph;
use crate::lockfile;
use crate::node::Node;

#[derive(Debug, Clone)]
struct NodeDependency {
    name: UniCase<String>,
    spec: String,
    dep_type: DepType,
    node_idx: NodeIndex,
    /// True for command-line targets: they may replace what's in their slot.
    explicit: bool,
}

/// Manifests occasionally declare an empty range; it means "anything".
fn normalize_range(spec: &str) -> String {
    if spec.trim().is_empty() {
        "*".into()
    } else {
        spec.to_string()
    }
}

/// Expands an ideal tree: explicit arguments first, then a breadth-first
/// walk over every unexpanded node's declared dependencies. Placement is
/// hoisting with first-match pinning; ties break by declaration order of the
/// requiring node.
pub(crate) struct Resolver<'a> {
    pub(crate) depot: &'a Depot,
    pub(crate) graph: Graph,
    pub(crate) concurrency: usize,
    pub(crate) dev: bool,
    pub(crate) warnings: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub(crate) async fn run(
        mut self,
        args: Vec<PackageSpec>,
    ) -> Result<(Graph, Vec<String>), InstallerError> {
        let start = std::time::Instant::now();
        let mut q = VecDeque::new();

        // Explicit arguments always land at the root as top-level deps.
        for spec in args {
            let package = self
                .depot
                .resolve_spec(spec.clone())
                .await
                .map_err(|source| InstallerError::ResolveFailed {
                    spec: spec.to_string(),
                    chain: "the command line".into(),
                    source,
                })?;
            let manifest = package.manifest().await?;
            let dep = NodeDependency {
                name: UniCase::new(package.name().to_string()),
                spec: spec.requested(),
                dep_type: DepType::Prod,
                node_idx: self.graph.root,
                explicit: true,
            };
            if let Some(existing) = self.satisfy_dependency(&dep, &spec)? {
                self.queue_if_unloaded(existing, &mut q).await?;
            } else {
                let child_idx = self.place_child(&dep, &spec, package, manifest.clone())?;
                self.queue_expansion(child_idx, &manifest, &mut q).await?;
            }
        }

        let root_idx = self.graph.root;
        if !self.graph[root_idx].loaded {
            self.graph[root_idx].loaded = true;
            q.push_back(root_idx);
        }

        while let Some(node_idx) = q.pop_front() {
            // Eviction may have dropped a queued node in the meantime.
            if self.graph.inner.node_weight(node_idx).is_none() {
                continue;
            }
            self.expand_node(node_idx, &mut q).await?;
        }

        tracing::debug!(
            "Resolved ideal tree of {} package(s) in {}ms.",
            self.graph.package_count(),
            start.elapsed().as_millis()
        );
        Ok((self.graph, self.warnings))
    }

    async fn expand_node(
        &mut self,
        node_idx: NodeIndex,
        q: &mut VecDeque<NodeIndex>,
    ) -> Result<(), InstallerError> {
        // See what the tree already satisfies before fetching anything.
        let mut pending = Vec::new();
        for dep in self.node_deps(node_idx) {
            let requested: PackageSpec = format!("{}@{}", dep.name, dep.spec).parse()?;
            if let Some(existing) = self.satisfy_dependency(&dep, &requested)? {
                self.queue_if_unloaded(existing, q).await?;
            } else {
                pending.push((dep, requested));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        // Fetch metadata for the rest concurrently, then place the results in
        // declaration order so ties break deterministically.
        let depot = self.depot;
        type Fetched = (
            usize,
            NodeDependency,
            PackageSpec,
            Result<(Package, Manifest), FetchError>,
        );
        let mut fetched: Vec<Fetched> = futures::stream::iter(
            pending
                .into_iter()
                .enumerate()
                .map(|(i, (dep, requested))| async move {
                    let result = match depot.resolve_spec(requested.clone()).await {
                        Ok(package) => match package.manifest().await {
                            Ok(manifest) => Ok((package, manifest)),
                            Err(e) => Err(e),
                        },
                        Err(e) => Err(e),
                    };
                    (i, dep, requested, result)
                }),
        )
        .buffer_unordered(self.concurrency)
        .collect()
        .await;
        fetched.sort_by_key(|(i, ..)| *i);

        for (_, dep, requested, result) in fetched {
            let (package, manifest) = match result {
                Ok(resolved) => resolved,
                Err(e) if dep.dep_type == DepType::Opt => {
                    let warning = format!(
                        "Skipping optional dependency `{}@{}`: {e}",
                        dep.name, dep.spec
                    );
                    tracing::warn!("{warning}");
                    self.warnings.push(warning);
                    continue;
                }
                Err(source) => {
                    return Err(InstallerError::ResolveFailed {
                        spec: format!("{}@{}", dep.name, dep.spec),
                        chain: self.chain_of(node_idx),
                        source,
                    })
                }
            };
            // A placement earlier in this batch may already satisfy us.
            if let Some(existing) = self.satisfy_dependency(&dep, &requested)? {
                self.queue_if_unloaded(existing, q).await?;
                continue;
            }
            let child_idx = self.place_child(&dep, &requested, package, manifest.clone())?;
            self.queue_expansion(child_idx, &manifest, q).await?;
        }
        Ok(())
    }

    /// All declared dependencies of a node, in resolution order:
    /// `dependencies`, then `optionalDependencies`, then (at the root only)
    /// `devDependencies` that aren't already runtime deps.
    fn node_deps(&self, node_idx: NodeIndex) -> Vec<NodeDependency> {
        let node = &self.graph[node_idx];
        let manifest = &node.manifest;
        let mut names = HashSet::new();
        let mut deps = Vec::new();
        for (name, spec) in &manifest.dependencies {
            let name = UniCase::new(name.clone());
            if names.insert(name.clone()) {
                deps.push(NodeDependency {
                    name,
                    spec: normalize_range(spec),
                    dep_type: DepType::Prod,
                    node_idx,
                    explicit: false,
                });
            }
        }
        for (name, spec) in &manifest.optional_dependencies {
            let name = UniCase::new(name.clone());
            if names.insert(name.clone()) {
                deps.push(NodeDependency {
                    name,
                    spec: normalize_range(spec),
                    dep_type: DepType::Opt,
                    node_idx,
                    explicit: false,
                });
            }
        }
        if node_idx == self.graph.root && self.dev {
            for (name, spec) in &manifest.dev_dependencies {
                let name = UniCase::new(name.clone());
                if names.insert(name.clone()) {
                    deps.push(NodeDependency {
                        name,
                        spec: normalize_range(spec),
                        dep_type: DepType::Dev,
                        node_idx,
                        explicit: false,
                    });
                }
            }
        }
        deps
    }

    /// Walk from the dependent upward looking for an existing node that
    /// satisfies the request. On a hit, the dependent gains a requirement
    /// edge and the satisfier accumulates the new constraint.
    fn satisfy_dependency(
        &mut self,
        dep: &NodeDependency,
        requested: &PackageSpec,
    ) -> Result<Option<NodeIndex>, InstallerError> {
        if let Some(found) = self.graph.find_by_name(dep.node_idx, &dep.name) {
            if self.graph[found].package.resolved().satisfies(requested)? {
                let edge_idx = self.graph.inner.add_edge(
                    dep.node_idx,
                    found,
                    Edge::new(requested.clone(), dep.dep_type.clone()),
                );
                self.graph[dep.node_idx]
                    .dependencies
                    .insert(dep.name.clone(), edge_idx);
                self.graph[found].merge_requested(requested);
                return Ok(Some(found));
            }
            // The nearest visible copy conflicts; a fresh copy has to nest
            // below it instead of reusing it.
            return Ok(None);
        }
        Ok(None)
    }

    /// Create a new node for the resolved package and hang it at the highest
    /// conflict-free position at or above the dependent.
    fn place_child(
        &mut self,
        dep: &NodeDependency,
        requested: &PackageSpec,
        package: Package,
        manifest: Manifest,
    ) -> Result<NodeIndex, InstallerError> {
        let child_name = UniCase::new(package.name().to_string());

        let mut target = dep.node_idx;
        let mut cursor = Some(dep.node_idx);
        while let Some(idx) = cursor {
            let node = &self.graph[idx];
            if idx != self.graph.root && node.name() == child_name {
                // A same-named ancestor: the new copy nests directly under it.
                target = idx;
                break;
            }
            if node.children.contains_key(&child_name) {
                // Conflicting occupant here; stay at the last conflict-free
                // position below it.
                break;
            }
            target = idx;
            if node.hoist_barrier {
                break;
            }
            cursor = node.parent;
        }
        if let Some(&occupant) = self.graph[target].children.get(&child_name) {
            if dep.explicit || self.graph.is_unrequired(occupant) {
                // A leftover from seeding the ideal tree off the disk; evict
                // it (and its subtree) in favor of the fresh resolution.
                self.graph.detach_subtree(occupant);
            } else {
                target = dep.node_idx;
                if self.graph[target].children.contains_key(&child_name) {
                    return Err(InstallerError::PlacementConflict {
                        name: child_name.to_string(),
                        at: self.graph.subpath_str(target),
                    });
                }
            }
        }

        let child_idx = self.graph.inner.add_node(Node::new(package, manifest));
        self.graph[child_idx].idx = child_idx;
        self.graph[child_idx].loaded = true;
        self.graph[child_idx].requested = Some(requested.clone());
        if dep.dep_type == DepType::Dev {
            // Direct dev dependencies pin their subtrees: their transitives
            // stay below them instead of hoisting into runtime territory.
            self.graph[child_idx].hoist_barrier = true;
        }
        let edge_idx = self.graph.inner.add_edge(
            dep.node_idx,
            child_idx,
            Edge::new(requested.clone(), dep.dep_type.clone()),
        );
        self.graph[dep.node_idx]
            .dependencies
            .insert(child_name.clone(), edge_idx);
        self.graph[child_idx].parent = Some(target);
        self.graph[target].children.insert(child_name, child_idx);
        Ok(child_idx)
    }

    /// Queue a node for dependency expansion, or inflate its embedded
    /// shrinkwrap instead when it carries one.
    async fn queue_expansion(
        &mut self,
        idx: NodeIndex,
        manifest: &Manifest,
        q: &mut VecDeque<NodeIndex>,
    ) -> Result<(), InstallerError> {
        if let Some(pinned) = manifest.shrinkwrap.clone() {
            lockfile::inflate(&mut self.graph, idx, &pinned, self.depot, self.concurrency).await
        } else {
            q.push_back(idx);
            Ok(())
        }
    }

    async fn queue_if_unloaded(
        &mut self,
        idx: NodeIndex,
        q: &mut VecDeque<NodeIndex>,
    ) -> Result<(), InstallerError> {
        if !self.graph[idx].loaded {
            self.graph[idx].loaded = true;
            let manifest = self.graph[idx].manifest.clone();
            self.queue_expansion(idx, &manifest, q).await?;
        }
        Ok(())
    }

    fn chain_of(&self, idx: NodeIndex) -> String {
        let path = self.graph.subpath_str(idx);
        if path.is_empty() {
            "the project root".into()
        } else {
            path.replace("/node_modules/", " > ")
        }
    }
}
