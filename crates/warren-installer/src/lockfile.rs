use futures::StreamExt;
use petgraph::stable_graph::NodeIndex;
use unicase::UniCase;
use warren_common::{Manifest, PinnedNode, PinnedTree};
use warren_fetch::{Depot, FetchError, Package};
use warren_spec::PackageSpec;

use crate::edge::{DepType, Edge};
use crate::error::InstallerError;
use crate::graph::Graph;
use crate::node::Node;

/// A pinned, recursive dependency map that overrides range resolution. The
/// lockfile is authoritative about tree shape: inflation attaches entries
/// exactly where the lockfile says, with no hoisting and no deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    pinned: PinnedTree,
}

impl Lockfile {
    pub fn from_json(raw: impl AsRef<str>) -> Result<Self, InstallerError> {
        let pinned = serde_json::from_str::<PinnedTree>(raw.as_ref())
            .map_err(InstallerError::LockfileParseError)?;
        Ok(Self { pinned })
    }

    pub fn from_pinned(pinned: PinnedTree) -> Self {
        Self { pinned }
    }

    pub fn pinned(&self) -> &PinnedTree {
        &self.pinned
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

/// Builds the exact subtree described by `pinned` underneath `into`. Every
/// entry resolves `name@version` with no range resolution, and every
/// inflated node (plus `into` itself) comes out `loaded`, so the dependency
/// loader won't re-expand it from manifests.
pub(crate) async fn inflate(
    graph: &mut Graph,
    into: NodeIndex,
    pinned: &PinnedTree,
    depot: &Depot,
    concurrency: usize,
) -> Result<(), InstallerError> {
    let start = std::time::Instant::now();
    graph[into].loaded = true;
    let mut stack = vec![(into, pinned.dependencies.clone())];
    let mut inflated = 0;
    while let Some((parent_idx, deps)) = stack.pop() {
        let mut resolved: Vec<(String, PinnedNode, Result<(Package, Manifest), FetchError>)> =
            futures::stream::iter(deps.into_iter().map(|(name, pin)| async move {
                let spec = format!("{}@{}", name, pin.version);
                let result = match depot.resolve(&spec).await {
                    Ok(package) => match package.manifest().await {
                        Ok(manifest) => Ok((package, manifest)),
                        Err(e) => Err(e),
                    },
                    Err(e) => Err(e),
                };
                (name, pin, result)
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        resolved.sort_by(|(a, ..), (b, ..)| a.cmp(b));

        for (name, pin, result) in resolved {
            let (package, manifest) = result.map_err(|source| InstallerError::ResolveFailed {
                spec: format!("{}@{}", name, pin.version),
                chain: graph.subpath_str(parent_idx).replace("/node_modules/", " > "),
                source,
            })?;
            let requested: PackageSpec = format!("{}@{}", name, pin.version).parse()?;
            let child_name = UniCase::new(package.name().to_string());
            if graph[parent_idx].children.contains_key(&child_name) {
                return Err(InstallerError::LockfileConflict {
                    name: child_name.to_string(),
                    at: graph.subpath_str(parent_idx),
                });
            }
            let child_idx = graph.inner.add_node(Node::new(package, manifest));
            graph[child_idx].idx = child_idx;
            graph[child_idx].loaded = true;
            graph[child_idx].requested = Some(requested.clone());
            let edge_idx =
                graph
                    .inner
                    .add_edge(parent_idx, child_idx, Edge::new(requested, DepType::Prod));
            graph[parent_idx]
                .dependencies
                .insert(child_name.clone(), edge_idx);
            graph[child_idx].parent = Some(parent_idx);
            graph[parent_idx].children.insert(child_name, child_idx);
            inflated += 1;
            if !pin.dependencies.is_empty() {
                stack.push((child_idx, pin.dependencies));
            }
        }
    }
    tracing::debug!(
        "Inflated {inflated} pinned package(s) in {}ms.",
        start.elapsed().as_millis()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_shrinkwrap_shape() {
        let lockfile = Lockfile::from_json(
            r#"{
                "name": "root",
                "version": "1.0.0",
                "dependencies": {
                    "a": { "version": "1.0.0", "dependencies": { "b": { "version": "1.0.0" } } }
                }
            }"#,
        )
        .unwrap();
        assert_eq!(lockfile.pinned().len(), 2);
    }

    #[test]
    fn rejects_malformed_lockfiles() {
        assert!(Lockfile::from_json(r#"{ "dependencies": [] }"#).is_err());
    }
}
