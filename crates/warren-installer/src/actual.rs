use std::path::Path;

use petgraph::stable_graph::NodeIndex;
use unicase::UniCase;
use warren_common::Manifest;
use warren_fetch::Depot;

use crate::error::InstallerError;
use crate::graph::Graph;
use crate::node::Node;

/// Reads the current tree back off disk: every directory under
/// `node_modules/` with a parseable `package.json` becomes a node. Dot
/// directories (`.staging`, `.bin`) and stray files are ignored.
pub(crate) fn read_actual(root: &Path, root_manifest: &Manifest) -> Result<Graph, InstallerError> {
    let root_package = Depot::dummy_from_manifest(root_manifest.clone(), root);
    let mut graph = Graph::for_root(root_package, root_manifest.clone());
    let node_modules = root.join("node_modules");
    if node_modules.exists() {
        let root_idx = graph.root;
        load_children(&mut graph, root_idx, &node_modules)?;
    }
    tracing::debug!(
        "Read {} package(s) back from {}.",
        graph.package_count(),
        node_modules.display()
    );
    Ok(graph)
}

fn load_children(
    graph: &mut Graph,
    parent: NodeIndex,
    node_modules: &Path,
) -> Result<(), InstallerError> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(node_modules)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if file_name.starts_with('.') {
            continue;
        }
        if file_name.starts_with('@') {
            // Scope directories hold the real package dirs one level down.
            for scoped in std::fs::read_dir(entry.path())? {
                let scoped = scoped?;
                if scoped.file_type()?.is_dir() {
                    let scoped_name =
                        format!("{file_name}/{}", scoped.file_name().to_string_lossy());
                    dirs.push((scoped_name, scoped.path()));
                }
            }
        } else {
            dirs.push((file_name, entry.path()));
        }
    }
    dirs.sort();

    for (name, dir) in dirs {
        let manifest = match Manifest::from_path(dir.join("package.json")) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::debug!(
                    "Skipping {} while reading the current tree: {e}",
                    dir.display()
                );
                continue;
            }
        };
        let package = Depot::installed(&manifest, &name, &dir);
        let node = Node::new(package, manifest);
        let child_idx = graph.inner.add_node(node);
        graph[child_idx].idx = child_idx;
        graph[child_idx].parent = Some(parent);
        graph[child_idx].loaded = true;
        graph[child_idx].seeded = true;
        graph[parent]
            .children
            .insert(UniCase::new(name), child_idx);

        let nested = dir.join("node_modules");
        if nested.exists() {
            load_children(graph, child_idx, &nested)?;
        }
    }
    Ok(())
}
