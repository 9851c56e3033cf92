use std::fmt;

use petgraph::stable_graph::NodeIndex;

use crate::graph::Graph;

/// One difference between the current tree and the ideal tree, keyed by
/// logical subpath under `node_modules/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The ideal tree wants a package the current tree doesn't have.
    Add { path: String, idx: NodeIndex },
    /// Same location, different resolved package. Semantically a remove
    /// followed by an add, kept as one record so the phases can share work.
    Update { path: String, idx: NodeIndex },
    /// The same resolved package, wanted at a different location.
    Move {
        from: String,
        to: String,
        idx: NodeIndex,
    },
    /// The current tree has a package the ideal tree doesn't want.
    Remove { path: String },
}

impl Action {
    /// The location this action materializes (or clears) on disk.
    pub fn path(&self) -> &str {
        match self {
            Action::Add { path, .. } | Action::Update { path, .. } | Action::Remove { path } => {
                path
            }
            Action::Move { to, .. } => to,
        }
    }

    /// The ideal-tree node this action concerns, when there is one.
    pub(crate) fn ideal_idx(&self) -> Option<NodeIndex> {
        match self {
            Action::Add { idx, .. } | Action::Update { idx, .. } | Action::Move { idx, .. } => {
                Some(*idx)
            }
            Action::Remove { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add { path, .. } => write!(f, "add {path}"),
            Action::Update { path, .. } => write!(f, "update {path}"),
            Action::Move { from, to, .. } => write!(f, "move {from} -> {to}"),
            Action::Remove { path } => write!(f, "remove {path}"),
        }
    }
}

/// Compares current against ideal by structural position. Removals come out
/// bottom-up, additions top-down, both name-stable within a level, so serial
/// phases touch parents before their children and never orphan a subtree
/// mid-flight.
pub fn diff_trees(current: &Graph, ideal: &Graph) -> Vec<Action> {
    let current_entries = current.tree_entries();
    let ideal_entries = ideal.tree_entries();

    let mut adds = Vec::new();
    let mut updates = Vec::new();
    let mut removes = Vec::new();

    for (path, entry) in &ideal_entries {
        match current_entries.get(path) {
            None => adds.push((entry.depth, path.clone(), entry.idx, entry.name.clone(), entry.ident.clone())),
            Some(on_disk) if on_disk.ident == entry.ident => {}
            Some(_) => updates.push((entry.depth, path.clone(), entry.idx)),
        }
    }
    for (path, entry) in &current_entries {
        if !ideal_entries.contains_key(path) {
            removes.push((entry.depth, path.clone(), entry.name.clone(), entry.ident.clone()));
        }
    }

    // An add and a remove of the same resolved package pair up into a move.
    let mut moves = Vec::new();
    let mut plain_adds = Vec::new();
    for (depth, path, idx, name, ident) in adds {
        if let Some(at) = removes
            .iter()
            .position(|(_, _, removed_name, removed_ident)| {
                removed_name == &name && removed_ident == &ident
            })
        {
            let (_, from, _, _) = removes.remove(at);
            moves.push((depth, path, from, idx));
        } else {
            plain_adds.push((depth, path, idx));
        }
    }

    let mut actions = Vec::new();

    removes.sort_by(|(da, pa, ..), (db, pb, ..)| db.cmp(da).then_with(|| pa.cmp(pb)));
    for (_, path, ..) in removes {
        actions.push(Action::Remove { path });
    }

    enum Downward {
        Add(NodeIndex),
        Update(NodeIndex),
        Move(String, NodeIndex),
    }
    let mut downward: Vec<(usize, String, Downward)> = Vec::new();
    for (depth, path, idx) in plain_adds {
        downward.push((depth, path, Downward::Add(idx)));
    }
    for (depth, path, idx) in updates {
        downward.push((depth, path, Downward::Update(idx)));
    }
    for (depth, to, from, idx) in moves {
        downward.push((depth, to, Downward::Move(from, idx)));
    }
    downward.sort_by(|(da, pa, _), (db, pb, _)| da.cmp(db).then_with(|| pa.cmp(pb)));
    for (_, path, kind) in downward {
        actions.push(match kind {
            Downward::Add(idx) => Action::Add { path, idx },
            Downward::Update(idx) => Action::Update { path, idx },
            Downward::Move(from, idx) => Action::Move {
                from,
                to: path,
                idx,
            },
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::node::Node;
    use pretty_assertions::assert_eq;
    use unicase::UniCase;
    use warren_common::Manifest;
    use warren_fetch::Depot;

    /// Builds a tree from `(subpath, version)` pairs, e.g.
    /// `("a/node_modules/b", "1.0.0")`.
    fn tree(entries: &[(&str, &str)]) -> Graph {
        let root_manifest: Manifest =
            serde_json::from_str(r#"{ "name": "root", "version": "1.0.0" }"#).unwrap();
        let root_package =
            Depot::dummy_from_manifest(root_manifest.clone(), std::path::Path::new("."));
        let mut graph = Graph::for_root(root_package, root_manifest);
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by_key(|(path, _)| path.split("/node_modules/").count());
        for (path, version) in sorted {
            let segments: Vec<&str> = path.split("/node_modules/").collect();
            let mut at = graph.root;
            for segment in &segments[..segments.len() - 1] {
                at = graph[at].children[&UniCase::new(segment.to_string())];
            }
            let name = segments[segments.len() - 1];
            let manifest: Manifest = serde_json::from_str(&format!(
                r#"{{ "name": "{name}", "version": "{version}" }}"#
            ))
            .unwrap();
            let package = Depot::installed(&manifest, name, std::path::Path::new("."));
            let node = Node::new(package, manifest);
            let idx = graph.inner.add_node(node);
            graph[idx].idx = idx;
            graph[idx].parent = Some(at);
            graph[at].children.insert(UniCase::new(name.to_string()), idx);
        }
        graph
    }

    fn rendered(actions: &[Action]) -> Vec<String> {
        actions.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn empty_current_produces_top_down_adds() {
        let current = tree(&[]);
        let ideal = tree(&[
            ("a", "1.0.0"),
            ("a/node_modules/b", "1.0.0"),
            ("c", "1.0.0"),
        ]);
        assert_eq!(
            rendered(&diff_trees(&current, &ideal)),
            vec!["add a", "add c", "add a/node_modules/b"],
        );
    }

    #[test]
    fn identical_trees_produce_no_actions() {
        let shape = &[("a", "1.0.0"), ("a/node_modules/b", "2.0.0")];
        assert!(diff_trees(&tree(shape), &tree(shape)).is_empty());
    }

    #[test]
    fn version_change_is_an_update() {
        let current = tree(&[("x", "1.0.0")]);
        let ideal = tree(&[("x", "2.0.0")]);
        assert_eq!(rendered(&diff_trees(&current, &ideal)), vec!["update x"]);
    }

    #[test]
    fn stale_packages_are_removed_bottom_up() {
        let current = tree(&[
            ("a", "1.0.0"),
            ("a/node_modules/b", "1.0.0"),
            ("c", "1.0.0"),
        ]);
        let ideal = tree(&[("c", "1.0.0")]);
        assert_eq!(
            rendered(&diff_trees(&current, &ideal)),
            vec!["remove a/node_modules/b", "remove a"],
        );
    }

    #[test]
    fn relocated_package_is_a_move() {
        let current = tree(&[("a", "1.0.0"), ("a/node_modules/b", "3.1.4")]);
        let ideal = tree(&[("a", "1.0.0"), ("b", "3.1.4")]);
        assert_eq!(
            rendered(&diff_trees(&current, &ideal)),
            vec!["move a/node_modules/b -> b"],
        );
    }

    #[test]
    fn diff_is_deterministic() {
        let current = tree(&[("a", "1.0.0"), ("b", "1.0.0")]);
        let ideal = tree(&[("b", "2.0.0"), ("c", "1.0.0"), ("a", "1.0.0")]);
        let first = diff_trees(&current, &ideal);
        let second = diff_trees(&current, &ideal);
        assert_eq!(first, second);
        assert_eq!(rendered(&first), vec!["update b", "add c"]);
    }
}
