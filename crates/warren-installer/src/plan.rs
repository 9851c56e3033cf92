use std::fmt;

use crate::diff::Action;

/// The install stages, in execution order. Parallel phases run entries with
/// bounded concurrency; serial phases run them one-completes-before-next in
/// differ order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Fetch,
    Extract,
    Preinstall,
    Build,
    Remove,
    Finalize,
    Install,
    Postinstall,
    Test,
}

impl Phase {
    pub const ALL: [Phase; 9] = [
        Phase::Fetch,
        Phase::Extract,
        Phase::Preinstall,
        Phase::Build,
        Phase::Remove,
        Phase::Finalize,
        Phase::Install,
        Phase::Postinstall,
        Phase::Test,
    ];

    /// Serial phases mutate the real `node_modules` and run in differ order.
    pub fn is_serial(self) -> bool {
        matches!(self, Phase::Finalize | Phase::Install | Phase::Postinstall)
    }

    /// The lifecycle event this phase runs, for script-bearing phases.
    pub fn lifecycle_event(self) -> Option<&'static str> {
        match self {
            Phase::Preinstall => Some("preinstall"),
            Phase::Build => Some("build"),
            Phase::Install => Some("install"),
            Phase::Postinstall => Some("postinstall"),
            Phase::Test => Some("test"),
            _ => None,
        }
    }

    fn ordinal(self) -> usize {
        Phase::ALL
            .iter()
            .position(|p| *p == self)
            .expect("every phase is in ALL")
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Extract => "extract",
            Phase::Preinstall => "preinstall",
            Phase::Build => "build",
            Phase::Remove => "remove",
            Phase::Finalize => "finalize",
            Phase::Install => "install",
            Phase::Postinstall => "postinstall",
            Phase::Test => "test",
        };
        write!(f, "{name}")
    }
}

/// A diffed action list decomposed into per-phase entries. Each action keeps
/// one slot per applicable phase, identified by its position in the original
/// (ordered) action list.
#[derive(Debug)]
pub struct Plan {
    pub(crate) actions: Vec<Action>,
    phases: [Vec<usize>; 9],
}

impl Plan {
    /// Expands each action into its lifecycle phases. `test_mode` adds the
    /// `test` phase for installed packages.
    pub fn decompose(actions: Vec<Action>, test_mode: bool) -> Plan {
        let mut phases: [Vec<usize>; 9] = Default::default();
        let mut slot = |phase: Phase, i: usize| phases[phase.ordinal()].push(i);
        for (i, action) in actions.iter().enumerate() {
            match action {
                Action::Add { .. } | Action::Update { .. } => {
                    slot(Phase::Fetch, i);
                    slot(Phase::Extract, i);
                    slot(Phase::Preinstall, i);
                    slot(Phase::Build, i);
                    if matches!(action, Action::Update { .. }) {
                        slot(Phase::Remove, i);
                    }
                    slot(Phase::Finalize, i);
                    slot(Phase::Install, i);
                    slot(Phase::Postinstall, i);
                    if test_mode {
                        slot(Phase::Test, i);
                    }
                }
                Action::Remove { .. } => slot(Phase::Remove, i),
                Action::Move { .. } => slot(Phase::Finalize, i),
            }
        }
        Plan { actions, phases }
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Entries for one phase, in plan order, tagged with their action slot.
    pub(crate) fn entries(&self, phase: Phase) -> impl Iterator<Item = (usize, &Action)> + '_ {
        self.phases[phase.ordinal()]
            .iter()
            .map(move |&i| (i, &self.actions[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::stable_graph::NodeIndex;
    use pretty_assertions::assert_eq;

    fn idx() -> NodeIndex {
        NodeIndex::new(0)
    }

    fn phase_paths(plan: &Plan, phase: Phase) -> Vec<&str> {
        plan.entries(phase).map(|(_, a)| a.path()).collect()
    }

    #[test]
    fn update_participates_in_both_remove_and_add_phases() {
        let plan = Plan::decompose(
            vec![Action::Update {
                path: "x".into(),
                idx: idx(),
            }],
            false,
        );
        for phase in [
            Phase::Fetch,
            Phase::Extract,
            Phase::Preinstall,
            Phase::Build,
            Phase::Remove,
            Phase::Finalize,
            Phase::Install,
            Phase::Postinstall,
        ] {
            assert_eq!(phase_paths(&plan, phase), vec!["x"], "phase {phase}");
        }
        assert!(phase_paths(&plan, Phase::Test).is_empty());
    }

    #[test]
    fn removes_only_participate_in_the_remove_phase() {
        let plan = Plan::decompose(vec![Action::Remove { path: "x".into() }], false);
        assert_eq!(phase_paths(&plan, Phase::Remove), vec!["x"]);
        for phase in Phase::ALL {
            if phase != Phase::Remove {
                assert!(phase_paths(&plan, phase).is_empty(), "phase {phase}");
            }
        }
    }

    #[test]
    fn moves_only_finalize() {
        let plan = Plan::decompose(
            vec![Action::Move {
                from: "a/node_modules/b".into(),
                to: "b".into(),
                idx: idx(),
            }],
            false,
        );
        assert_eq!(phase_paths(&plan, Phase::Finalize), vec!["b"]);
        for phase in Phase::ALL {
            if phase != Phase::Finalize {
                assert!(phase_paths(&plan, phase).is_empty(), "phase {phase}");
            }
        }
    }

    #[test]
    fn test_phase_is_gated_on_test_mode() {
        let add = Action::Add {
            path: "a".into(),
            idx: idx(),
        };
        let without = Plan::decompose(vec![add.clone()], false);
        assert!(phase_paths(&without, Phase::Test).is_empty());
        let with = Plan::decompose(vec![add], true);
        assert_eq!(phase_paths(&with, Phase::Test), vec!["a"]);
    }

    #[test]
    fn serial_phases_preserve_differ_order() {
        let plan = Plan::decompose(
            vec![
                Action::Add {
                    path: "a".into(),
                    idx: idx(),
                },
                Action::Add {
                    path: "b".into(),
                    idx: idx(),
                },
                Action::Add {
                    path: "a/node_modules/c".into(),
                    idx: idx(),
                },
            ],
            false,
        );
        assert_eq!(
            phase_paths(&plan, Phase::Finalize),
            vec!["a", "b", "a/node_modules/c"],
        );
    }
}
