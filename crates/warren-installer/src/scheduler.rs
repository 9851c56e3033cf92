use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_std::sync::Mutex;
use futures::{StreamExt, TryStreamExt};
use petgraph::stable_graph::NodeIndex;
use warren_fetch::Extractor;
use warren_script::LifecycleScript;

use crate::diff::Action;
use crate::error::{InstallerError, IoContext};
use crate::graph::Graph;
use crate::plan::{Phase, Plan};

const PACKAGE_TARBALL: &str = "package.tgz";
const PACKAGE_DIR: &str = "package";

/// Executes a [`Plan`] against the real `node_modules`, materializing new
/// packages in a staging directory first. Parallel phases run with bounded
/// concurrency; serial phases mutate the tree in differ order. Failures
/// under optional-only subtrees degrade to warnings and mask the rest of
/// that action's entries.
pub(crate) struct PhaseScheduler<'a> {
    pub(crate) graph: &'a Graph,
    pub(crate) root: PathBuf,
    pub(crate) staging: PathBuf,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) concurrency: usize,
    pub(crate) script_concurrency: usize,
    pub(crate) scripts: bool,
}

impl<'a> PhaseScheduler<'a> {
    pub(crate) async fn execute(&self, plan: &Plan) -> Result<Vec<String>, InstallerError> {
        if plan.is_empty() {
            tracing::debug!("Tree already matches; nothing to apply.");
            return Ok(Vec::new());
        }
        let start = std::time::Instant::now();

        rimraf(&self.staging).await?;
        async_std::fs::create_dir_all(&self.staging)
            .await
            .io_context(|| {
                format!(
                    "Failed to create staging directory at {}.",
                    self.staging.display()
                )
            })?;

        let masked = Mutex::new(HashSet::new());
        let warnings = Mutex::new(Vec::new());
        // On failure, staging stays put until the driver has released the
        // lock; cleanup is the driver's responsibility on that path.
        self.run_phases(plan, &masked, &warnings).await?;
        rimraf(&self.staging).await?;

        tracing::debug!(
            "Applied {} action(s) in {}ms.",
            plan.actions.len(),
            start.elapsed().as_millis()
        );
        Ok(warnings.into_inner())
    }

    async fn run_phases(
        &self,
        plan: &Plan,
        masked: &Mutex<HashSet<usize>>,
        warnings: &Mutex<Vec<String>>,
    ) -> Result<(), InstallerError> {
        let shielded = self.graph.optional_shielded();
        for phase in Phase::ALL {
            let entries: Vec<(usize, &Action)> = {
                let masked = masked.lock().await;
                plan.entries(phase)
                    .filter(|(slot, _)| !masked.contains(slot))
                    .collect()
            };
            if entries.is_empty() {
                continue;
            }
            let start = std::time::Instant::now();
            let count = entries.len();

            if phase.is_serial() {
                for (slot, action) in entries {
                    if masked.lock().await.contains(&slot) {
                        continue;
                    }
                    match self.run_entry(phase, slot, action).await {
                        Ok(()) => {}
                        Err(e) if self.is_shielded(action, &shielded) => {
                            self.downgrade(slot, action, e, masked, warnings).await;
                        }
                        Err(e) => return Err(e),
                    }
                }
            } else {
                let limit = if phase.lifecycle_event().is_some() {
                    self.script_concurrency
                } else {
                    self.concurrency
                };
                let shielded = &shielded;
                futures::stream::iter(entries)
                    .map(Ok)
                    .try_for_each_concurrent(limit, |(slot, action)| async move {
                        match self.run_entry(phase, slot, action).await {
                            Ok(()) => Ok(()),
                            Err(e) if self.is_shielded(action, shielded) => {
                                self.downgrade(slot, action, e, masked, warnings).await;
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    })
                    .await?;
            }

            tracing::debug!(
                "Ran {count} {phase} entr{} in {}ms.",
                if count == 1 { "y" } else { "ies" },
                start.elapsed().as_millis()
            );
        }
        Ok(())
    }

    fn is_shielded(&self, action: &Action, shielded: &HashSet<NodeIndex>) -> bool {
        action
            .ideal_idx()
            .map(|idx| shielded.contains(&idx))
            .unwrap_or(false)
    }

    async fn downgrade(
        &self,
        slot: usize,
        action: &Action,
        error: InstallerError,
        masked: &Mutex<HashSet<usize>>,
        warnings: &Mutex<Vec<String>>,
    ) {
        let warning = format!(
            "Optional dependency at {} failed to install: {error}",
            action.path()
        );
        tracing::warn!("{warning}");
        warnings.lock().await.push(warning);
        masked.lock().await.insert(slot);
    }

    async fn run_entry(
        &self,
        phase: Phase,
        slot: usize,
        action: &Action,
    ) -> Result<(), InstallerError> {
        self.run_entry_inner(phase, slot, action)
            .await
            .map_err(|e| self.phase_error(phase, action, e))
    }

    async fn run_entry_inner(
        &self,
        phase: Phase,
        slot: usize,
        action: &Action,
    ) -> Result<(), InstallerError> {
        match phase {
            Phase::Fetch => {
                let Some(idx) = action.ideal_idx() else {
                    return Ok(());
                };
                let dir = self.staging_dir(slot, action);
                async_std::fs::create_dir_all(&dir).await.io_context(|| {
                    format!("Failed to create staging subdirectory at {}.", dir.display())
                })?;
                self.graph[idx]
                    .package
                    .fetch_to(&dir.join(PACKAGE_TARBALL))
                    .await?;
            }
            Phase::Extract => {
                let dir = self.staging_dir(slot, action);
                self.extractor
                    .extract(&dir.join(PACKAGE_TARBALL), &dir.join(PACKAGE_DIR))
                    .await?;
            }
            Phase::Preinstall | Phase::Build => {
                let Some(idx) = action.ideal_idx() else {
                    return Ok(());
                };
                let dir = self.staging_dir(slot, action).join(PACKAGE_DIR);
                self.run_script(idx, dir, phase).await?;
            }
            Phase::Remove => {
                // Both plain removals and the removal half of an update clear
                // the on-disk copy at the action's path.
                rimraf(&self.install_path(action.path())).await?;
            }
            Phase::Finalize => match action {
                Action::Move { from, to, .. } => {
                    let dest = self.install_path(to);
                    self.ensure_parent(&dest).await?;
                    async_std::fs::rename(self.install_path(from), &dest)
                        .await
                        .io_context(|| {
                            format!("Failed to move package from {from} to {to}.")
                        })?;
                }
                Action::Add { path, .. } | Action::Update { path, .. } => {
                    let dest = self.install_path(path);
                    self.ensure_parent(&dest).await?;
                    async_std::fs::rename(self.staging_dir(slot, action).join(PACKAGE_DIR), &dest)
                        .await
                        .io_context(|| {
                            format!("Failed to finalize package into {}.", dest.display())
                        })?;
                }
                Action::Remove { .. } => {}
            },
            Phase::Install | Phase::Postinstall | Phase::Test => {
                let Some(idx) = action.ideal_idx() else {
                    return Ok(());
                };
                let dir = self.install_path(action.path());
                self.run_script(idx, dir, phase).await?;
            }
        }
        Ok(())
    }

    async fn run_script(
        &self,
        idx: NodeIndex,
        dir: PathBuf,
        phase: Phase,
    ) -> Result<(), InstallerError> {
        if !self.scripts {
            return Ok(());
        }
        let Some(event) = phase.lifecycle_event() else {
            return Ok(());
        };
        let manifest = self.graph[idx].manifest.clone();
        if !manifest.scripts.contains_key(event) {
            return Ok(());
        }
        let workspace = self.root.clone();
        async_std::task::spawn_blocking(move || {
            LifecycleScript::new(&dir, event)?
                .manifest(&manifest)
                .workspace_path(workspace)
                .run_logged()
        })
        .await?;
        Ok(())
    }

    async fn ensure_parent(&self, dest: &Path) -> Result<(), InstallerError> {
        if let Some(parent) = dest.parent() {
            async_std::fs::create_dir_all(parent)
                .await
                .io_context(|| format!("Failed to create directory at {}.", parent.display()))?;
        }
        Ok(())
    }

    fn install_path(&self, subpath: &str) -> PathBuf {
        self.root.join("node_modules").join(subpath)
    }

    fn staging_dir(&self, slot: usize, action: &Action) -> PathBuf {
        let name = action
            .path()
            .rsplit("/node_modules/")
            .next()
            .unwrap_or(action.path())
            .replace('/', "+");
        self.staging.join(format!("{slot}-{name}"))
    }

    fn phase_error(&self, phase: Phase, action: &Action, error: InstallerError) -> InstallerError {
        // Keep already-annotated errors as-is so nesting doesn't stack up.
        if matches!(error, InstallerError::PhaseFailed { .. }) {
            return error;
        }
        let path = action.path();
        let package = path
            .rsplit("/node_modules/")
            .next()
            .unwrap_or(path)
            .to_string();
        InstallerError::PhaseFailed {
            phase,
            package,
            chain: path.replace("/node_modules/", " > "),
            source: Box::new(error),
        }
    }
}

/// Recursively deletes a directory, treating "already gone" as success.
pub(crate) async fn rimraf(path: &Path) -> Result<(), InstallerError> {
    match async_std::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallerError::IoError(
            format!("Failed to remove directory at {}.", path.display()),
            e,
        )),
    }
}
