use std::path::{Path, PathBuf};
use std::sync::Arc;

use warren_common::Manifest;
use warren_fetch::{Depot, DepotOpts, Extractor, TarExtractor};
use warren_script::LifecycleScript;
use warren_spec::PackageSpec;

use crate::actual;
use crate::diff::{diff_trees, Action};
use crate::error::InstallerError;
use crate::graph::Graph;
use crate::lock::InstallLock;
use crate::lockfile::{self, Lockfile};
use crate::plan::Plan;
use crate::resolver::Resolver;
use crate::scheduler::{rimraf, PhaseScheduler};
use crate::{DEFAULT_CONCURRENCY, DEFAULT_SCRIPT_CONCURRENCY, STAGING_DIR_NAME};

/// Create a new builder for an [`Installer`].
#[derive(Clone)]
pub struct InstallerOptions {
    depot: Option<Depot>,
    root: PathBuf,
    concurrency: usize,
    script_concurrency: usize,
    production: bool,
    dev: bool,
    global: bool,
    global_prefix: Option<PathBuf>,
    npat: bool,
    scripts: bool,
    lockfile: Option<Lockfile>,
    extractor: Option<Arc<dyn Extractor>>,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            depot: None,
            root: PathBuf::from("."),
            concurrency: DEFAULT_CONCURRENCY,
            script_concurrency: DEFAULT_SCRIPT_CONCURRENCY,
            production: false,
            dev: false,
            global: false,
            global_prefix: None,
            npat: false,
            scripts: true,
            lockfile: None,
            extractor: None,
        }
    }
}

impl InstallerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root directory of the project.
    pub fn root(mut self, path: impl AsRef<Path>) -> Self {
        self.root = PathBuf::from(path.as_ref());
        self
    }

    /// The package client to resolve and fetch through. Defaults to a client
    /// rooted at the project directory.
    pub fn depot(mut self, depot: Depot) -> Self {
        self.depot = Some(depot);
        self
    }

    /// Bounded concurrency for parallel phases and metadata fetches.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Bounded concurrency for parallel lifecycle script phases. Kept
    /// separate from `concurrency` because scripts are much heavier.
    pub fn script_concurrency(mut self, concurrency: usize) -> Self {
        self.script_concurrency = concurrency;
        self
    }

    /// Skip devDependencies of the root.
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Force devDependencies of the root even in production mode.
    pub fn dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Install into the global prefix instead of the project root.
    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Prefix directory used for global installs.
    pub fn global_prefix(mut self, path: impl AsRef<Path>) -> Self {
        self.global_prefix = Some(PathBuf::from(path.as_ref()));
        self
    }

    /// Run each installed package's `test` script after installation.
    pub fn npat(mut self, npat: bool) -> Self {
        self.npat = npat;
        self
    }

    /// Whether to run lifecycle scripts at all.
    pub fn scripts(mut self, scripts: bool) -> Self {
        self.scripts = scripts;
        self
    }

    /// Use this lockfile instead of looking for one on disk.
    pub fn lockfile(mut self, lockfile: Lockfile) -> Self {
        self.lockfile = Some(lockfile);
        self
    }

    /// Replace the tarball extractor.
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn build(self) -> Installer {
        let depot = self
            .depot
            .unwrap_or_else(|| DepotOpts::new().base_dir(&self.root).build());
        Installer {
            depot,
            root: self.root,
            concurrency: self.concurrency,
            script_concurrency: self.script_concurrency,
            production: self.production,
            dev: self.dev,
            global: self.global,
            global_prefix: self.global_prefix,
            npat: self.npat,
            scripts: self.scripts,
            lockfile: self.lockfile,
            extractor: self.extractor.unwrap_or_else(|| Arc::new(TarExtractor)),
        }
    }
}

/// What an install run did, and what it only grumbled about.
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub moved: usize,
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub fn action_count(&self) -> usize {
        self.added + self.removed + self.updated + self.moved
    }
}

/// The top-level install driver: computes the ideal tree, diffs it against
/// the on-disk tree, and applies the difference under an install lock.
pub struct Installer {
    depot: Depot,
    root: PathBuf,
    concurrency: usize,
    script_concurrency: usize,
    production: bool,
    dev: bool,
    global: bool,
    global_prefix: Option<PathBuf>,
    npat: bool,
    scripts: bool,
    lockfile: Option<Lockfile>,
    extractor: Arc<dyn Extractor>,
}

impl Installer {
    pub fn builder() -> InstallerOptions {
        InstallerOptions::new()
    }

    /// Install into the default location: the project root, or the global
    /// prefix in global mode.
    pub async fn install(&self, args: Vec<String>) -> Result<InstallReport, InstallerError> {
        let root = self.target_location();
        self.install_into(&root, args).await
    }

    /// Install into an explicit location. This is the internal form the
    /// driver uses when recursing for a nested install.
    pub async fn install_into(
        &self,
        location: &Path,
        args: Vec<String>,
    ) -> Result<InstallReport, InstallerError> {
        let start = std::time::Instant::now();
        let specs = self.parse_args(location, &args)?;
        let no_args = specs.is_empty();
        let manifest = self.read_root_manifest(location)?;
        let node_modules = location.join("node_modules");

        let lock = InstallLock::acquire(&node_modules, STAGING_DIR_NAME).await?;
        let result = self
            .run_pipeline(location, &manifest, specs, no_args)
            .await;
        let unlock = lock.release().await;
        if result.is_err() {
            if let Err(cleanup) = rimraf(&node_modules.join(STAGING_DIR_NAME)).await {
                tracing::warn!("Failed to clean up staging directory after error: {cleanup}");
            }
        }
        let report = match (result, unlock) {
            (Ok(report), Ok(())) => report,
            (Ok(_), Err(unlock_err)) => return Err(unlock_err),
            (Err(e), Ok(())) => return Err(e),
            (Err(e), Err(unlock_err)) => {
                // The unlock failure is secondary; log it and surface the
                // primary error.
                tracing::warn!("Failed to release install lock after error: {unlock_err}");
                return Err(e);
            }
        };
        tracing::debug!(
            "Installed into {} in {}ms.",
            location.display(),
            start.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Compute the action plan without taking the lock or touching the disk.
    pub async fn preview(
        &self,
        args: Vec<String>,
    ) -> Result<(Vec<Action>, Vec<String>), InstallerError> {
        let location = self.target_location();
        let specs = self.parse_args(&location, &args)?;
        let manifest = self.read_root_manifest(&location)?;
        let (current, ideal, warnings) = self.build_trees(&location, &manifest, specs).await?;
        Ok((diff_trees(&current, &ideal), warnings))
    }

    /// Resolve the ideal tree without applying anything.
    pub async fn resolve_ideal(
        &self,
        args: Vec<String>,
    ) -> Result<(Graph, Vec<String>), InstallerError> {
        let location = self.target_location();
        let specs = self.parse_args(&location, &args)?;
        let manifest = self.read_root_manifest(&location)?;
        let (_, ideal, warnings) = self.build_trees(&location, &manifest, specs).await?;
        Ok((ideal, warnings))
    }

    async fn run_pipeline(
        &self,
        location: &Path,
        manifest: &Manifest,
        specs: Vec<PackageSpec>,
        no_args: bool,
    ) -> Result<InstallReport, InstallerError> {
        let (current, ideal, mut warnings) = self.build_trees(location, manifest, specs).await?;
        let actions = diff_trees(&current, &ideal);

        let mut report = InstallReport::default();
        for action in &actions {
            match action {
                Action::Add { .. } => report.added += 1,
                Action::Remove { .. } => report.removed += 1,
                Action::Update { .. } => report.updated += 1,
                Action::Move { .. } => report.moved += 1,
            }
        }

        let plan = Plan::decompose(actions, self.npat);
        let scheduler = PhaseScheduler {
            graph: &ideal,
            root: location.to_path_buf(),
            staging: location.join("node_modules").join(STAGING_DIR_NAME),
            extractor: self.extractor.clone(),
            concurrency: self.concurrency,
            script_concurrency: self.script_concurrency,
            scripts: self.scripts,
        };
        warnings.extend(scheduler.execute(&plan).await?);

        // Top-level lifecycle hooks only run for plain `install` invocations.
        if no_args && self.scripts {
            self.run_root_lifecycle(location, manifest).await?;
        }

        report.warnings = warnings;
        Ok(report)
    }

    async fn build_trees(
        &self,
        location: &Path,
        manifest: &Manifest,
        specs: Vec<PackageSpec>,
    ) -> Result<(Graph, Graph, Vec<String>), InstallerError> {
        let current = actual::read_actual(location, manifest)?;
        let lockfile = self.get_lockfile(location, manifest)?;
        let has_args = !specs.is_empty();

        let mut ideal = if lockfile.is_some() {
            // The lockfile owns the tree shape; start over from a bare root.
            Graph::for_root(
                Depot::dummy_from_manifest(manifest.clone(), location),
                manifest.clone(),
            )
        } else {
            let mut seeded = current.clone();
            if has_args {
                // Explicit targets must not disturb the rest of the tree:
                // keep every existing placement as-is and justify it with
                // reconstructed requirement edges.
                seeded.connect_seeded_requirements();
                let root = seeded.root;
                seeded[root].loaded = true;
            } else {
                seeded.reset_loaded();
            }
            seeded
        };
        if let Some(lockfile) = &lockfile {
            let root = ideal.root;
            lockfile::inflate(
                &mut ideal,
                root,
                lockfile.pinned(),
                &self.depot,
                self.concurrency,
            )
            .await?;
        }

        let resolver = Resolver {
            depot: &self.depot,
            graph: ideal,
            concurrency: self.concurrency,
            dev: self.dev || !self.production,
            warnings: Vec::new(),
        };
        let (mut ideal, warnings) = resolver.run(specs).await?;

        if !has_args {
            let pruned = ideal.prune_extraneous();
            if !pruned.is_empty() {
                tracing::debug!(
                    "Pruned {} extraneous package(s) from the ideal tree.",
                    pruned.len()
                );
            }
        }
        ideal.validate()?;
        Ok((current, ideal, warnings))
    }

    async fn run_root_lifecycle(
        &self,
        location: &Path,
        manifest: &Manifest,
    ) -> Result<(), InstallerError> {
        let mut events = vec!["preinstall", "build", "postinstall"];
        if self.npat {
            events.push("test");
        }
        if !self.production {
            events.push("prepublish");
        }
        for event in events {
            if !manifest.scripts.contains_key(event) {
                continue;
            }
            let dir = location.to_path_buf();
            let workspace = location.to_path_buf();
            let manifest = manifest.clone();
            async_std::task::spawn_blocking(move || {
                LifecycleScript::new(&dir, event)?
                    .manifest(&manifest)
                    .workspace_path(workspace)
                    .run_logged()
            })
            .await?;
        }
        Ok(())
    }

    fn target_location(&self) -> PathBuf {
        if self.global {
            self.global_root()
        } else {
            self.root.clone()
        }
    }

    fn global_root(&self) -> PathBuf {
        self.global_prefix
            .clone()
            .or_else(|| std::env::var_os("WARREN_PREFIX").map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(|home| PathBuf::from(home).join(".warren"))
                    .unwrap_or_else(|| PathBuf::from(".warren"))
            })
            .join("lib")
    }

    fn parse_args(
        &self,
        location: &Path,
        args: &[String],
    ) -> Result<Vec<PackageSpec>, InstallerError> {
        let mut specs = Vec::new();
        for arg in args {
            let spec: PackageSpec = arg.parse()?;
            if !self.global && self.is_self_install(&spec, location) {
                tracing::warn!(
                    "Refusing to install the current project into itself; skipping `{arg}`."
                );
                continue;
            }
            specs.push(spec);
        }
        Ok(specs)
    }

    fn is_self_install(&self, spec: &PackageSpec, location: &Path) -> bool {
        let PackageSpec::Dir { path } = spec else {
            return false;
        };
        let arg = if path.is_absolute() {
            path.clone()
        } else {
            location.join(path)
        };
        match (dunce::canonicalize(location), dunce::canonicalize(arg)) {
            (Ok(target), Ok(arg)) => target == arg,
            _ => false,
        }
    }

    fn read_root_manifest(&self, location: &Path) -> Result<Manifest, InstallerError> {
        if !location.exists() {
            return Err(InstallerError::ManifestMissing(
                location.join("package.json"),
            ));
        }
        let path = location.join("package.json");
        match Manifest::from_path(&path) {
            Ok(manifest) => Ok(manifest),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // A missing manifest at the root just means an empty project.
                tracing::debug!(
                    "No package.json at {}; treating the root as an empty manifest.",
                    path.display()
                );
                Ok(Manifest::default())
            }
            Err(e) => Err(InstallerError::ManifestReadError(path, e)),
        }
    }

    fn get_lockfile(
        &self,
        location: &Path,
        manifest: &Manifest,
    ) -> Result<Option<Lockfile>, InstallerError> {
        if let Some(lockfile) = &self.lockfile {
            return Ok(Some(lockfile.clone()));
        }
        for file_name in ["warren-lock.json", "npm-shrinkwrap.json"] {
            let path = location.join(file_name);
            if path.exists() {
                match std::fs::read_to_string(&path)
                    .map_err(InstallerError::Io)
                    .and_then(Lockfile::from_json)
                {
                    Ok(lockfile) => return Ok(Some(lockfile)),
                    Err(e) => tracing::debug!("Failed to parse existing {file_name}: {e}"),
                }
            }
        }
        if let Some(pinned) = &manifest.shrinkwrap {
            return Ok(Some(Lockfile::from_pinned(pinned.clone())));
        }
        Ok(None)
    }
}
