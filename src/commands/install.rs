use std::path::PathBuf;

use async_trait::async_trait;
use clap::Args;
use miette::Result;
use url::Url;
use warren_installer::{DepotOpts, Installer};

use crate::commands::WarrenCommand;

/// Installs packages into the project's `node_modules/`, adding, removing,
/// and updating as needed. With no specifiers, this makes `node_modules/`
/// match the project manifest (and lockfile, when one exists); with
/// specifiers, only the named packages and their transitive requirements are
/// touched.
#[derive(Debug, Args)]
#[command(next_help_heading = "Install Options")]
pub struct InstallCmd {
    /// Package specifiers to install.
    #[arg(value_name = "SPEC")]
    packages: Vec<String>,

    /// Skip devDependencies of the root project.
    #[arg(long)]
    production: bool,

    /// Install devDependencies even in production mode.
    #[arg(long)]
    dev: bool,

    /// Install into the global prefix instead of the current project.
    #[arg(long, short = 'g')]
    global: bool,

    /// Prefix directory for global installs.
    #[arg(long)]
    global_prefix: Option<PathBuf>,

    /// Run every installed package's `test` script after installation.
    #[arg(long)]
    npat: bool,

    /// Skip running lifecycle scripts.
    #[arg(long = "no-scripts", alias = "ignore-scripts", action = clap::ArgAction::SetFalse)]
    scripts: bool,

    /// Print the action plan without touching the disk.
    #[arg(long)]
    dry_run: bool,

    /// Number of concurrent operations during parallel install phases.
    #[arg(long, default_value_t = warren_installer::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Number of concurrently executing lifecycle scripts.
    ///
    /// This option is separate from `concurrency` because executing
    /// concurrent scripts is a much heavier operation.
    #[arg(long, default_value_t = warren_installer::DEFAULT_SCRIPT_CONCURRENCY)]
    script_concurrency: usize,

    #[arg(from_global)]
    root: PathBuf,

    #[arg(from_global)]
    registry: Url,

    #[arg(from_global)]
    unicode: bool,
}

#[async_trait]
impl WarrenCommand for InstallCmd {
    async fn execute(self) -> Result<()> {
        let total_time = std::time::Instant::now();
        let installer = self.configured_installer();

        if self.dry_run {
            let (actions, warnings) = installer.preview(self.packages.clone()).await?;
            for action in &actions {
                tracing::info!("would {action}");
            }
            tracing::info!(
                "{}Planned {} action(s); nothing was touched.",
                self.emoji_magnifying_glass(),
                actions.len()
            );
            if !warnings.is_empty() {
                tracing::warn!("{} warning(s) during planning.", warnings.len());
            }
            return Ok(());
        }

        let report = installer.install(self.packages.clone()).await?;
        tracing::info!(
            "{}Added {}, removed {}, updated {}, moved {} in {}s.",
            self.emoji_package(),
            report.added,
            report.removed,
            report.updated,
            report.moved,
            total_time.elapsed().as_millis() as f32 / 1000.0
        );
        if !report.warnings.is_empty() {
            tracing::warn!(
                "Completed with {} warning(s); see above for details.",
                report.warnings.len()
            );
        }
        Ok(())
    }
}

impl InstallCmd {
    fn configured_installer(&self) -> Installer {
        let depot = DepotOpts::new()
            .base_dir(&self.root)
            .registry(self.registry.clone())
            .build();
        let mut options = Installer::builder()
            .root(&self.root)
            .depot(depot)
            .concurrency(self.concurrency)
            .script_concurrency(self.script_concurrency)
            .production(self.production)
            .dev(self.dev)
            .global(self.global)
            .npat(self.npat)
            .scripts(self.scripts);
        if let Some(prefix) = &self.global_prefix {
            options = options.global_prefix(prefix);
        }
        options.build()
    }

    fn emoji_package(&self) -> &'static str {
        self.maybe_emoji("📦 ")
    }

    fn emoji_magnifying_glass(&self) -> &'static str {
        self.maybe_emoji("🔍 ")
    }

    fn maybe_emoji(&self, emoji: &'static str) -> &'static str {
        if self.unicode {
            emoji
        } else {
            ""
        }
    }
}
