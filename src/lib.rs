//! Warren installs nested `node_modules/`-style package trees: it resolves
//! an ideal tree from your manifest (honoring lockfiles), diffs it against
//! what's already on disk, and applies only the difference through a staged,
//! phase-ordered pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use commands::WarrenCommand;

mod commands;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Warren {
    /// Path to the project to operate on.
    #[arg(
        help_heading = "Global Options",
        global = true,
        long,
        default_value = "."
    )]
    root: PathBuf,

    /// Registry used for registry-style package specifiers.
    #[arg(
        help_heading = "Global Options",
        global = true,
        long,
        default_value = "https://registry.npmjs.org"
    )]
    registry: Url,

    /// Log output level/directive.
    ///
    /// Supports plain loglevels (off, error, warn, info, debug, trace) as
    /// well as more advanced directives in the format
    /// `target[span{field=value}]=level`.
    #[arg(
        help_heading = "Global Options",
        global = true,
        long,
        default_value = "info"
    )]
    loglevel: String,

    /// Disable all output.
    #[arg(help_heading = "Global Options", global = true, long, short)]
    quiet: bool,

    /// Disable printing emoji.
    ///
    /// By default, this will show emoji when outputting to a TTY that
    /// supports unicode.
    #[arg(
        help_heading = "Global Options",
        global = true,
        long = "no-unicode",
        action = clap::ArgAction::SetFalse,
        default_value_t = supports_unicode::on(supports_unicode::Stream::Stderr)
    )]
    unicode: bool,

    #[command(subcommand)]
    subcommand: WarrenCmd,
}

#[derive(Debug, Subcommand)]
enum WarrenCmd {
    Install(commands::install::InstallCmd),
}

impl Warren {
    pub async fn load() -> Result<()> {
        let warren = Warren::parse();
        warren.setup_logging()?;
        warren.execute().await
    }

    fn setup_logging(&self) -> Result<()> {
        let filter = if self.quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_new(&self.loglevel).into_diagnostic()?
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
            .into_diagnostic()?;
        Ok(())
    }

    async fn execute(self) -> Result<()> {
        match self.subcommand {
            WarrenCmd::Install(cmd) => cmd.execute().await,
        }
    }
}
