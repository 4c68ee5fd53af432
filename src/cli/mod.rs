//! Command-line interface for Mason.
//!
//! Three commands cover the build workflow:
//! - `build` runs the reactor through the lifecycle up to a phase
//! - `tree` resolves and prints a module's dependency graph
//! - `plan` prints the concurrent build plan without executing it
//!
//! Each command is implemented in its own module with its own argument
//! struct and execution logic.

mod build;
mod plan;
mod tree;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Mason, a build-lifecycle orchestrator for multi-module projects.
#[derive(Parser)]
#[command(name = "mason", version, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the manifest file (defaults to ./mason.toml)
    #[arg(long, global = true)]
    manifest_path: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build lifecycle up to a phase.
    Build(build::BuildCommand),

    /// Resolve and print a module's dependency tree.
    Tree(tree::TreeCommand),

    /// Print the concurrent build plan without executing it.
    Plan(plan::PlanCommand),
}

impl Cli {
    /// Log filter directive derived from the verbosity flags.
    pub fn log_directive(&self) -> Option<&'static str> {
        if self.quiet {
            None
        } else if self.verbose {
            Some("mason_cli=debug")
        } else {
            Some("mason_cli=info")
        }
    }

    /// Manifest path, defaulting to `mason.toml` in the working directory.
    fn manifest_path(&self) -> PathBuf {
        self.manifest_path.clone().unwrap_or_else(|| PathBuf::from(crate::manifest::MANIFEST_FILE))
    }

    pub async fn execute(self) -> Result<()> {
        let manifest_path = self.manifest_path();
        match self.command {
            Commands::Build(cmd) => cmd.execute(&manifest_path).await,
            Commands::Tree(cmd) => cmd.execute(&manifest_path).await,
            Commands::Plan(cmd) => cmd.execute(&manifest_path).await,
        }
    }
}
