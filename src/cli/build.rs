//! The `build` command.

use crate::executor::mojo::CommandMojoExecutor;
use crate::executor::{BuildPlanExecutor, ReactorFailureBehavior};
use crate::lifecycle::default_lifecycle;
use crate::lifecycle::plan::BuildPlan;
use crate::manifest::Manifest;
use crate::project::ReactorGraph;
use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Run the build lifecycle up to a phase.
#[derive(Args)]
pub struct BuildCommand {
    /// End phase, e.g. compile, test, package, install
    #[arg(default_value = "install")]
    phase: String,

    /// Worker budget (overrides the manifest)
    #[arg(short = 'T', long)]
    threads: Option<usize>,

    /// Failure behavior: fast, at-end or never (overrides the manifest)
    #[arg(long)]
    fail: Option<String>,
}

impl BuildCommand {
    pub async fn execute(self, manifest_path: &Path) -> Result<()> {
        let manifest = Manifest::load(manifest_path)
            .with_context(|| format!("Failed to load {}", manifest_path.display()))?;
        let projects = manifest.projects()?;
        if projects.is_empty() {
            bail!("manifest declares no modules");
        }

        let reactor = ReactorGraph::from_projects(&projects)?;
        let lifecycle = default_lifecycle();
        let plan = BuildPlan::for_phase(&projects, &reactor, &lifecycle, &self.phase)?;

        let threads = self.threads.unwrap_or_else(|| manifest.threads());
        let behavior = match self.fail.as_deref() {
            Some("fast") => ReactorFailureBehavior::FailFast,
            Some("at-end") => ReactorFailureBehavior::FailAtEnd,
            Some("never") => ReactorFailureBehavior::FailNever,
            Some(other) => bail!("unknown failure behavior '{other}'"),
            None => manifest.failure_behavior(),
        };

        let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
        info!(phase = %self.phase, projects = projects.len(), "building");

        let mojo_executor = Arc::new(CommandMojoExecutor::in_dir(base_dir));
        let summary = BuildPlanExecutor::new(mojo_executor, threads)
            .with_behavior(behavior)
            .execute(plan)
            .await?;

        println!("{summary}");
        if !summary.is_success() {
            bail!("build failed");
        }
        Ok(())
    }
}
