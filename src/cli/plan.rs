//! The `plan` command.

use crate::lifecycle::default_lifecycle;
use crate::lifecycle::plan::BuildPlan;
use crate::manifest::Manifest;
use crate::project::ReactorGraph;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// Print the concurrent build plan without executing it.
#[derive(Args)]
pub struct PlanCommand {
    /// End phase
    #[arg(default_value = "install")]
    phase: String,

    /// Include planned-skip steps (phases past the end phase)
    #[arg(long)]
    all: bool,
}

impl PlanCommand {
    pub async fn execute(self, manifest_path: &Path) -> Result<()> {
        let manifest = Manifest::load(manifest_path)
            .with_context(|| format!("Failed to load {}", manifest_path.display()))?;
        let projects = manifest.projects()?;
        let reactor = ReactorGraph::from_projects(&projects)?;
        let plan = BuildPlan::for_phase(&projects, &reactor, &default_lifecycle(), &self.phase)?;

        println!("{}", format!("Build plan up to '{}':", self.phase).bold());
        for step in plan.steps() {
            if step.is_planned_skip() && !self.all {
                continue;
            }
            let marker = if step.is_planned_skip() { " (skip)".dimmed().to_string() } else { String::new() };
            println!("  {}{}", step.step_ref(), marker);
            for predecessor in &step.predecessors {
                println!("    after {predecessor}");
            }
            for mojo in &step.mojos {
                println!("    run [{}] {}", mojo.id, mojo.goal);
            }
        }
        Ok(())
    }
}
