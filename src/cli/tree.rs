//! The `tree` command.

use crate::artifact::{Artifact, ArtifactCoordinate, TypeRegistry};
use crate::graph::builder::{CollectRequest, GraphBuilder};
use crate::graph::policy::{ClassicDependencyManager, ScopeDependencyTraverser};
use crate::graph::transform::{TransformContext, TransformPipeline};
use crate::manifest::Manifest;
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// Resolve and print a module's dependency tree.
#[derive(Args)]
pub struct TreeCommand {
    /// Module id (group:artifact:version); defaults to the only module
    module: Option<String>,

    /// Print the raw collected graph, before conflict resolution
    #[arg(long)]
    raw: bool,
}

impl TreeCommand {
    pub async fn execute(self, manifest_path: &Path) -> Result<()> {
        let manifest = Manifest::load(manifest_path)
            .with_context(|| format!("Failed to load {}", manifest_path.display()))?;
        let projects = manifest.projects()?;

        let project = match &self.module {
            Some(id) => projects
                .iter()
                .find(|p| p.id.to_string() == *id)
                .with_context(|| format!("no module '{id}' in the manifest"))?,
            None if projects.len() == 1 => &projects[0],
            None => bail!("multiple modules in the manifest, pass a module id"),
        };

        let reader = manifest.metadata_reader()?;
        let builder = GraphBuilder::new(&reader);
        let root = Artifact::new(ArtifactCoordinate::new(
            &project.id.group_id,
            &project.id.artifact_id,
            &project.id.version,
        ));
        let mut result = builder
            .collect(CollectRequest {
                root: Some(root),
                dependencies: project.dependencies.clone(),
                manager: ClassicDependencyManager::empty(),
                traverser: ScopeDependencyTraverser::standard(),
            })
            .await?;

        if !self.raw {
            let pipeline = TransformPipeline::standard();
            let mut ctx = TransformContext::new(Arc::new(TypeRegistry::default()));
            pipeline.run(&mut result.graph, &mut ctx)?;
        }

        print!("{}", result.graph.to_tree_string());
        for incident in &result.incidents {
            eprintln!(
                "{} optional dependency {} not resolved: {}",
                "warning:".yellow(),
                incident.coordinate,
                incident.reason
            );
        }
        Ok(())
    }
}
