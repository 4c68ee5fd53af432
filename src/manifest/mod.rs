//! The `mason.toml` manifest.
//!
//! A manifest declares the reactor: its modules, their dependencies, the
//! shell commands bound to lifecycle phases, and an optional dependency
//! metadata registry that backs resolution without a remote repository.
//!
//! ```toml
//! [build]
//! threads = 4
//! fail = "at-end"
//!
//! [[modules]]
//! id = "org.example:lib:1.0"
//!
//! [modules.phases]
//! compile = ["make lib"]
//!
//! [[modules]]
//! id = "org.example:app:1.0"
//! dependencies = [
//!     "org.example:lib:1.0",
//!     { coordinate = "junit:junit:4.13", scope = "test" },
//! ]
//!
//! [metadata."junit:junit:4.13"]
//! dependencies = ["org.hamcrest:hamcrest-core:1.3"]
//! ```

use crate::artifact::{ArtifactCoordinate, Exclusion};
use crate::core::{MasonError, Scope};
use crate::executor::ReactorFailureBehavior;
use crate::executor::mojo::MojoExecution;
use crate::graph::Dependency;
use crate::graph::builder::InMemoryMetadata;
use crate::project::{Project, ProjectId};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MANIFEST_FILE: &str = "mason.toml";

/// Parsed `mason.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default, rename = "remote")]
    pub remotes: Vec<RemoteSection>,
    #[serde(default, rename = "modules")]
    pub modules: Vec<ModuleSection>,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataSection>,
}

/// Global build settings.
#[derive(Debug, Deserialize, Default)]
pub struct BuildSection {
    /// Worker budget; `None` means one per available core.
    pub threads: Option<usize>,
    /// Failure behavior: `fast`, `at-end` or `never`.
    pub fail: Option<String>,
    /// Local repository root; defaults to `~/.mason/repository`.
    #[serde(rename = "local-repository")]
    pub local_repository: Option<PathBuf>,
}

/// One remote repository.
#[derive(Debug, Deserialize)]
pub struct RemoteSection {
    pub name: String,
    pub url: String,
}

/// One reactor module.
#[derive(Debug, Deserialize)]
pub struct ModuleSection {
    pub id: String,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Phase name to bound mojos.
    #[serde(default)]
    pub phases: HashMap<String, Vec<MojoSpec>>,
}

/// Dependency metadata for one external coordinate.
#[derive(Debug, Deserialize, Default)]
pub struct MetadataSection {
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// A dependency, either a bare coordinate string or a detailed table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Coordinate(String),
    Detailed {
        coordinate: String,
        #[serde(default)]
        scope: Scope,
        #[serde(default, rename = "type")]
        type_id: Option<String>,
        #[serde(default)]
        optional: bool,
        #[serde(default)]
        exclusions: Vec<String>,
    },
}

impl DependencySpec {
    fn to_dependency(&self) -> Result<Dependency, MasonError> {
        match self {
            Self::Coordinate(spec) => Ok(Dependency::new(parse_coordinate(spec)?)),
            Self::Detailed { coordinate, scope, type_id, optional, exclusions } => {
                let mut dependency =
                    Dependency::new(parse_coordinate(coordinate)?).with_scope(*scope);
                if let Some(type_id) = type_id {
                    dependency = dependency.with_type(type_id);
                }
                if *optional {
                    dependency = dependency.optional();
                }
                for exclusion in exclusions {
                    dependency = dependency.exclude(Exclusion::parse(exclusion));
                }
                Ok(dependency)
            }
        }
    }
}

/// A mojo binding, either a bare command or a table with id and priority.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MojoSpec {
    Command(String),
    Detailed {
        id: String,
        run: String,
        #[serde(default)]
        priority: i32,
    },
}

impl MojoSpec {
    fn to_execution(&self, phase: &str, index: usize) -> MojoExecution {
        match self {
            Self::Command(command) => {
                MojoExecution::new(format!("{phase}-{index}"), command)
            }
            Self::Detailed { id, run, priority } => {
                MojoExecution::new(id, run).with_priority(*priority)
            }
        }
    }
}

fn parse_coordinate(spec: &str) -> Result<ArtifactCoordinate, MasonError> {
    ArtifactCoordinate::parse(spec)
        .ok_or_else(|| MasonError::InvalidModuleId { id: spec.to_string() })
}

impl Manifest {
    /// Load a manifest from a file.
    pub fn load(path: &Path) -> Result<Self, MasonError> {
        if !path.is_file() {
            return Err(MasonError::ManifestNotFound { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), modules = manifest.modules.len(), "loaded manifest");
        Ok(manifest)
    }

    /// Materialize the reactor projects.
    pub fn projects(&self) -> Result<Vec<Project>, MasonError> {
        let mut projects = Vec::with_capacity(self.modules.len());
        for module in &self.modules {
            let mut project = Project::new(ProjectId::parse(&module.id)?);
            for spec in &module.dependencies {
                project.dependencies.push(spec.to_dependency()?);
            }
            for (phase, mojos) in &module.phases {
                for (index, spec) in mojos.iter().enumerate() {
                    project
                        .executions
                        .entry(phase.clone())
                        .or_default()
                        .push(spec.to_execution(phase, index));
                }
            }
            projects.push(project);
        }
        Ok(projects)
    }

    /// Build the metadata reader: every `[metadata]` entry plus the reactor
    /// modules themselves, so module coordinates resolve inside the graph.
    pub fn metadata_reader(&self) -> Result<InMemoryMetadata, MasonError> {
        let reader = InMemoryMetadata::new();
        for (coordinate, section) in &self.metadata {
            let coordinate = parse_coordinate(coordinate)?;
            let dependencies = section
                .dependencies
                .iter()
                .map(DependencySpec::to_dependency)
                .collect::<Result<Vec<_>, _>>()?;
            reader.register(&coordinate, dependencies);
        }
        for module in &self.modules {
            let id = ProjectId::parse(&module.id)?;
            let coordinate = ArtifactCoordinate::new(&id.group_id, &id.artifact_id, &id.version);
            let dependencies = module
                .dependencies
                .iter()
                .map(DependencySpec::to_dependency)
                .collect::<Result<Vec<_>, _>>()?;
            reader.register(&coordinate, dependencies);
        }
        Ok(reader)
    }

    /// Failure behavior from the `[build]` section.
    pub fn failure_behavior(&self) -> ReactorFailureBehavior {
        match self.build.fail.as_deref() {
            Some("at-end") => ReactorFailureBehavior::FailAtEnd,
            Some("never") => ReactorFailureBehavior::FailNever,
            _ => ReactorFailureBehavior::FailFast,
        }
    }

    /// Worker budget from the `[build]` section, defaulting to the core
    /// count.
    pub fn threads(&self) -> usize {
        self.build.threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        })
    }

    /// Local repository root. An explicit relative path is anchored at
    /// `base`; the default is the user-level `~/.mason/repository`.
    pub fn local_repository(&self, base: &Path) -> PathBuf {
        match &self.build.local_repository {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => base.join(path),
            None => dirs::home_dir()
                .map(|home| home.join(".mason").join("repository"))
                .unwrap_or_else(|| base.join(".mason").join("repository")),
        }
    }
}
