//! Dependency metadata read from a local repository.
//!
//! Each artifact may carry a descriptor file installed next to it under the
//! same layout, with the `deps.toml` extension:
//!
//! ```toml
//! dependencies = [
//!     "org.hamcrest:hamcrest-core:1.3",
//!     { coordinate = "junit:junit:4.13", scope = "test", optional = true },
//! ]
//! ```
//!
//! An artifact without a descriptor reads as having no dependencies, matching
//! how a repository treats artifacts published without metadata. Available
//! versions are listed from the artifact's version directories.

use super::LocalRepository;
use crate::artifact::{ArtifactCoordinate, Exclusion};
use crate::core::{MasonError, Scope};
use crate::graph::Dependency;
use crate::graph::builder::{DependencyMetadata, MetadataReader};
use crate::version::Version;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// Extension of descriptor files in the repository layout.
pub const METADATA_EXTENSION: &str = "deps.toml";

#[derive(Debug, Deserialize, Default)]
struct Descriptor {
    #[serde(default)]
    dependencies: Vec<DescriptorDependency>,
}

/// One dependency in a descriptor, mirroring the manifest's spec forms.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DescriptorDependency {
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

impl DescriptorDependency {
    fn to_dependency(&self, descriptor: &ArtifactCoordinate) -> Result<Dependency, MasonError> {
        let parse = |spec: &str| {
            ArtifactCoordinate::parse(spec).ok_or_else(|| MasonError::MetadataUnavailable {
                coordinate: descriptor.to_string(),
                reason: format!("malformed dependency coordinate '{spec}'"),
            })
        };
        match self {
            Self::Coordinate(spec) => Ok(Dependency::new(parse(spec)?)),
            Self::Detailed { coordinate, scope, type_id, optional, exclusions } => {
                let mut dependency = Dependency::new(parse(coordinate)?).with_scope(*scope);
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

/// [`MetadataReader`] backed by descriptor files in a [`LocalRepository`].
pub struct RepositoryMetadata<'a> {
    repository: &'a LocalRepository,
}

impl<'a> RepositoryMetadata<'a> {
    pub fn new(repository: &'a LocalRepository) -> Self {
        Self { repository }
    }

    fn descriptor_path(&self, coordinate: &ArtifactCoordinate) -> PathBuf {
        let descriptor = coordinate.clone().with_extension(METADATA_EXTENSION);
        self.repository.artifact_path(&descriptor)
    }

    fn artifact_dir(&self, group_id: &str, artifact_id: &str) -> PathBuf {
        let mut dir = self.repository.root().to_path_buf();
        for segment in group_id.split('.') {
            dir.push(segment);
        }
        dir.push(artifact_id);
        dir
    }
}

#[async_trait]
impl MetadataReader for RepositoryMetadata<'_> {
    async fn read_dependencies(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<DependencyMetadata, MasonError> {
        let path = self.descriptor_path(coordinate);
        if !path.is_file() {
            debug!(artifact = %coordinate, "no descriptor, reading as a leaf");
            return Ok(DependencyMetadata::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|err| {
            MasonError::MetadataUnavailable {
                coordinate: coordinate.to_string(),
                reason: err.to_string(),
            }
        })?;
        let descriptor: Descriptor = toml::from_str(&content).map_err(|err| {
            MasonError::MetadataUnavailable {
                coordinate: coordinate.to_string(),
                reason: err.to_string(),
            }
        })?;

        let dependencies = descriptor
            .dependencies
            .iter()
            .map(|spec| spec.to_dependency(coordinate))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DependencyMetadata { dependencies })
    }

    async fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<Version>, MasonError> {
        let dir = self.artifact_dir(group_id, artifact_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.push(Version::parse(&entry.file_name().to_string_lossy()));
            }
        }
        Ok(versions)
    }
}
