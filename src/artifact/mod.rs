//! Artifact coordinates and the artifact value model.
//!
//! An [`ArtifactCoordinate`] is the immutable identity of an artifact:
//! `group:artifact:version` plus a file extension and an optional classifier.
//! Equality and hashing are coordinate-based with the version included; the
//! *base version* differs from the resolved version only for timestamped
//! snapshots (see [`crate::version::base_version_of`]).
//!
//! An [`Artifact`] pairs a coordinate with a type id from the
//! [`types::TypeRegistry`]. Graph nodes hold artifacts as swappable values:
//! transformations such as type derivation replace the artifact rather than
//! mutating it, keeping the value itself immutable.

pub mod exclusion;
pub mod types;

pub use exclusion::Exclusion;
pub use types::{ArtifactType, PathType, TypeRegistry};

use crate::version::base_version_of;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable artifact identity: `{group, artifact, version, extension,
/// classifier}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactCoordinate {
    /// Group identifier, e.g. `org.apache.maven`.
    pub group_id: String,
    /// Artifact identifier within the group.
    pub artifact_id: String,
    /// Resolved version string.
    pub version: String,
    /// File extension, e.g. `jar`.
    pub extension: String,
    /// Optional classifier, e.g. `sources`.
    pub classifier: Option<String>,
}

impl ArtifactCoordinate {
    /// Create a coordinate with the default `jar` extension and no classifier.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            extension: "jar".to_string(),
            classifier: None,
        }
    }

    /// Builder-style extension override.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Builder-style classifier override.
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// Builder-style version override, keeping everything else.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The `group:artifact` pair, the key used for version-level lookups.
    pub fn versionless_id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// The base version: equal to `version` except for timestamped snapshots,
    /// which collapse to their `-SNAPSHOT` base. Used by the repository
    /// layout.
    pub fn base_version(&self) -> String {
        base_version_of(&self.version)
    }

    /// Parse `group:artifact:version[:extension[:classifier]]`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split(':');
        let group_id = parts.next()?.to_string();
        let artifact_id = parts.next()?.to_string();
        let version = parts.next()?.to_string();
        if group_id.is_empty() || artifact_id.is_empty() || version.is_empty() {
            return None;
        }
        let extension = parts.next().map(str::to_string).unwrap_or_else(|| "jar".to_string());
        let classifier = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return None;
        }
        Some(Self { group_id, artifact_id, version, extension, classifier })
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if self.extension != "jar" {
            write!(f, ":{}", self.extension)?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.version)
    }
}

/// An artifact value: a coordinate plus its resolved type.
///
/// Artifacts are immutable; graph transformations that change an artifact's
/// type produce a new value and swap it into the owning node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    /// The artifact's coordinate.
    pub coordinate: ArtifactCoordinate,
    /// Type id, resolved against the [`TypeRegistry`].
    pub type_id: String,
}

impl Artifact {
    /// Create an artifact of the default `jar` type.
    pub fn new(coordinate: ArtifactCoordinate) -> Self {
        Self { coordinate, type_id: types::JAR.to_string() }
    }

    /// Create an artifact with an explicit type id.
    pub fn with_type(coordinate: ArtifactCoordinate, type_id: impl Into<String>) -> Self {
        Self { coordinate, type_id: type_id.into() }
    }

    /// A copy of this artifact remapped to `ty`, taking the type's extension
    /// and classifier defaults. Used by type derivation.
    pub fn retyped(&self, ty: &ArtifactType) -> Artifact {
        let mut coordinate = self.coordinate.clone();
        coordinate.extension = ty.extension.clone();
        if coordinate.classifier.is_none() {
            coordinate.classifier = ty.classifier.clone();
        }
        Artifact { coordinate, type_id: ty.id.clone() }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.coordinate.fmt(f)
    }
}
