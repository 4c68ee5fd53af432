//! Artifact types and the type registry.
//!
//! A type describes how an artifact participates in a build: its file
//! extension, the language it belongs to, whether its transitive dependencies
//! are pulled onto the consumer's paths, and which *path types* (classpath,
//! module path, processor path) its file is placed on.
//!
//! Some types *derive their children*: when a dependency is placed on an
//! annotation-processor path, everything beneath it must be placed there too.
//! The registry records, for each base type, the corresponding derived type
//! (`jar → processor`, `classpath-jar → classpath-processor`,
//! `modular-jar → modular-processor`); the derivation cascades through the
//! whole subtree during the type-derivation graph pass.

use crate::core::MasonError;
use std::collections::{BTreeSet, HashMap};

/// Default type id assumed for dependencies with no declared type.
pub const JAR: &str = "jar";
/// Jar pinned to the classpath.
pub const CLASSPATH_JAR: &str = "classpath-jar";
/// Jar pinned to the module path.
pub const MODULAR_JAR: &str = "modular-jar";
/// Annotation processor; placement decided by the compiler.
pub const PROCESSOR: &str = "processor";
/// Annotation processor pinned to the classpath.
pub const CLASSPATH_PROCESSOR: &str = "classpath-processor";
/// Annotation processor pinned to the module path.
pub const MODULAR_PROCESSOR: &str = "modular-processor";
/// Project descriptor, no build path placement.
pub const POM: &str = "pom";
/// Test classes archive.
pub const TEST_JAR: &str = "test-jar";

/// Where an artifact's file may be placed when building a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathType {
    /// The compile/runtime classpath.
    Classes,
    /// The Java module path.
    Modules,
    /// The annotation processor classpath.
    ProcessorClasses,
    /// The annotation processor module path.
    ProcessorModules,
}

/// An artifact type: id, language, packaging and path placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactType {
    /// Unique type id, e.g. `jar` or `classpath-processor`.
    pub id: String,
    /// Language this type belongs to (`java` or `none`).
    pub language: String,
    /// File extension used by the repository layout.
    pub extension: String,
    /// Default classifier, if any (e.g. `tests` for `test-jar`).
    pub classifier: Option<String>,
    /// Whether consumers inherit this artifact's transitive dependencies.
    pub includes_dependencies: bool,
    /// Path types this artifact's file may be placed on.
    pub path_types: BTreeSet<PathType>,
    /// Whether children of a node of this type must be remapped to the
    /// derived counterpart of their own type.
    pub derives_children: bool,
}

impl ArtifactType {
    fn new(id: &str, extension: &str) -> Self {
        Self {
            id: id.to_string(),
            language: "java".to_string(),
            extension: extension.to_string(),
            classifier: None,
            includes_dependencies: true,
            path_types: BTreeSet::new(),
            derives_children: false,
        }
    }

    fn paths(mut self, paths: &[PathType]) -> Self {
        self.path_types = paths.iter().copied().collect();
        self
    }

    fn deriving(mut self) -> Self {
        self.derives_children = true;
        self
    }

    fn classified(mut self, classifier: &str) -> Self {
        self.classifier = Some(classifier.to_string());
        self
    }
}

/// Registry of artifact types plus the child-derivation table.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, ArtifactType>,
    /// base type id -> derived type id
    derivations: HashMap<String, String>,
}

impl TypeRegistry {
    /// An empty registry. Most callers want [`TypeRegistry::default`].
    pub fn new() -> Self {
        Self { types: HashMap::new(), derivations: HashMap::new() }
    }

    /// Register a type.
    pub fn register(&mut self, ty: ArtifactType) {
        self.types.insert(ty.id.clone(), ty);
    }

    /// Register a child-derivation mapping from `base` to `derived`.
    pub fn register_derivation(&mut self, base: &str, derived: &str) {
        self.derivations.insert(base.to_string(), derived.to_string());
    }

    /// Look up a type by id.
    pub fn get(&self, id: &str) -> Option<&ArtifactType> {
        self.types.get(id)
    }

    /// Whether `id` names a type that requires its children to be remapped.
    pub fn derives_children(&self, id: &str) -> bool {
        self.types.get(id).is_some_and(|t| t.derives_children)
    }

    /// Whether `id` is itself a derived type (the target of some derivation).
    pub fn is_derived(&self, id: &str) -> bool {
        self.derivations.values().any(|d| d == id)
    }

    /// The derived counterpart of `base`, for a child of `parent_type`.
    ///
    /// Already-derived types map to themselves, which is what makes the
    /// type-derivation pass idempotent. A base type with no registered
    /// derivation is a fatal registry error naming the missing id.
    pub fn derive(&self, parent_type: &str, base: &str) -> Result<&ArtifactType, MasonError> {
        let target = if self.is_derived(base) {
            base
        } else {
            self.derivations.get(base).map(String::as_str).ok_or_else(|| {
                MasonError::UnknownDerivedType {
                    parent_type: parent_type.to_string(),
                    child_type: base.to_string(),
                }
            })?
        };
        self.get(target).ok_or_else(|| MasonError::UnknownDerivedType {
            parent_type: parent_type.to_string(),
            child_type: target.to_string(),
        })
    }
}

impl Default for TypeRegistry {
    /// The standard registry: jar/classpath-jar/modular-jar, their processor
    /// counterparts, pom and test-jar, plus the three derivation mappings.
    fn default() -> Self {
        let mut registry = Self::new();

        registry.register(
            ArtifactType::new(JAR, "jar").paths(&[PathType::Classes, PathType::Modules]),
        );
        registry.register(ArtifactType::new(CLASSPATH_JAR, "jar").paths(&[PathType::Classes]));
        registry.register(ArtifactType::new(MODULAR_JAR, "jar").paths(&[PathType::Modules]));
        registry.register(
            ArtifactType::new(PROCESSOR, "jar")
                .paths(&[PathType::ProcessorClasses, PathType::ProcessorModules])
                .deriving(),
        );
        registry.register(
            ArtifactType::new(CLASSPATH_PROCESSOR, "jar")
                .paths(&[PathType::ProcessorClasses])
                .deriving(),
        );
        registry.register(
            ArtifactType::new(MODULAR_PROCESSOR, "jar")
                .paths(&[PathType::ProcessorModules])
                .deriving(),
        );
        registry.register(ArtifactType {
            id: POM.to_string(),
            language: "none".to_string(),
            extension: "pom".to_string(),
            classifier: None,
            includes_dependencies: true,
            path_types: BTreeSet::new(),
            derives_children: false,
        });
        registry.register(
            ArtifactType::new(TEST_JAR, "jar").paths(&[PathType::Classes]).classified("tests"),
        );

        registry.register_derivation(JAR, PROCESSOR);
        registry.register_derivation(CLASSPATH_JAR, CLASSPATH_PROCESSOR);
        registry.register_derivation(MODULAR_JAR, MODULAR_PROCESSOR);

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_standard_types() {
        let registry = TypeRegistry::default();
        for id in [JAR, CLASSPATH_JAR, MODULAR_JAR, PROCESSOR, CLASSPATH_PROCESSOR, MODULAR_PROCESSOR, POM, TEST_JAR]
        {
            assert!(registry.get(id).is_some(), "missing type {id}");
        }
    }

    #[test]
    fn processor_types_derive_children() {
        let registry = TypeRegistry::default();
        assert!(registry.derives_children(PROCESSOR));
        assert!(registry.derives_children(MODULAR_PROCESSOR));
        assert!(!registry.derives_children(JAR));
    }

    #[test]
    fn derivation_maps_base_to_processor_counterpart() {
        let registry = TypeRegistry::default();
        assert_eq!(registry.derive(PROCESSOR, JAR).unwrap().id, PROCESSOR);
        assert_eq!(registry.derive(PROCESSOR, CLASSPATH_JAR).unwrap().id, CLASSPATH_PROCESSOR);
        assert_eq!(registry.derive(PROCESSOR, MODULAR_JAR).unwrap().id, MODULAR_PROCESSOR);
    }

    #[test]
    fn derivation_is_stable_on_derived_types() {
        let registry = TypeRegistry::default();
        assert_eq!(registry.derive(PROCESSOR, PROCESSOR).unwrap().id, PROCESSOR);
        assert_eq!(
            registry.derive(PROCESSOR, CLASSPATH_PROCESSOR).unwrap().id,
            CLASSPATH_PROCESSOR
        );
    }

    #[test]
    fn unknown_base_type_is_fatal_and_named() {
        let registry = TypeRegistry::default();
        let err = registry.derive(PROCESSOR, "war").unwrap_err();
        match err {
            MasonError::UnknownDerivedType { parent_type, child_type } => {
                assert_eq!(parent_type, PROCESSOR);
                assert_eq!(child_type, "war");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_jar_carries_tests_classifier() {
        let registry = TypeRegistry::default();
        assert_eq!(registry.get(TEST_JAR).unwrap().classifier.as_deref(), Some("tests"));
    }
}
