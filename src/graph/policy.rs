//! Derivable per-node collection policies.
//!
//! Every node of the dependency graph carries its own management and
//! traversal policy, derived from its parent's policy as collection descends.
//! Derivation is a pure function of (parent policy, child node): policies are
//! immutable and shared behind `Arc`, never mutated in place, so concurrent
//! collections can share them freely.

use crate::artifact::Exclusion;
use crate::core::Scope;
use crate::graph::{Dependency, DependencyNode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Rewrites declared dependencies according to dependency management before
/// nodes are created for them.
pub trait DependencyManager: Send + Sync {
    /// Apply management to a dependency declared by `parent`, possibly
    /// overriding its version, scope or optional flag.
    fn manage(&self, parent: &DependencyNode, dependency: Dependency) -> Dependency;

    /// Derive the manager for the subtree rooted at `child`.
    fn derive_for_child(&self, child: &DependencyNode) -> Arc<dyn DependencyManager>;
}

/// Decides whether collection descends into a node's own dependencies. A
/// rejected node is still included as a child; it just stays a leaf.
pub trait DependencyTraverser: Send + Sync {
    /// Whether to read `node`'s own dependencies.
    fn accept(&self, node: &DependencyNode) -> bool;

    /// Derive the traverser for the subtree rooted at `child`.
    fn derive_for_child(&self, child: &DependencyNode) -> Arc<dyn DependencyTraverser>;
}

/// A single management override, keyed by `group:artifact`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyOverride {
    /// Version to force, if any.
    pub version: Option<String>,
    /// Scope to force, if any.
    pub scope: Option<Scope>,
    /// Optional flag to force, if any.
    pub optional: Option<bool>,
    /// Additional exclusions merged into the dependency.
    pub exclusions: Vec<Exclusion>,
}

/// The classic depth-aware manager: management applies to *transitive*
/// dependencies only. Direct dependencies of the requesting project keep
/// their declared values; from depth two onward the override table wins.
pub struct ClassicDependencyManager {
    overrides: Arc<HashMap<(String, String), DependencyOverride>>,
    depth: usize,
}

impl ClassicDependencyManager {
    /// Create a root-level manager from an override table.
    pub fn new(overrides: HashMap<(String, String), DependencyOverride>) -> Arc<Self> {
        Arc::new(Self { overrides: Arc::new(overrides), depth: 0 })
    }

    /// A manager with no overrides.
    pub fn empty() -> Arc<Self> {
        Self::new(HashMap::new())
    }
}

impl DependencyManager for ClassicDependencyManager {
    fn manage(&self, _parent: &DependencyNode, mut dependency: Dependency) -> Dependency {
        // depth is the parent's depth; its children sit at depth + 1, and
        // management only kicks in from the second level down.
        if self.depth < 1 {
            return dependency;
        }
        let key = (
            dependency.coordinate.group_id.clone(),
            dependency.coordinate.artifact_id.clone(),
        );
        if let Some(rule) = self.overrides.get(&key) {
            if let Some(version) = &rule.version {
                dependency.coordinate.version = version.clone();
            }
            if let Some(scope) = rule.scope {
                dependency.scope = scope;
            }
            if let Some(optional) = rule.optional {
                dependency.optional = optional;
            }
            dependency.exclusions.extend(rule.exclusions.iter().cloned());
        }
        dependency
    }

    fn derive_for_child(&self, _child: &DependencyNode) -> Arc<dyn DependencyManager> {
        Arc::new(Self { overrides: Arc::clone(&self.overrides), depth: self.depth + 1 })
    }
}

/// A manager that applies no management at any depth.
pub struct NoopDependencyManager;

impl DependencyManager for NoopDependencyManager {
    fn manage(&self, _parent: &DependencyNode, dependency: Dependency) -> Dependency {
        dependency
    }

    fn derive_for_child(&self, _child: &DependencyNode) -> Arc<dyn DependencyManager> {
        Arc::new(NoopDependencyManager)
    }
}

/// The standard traverser: refuses to descend into subtrees whose root has a
/// skipped scope (by default `test` and `provided`) or, optionally, is marked
/// optional. The refused node itself remains in its parent's children.
pub struct ScopeDependencyTraverser {
    skip_scopes: HashSet<Scope>,
    skip_optional: bool,
}

impl ScopeDependencyTraverser {
    /// The default policy: skip `test` and `provided` subtrees, descend into
    /// optional ones.
    pub fn standard() -> Arc<Self> {
        Arc::new(Self {
            skip_scopes: HashSet::from([Scope::Test, Scope::Provided]),
            skip_optional: false,
        })
    }

    /// Custom skip set.
    pub fn new(skip_scopes: HashSet<Scope>, skip_optional: bool) -> Arc<Self> {
        Arc::new(Self { skip_scopes, skip_optional })
    }
}

impl DependencyTraverser for ScopeDependencyTraverser {
    fn accept(&self, node: &DependencyNode) -> bool {
        if self.skip_optional && node.optional {
            return false;
        }
        !self.skip_scopes.contains(&node.scope)
    }

    fn derive_for_child(&self, _child: &DependencyNode) -> Arc<dyn DependencyTraverser> {
        Arc::new(Self { skip_scopes: self.skip_scopes.clone(), skip_optional: self.skip_optional })
    }
}

/// A traverser that descends everywhere.
pub struct AcceptAllTraverser;

impl DependencyTraverser for AcceptAllTraverser {
    fn accept(&self, _node: &DependencyNode) -> bool {
        true
    }

    fn derive_for_child(&self, _child: &DependencyNode) -> Arc<dyn DependencyTraverser> {
        Arc::new(AcceptAllTraverser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, ArtifactCoordinate};

    fn node(scope: Scope, optional: bool) -> DependencyNode {
        DependencyNode {
            artifact: Some(Artifact::new(ArtifactCoordinate::new("g", "a", "1"))),
            scope,
            optional,
            exclusions: Vec::new(),
            children: Vec::new(),
        }
    }

    fn dep(g: &str, a: &str, v: &str) -> Dependency {
        Dependency::new(ArtifactCoordinate::new(g, a, v))
    }

    #[test]
    fn management_skips_direct_dependencies() {
        let mut overrides = HashMap::new();
        overrides.insert(
            ("g".to_string(), "lib".to_string()),
            DependencyOverride { version: Some("2.0".to_string()), ..Default::default() },
        );
        let root_manager = ClassicDependencyManager::new(overrides);
        let parent = node(Scope::Compile, false);

        // At the root level the declared version survives.
        let direct = root_manager.manage(&parent, dep("g", "lib", "1.0"));
        assert_eq!(direct.coordinate.version, "1.0");

        // One level down the override wins.
        let derived = root_manager.derive_for_child(&parent);
        let transitive = derived.manage(&parent, dep("g", "lib", "1.0"));
        assert_eq!(transitive.coordinate.version, "2.0");
    }

    #[test]
    fn management_overrides_scope_and_optional() {
        let mut overrides = HashMap::new();
        overrides.insert(
            ("g".to_string(), "lib".to_string()),
            DependencyOverride {
                scope: Some(Scope::Runtime),
                optional: Some(true),
                ..Default::default()
            },
        );
        let manager =
            ClassicDependencyManager::new(overrides).derive_for_child(&node(Scope::Compile, false));
        let managed = manager.manage(&node(Scope::Compile, false), dep("g", "lib", "1.0"));
        assert_eq!(managed.scope, Scope::Runtime);
        assert!(managed.optional);
    }

    #[test]
    fn derivation_does_not_mutate_the_parent_policy() {
        let manager = ClassicDependencyManager::empty();
        let _child = manager.derive_for_child(&node(Scope::Compile, false));
        // Parent still behaves as a root-level manager.
        let managed = manager.manage(&node(Scope::Compile, false), dep("g", "lib", "1.0"));
        assert_eq!(managed.coordinate.version, "1.0");
    }

    #[test]
    fn standard_traverser_skips_test_and_provided() {
        let traverser = ScopeDependencyTraverser::standard();
        assert!(traverser.accept(&node(Scope::Compile, false)));
        assert!(traverser.accept(&node(Scope::Runtime, false)));
        assert!(!traverser.accept(&node(Scope::Test, false)));
        assert!(!traverser.accept(&node(Scope::Provided, false)));
        // Optional subtrees are descended into by default.
        assert!(traverser.accept(&node(Scope::Compile, true)));
    }

    #[test]
    fn optional_skipping_is_opt_in() {
        let traverser = ScopeDependencyTraverser::new(HashSet::new(), true);
        assert!(!traverser.accept(&node(Scope::Compile, true)));
        assert!(traverser.accept(&node(Scope::Compile, false)));
    }
}
