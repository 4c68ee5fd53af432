//! Dependency graph collection.
//!
//! [`GraphBuilder`] turns a set of declared dependencies into a
//! [`DependencyGraph`] by repeatedly consulting a [`MetadataReader`]
//! collaborator for each artifact's own declared dependencies. Collection is
//! driven by the per-node policies from [`crate::graph::policy`]:
//!
//! - every declared child is first passed through the current
//!   [`DependencyManager`], which may override version, scope or the optional
//!   flag;
//! - the current [`DependencyTraverser`] then decides whether collection
//!   descends into the child (a refused child is still added, as a leaf);
//! - derived manager/traverser instances are computed per child, so a policy
//!   refinement applies to exactly one subtree.
//!
//! Metadata reads are cached per coordinate, so an artifact shared by many
//! parents is resolved exactly once. Exclusions accumulate along the path and
//! filter children before nodes are created. Version ranges are resolved
//! against the reader's available versions, picking the highest match.
//!
//! A metadata failure on a required (non-optional) node aborts the whole
//! collection with the offending coordinate; failures on optional nodes are
//! recorded as [`ResolutionIncident`]s and collection continues.

use crate::artifact::exclusion::is_excluded;
use crate::artifact::{Artifact, ArtifactCoordinate, Exclusion};
use crate::core::MasonError;
use crate::graph::policy::{DependencyManager, DependencyTraverser};
use crate::graph::{Dependency, DependencyGraph, DependencyNode, NodeId};
use crate::version::{Version, VersionConstraint};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dependency metadata of a single artifact, as read from a repository.
#[derive(Debug, Clone, Default)]
pub struct DependencyMetadata {
    /// The artifact's declared dependencies.
    pub dependencies: Vec<Dependency>,
}

/// Collaborator that reads dependency metadata, backed by a local repository,
/// a remote repository, or an in-memory registry.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    /// Read the declared dependencies of `coordinate`.
    async fn read_dependencies(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<DependencyMetadata, MasonError>;

    /// List the versions available for `group:artifact`, for range
    /// resolution. Order is not significant.
    async fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<Version>, MasonError>;
}

/// In-memory metadata registry used by tests and the manifest-backed CLI.
///
/// Unknown coordinates read as having no dependencies unless the registry is
/// created with [`InMemoryMetadata::strict`], in which case they fail like an
/// unreachable repository would.
#[derive(Default)]
pub struct InMemoryMetadata {
    dependencies: DashMap<String, Vec<Dependency>>,
    versions: DashMap<String, Vec<Version>>,
    strict: bool,
}

impl InMemoryMetadata {
    /// A lenient registry: unknown coordinates are leaves.
    pub fn new() -> Self {
        Self::default()
    }

    /// A strict registry: unknown coordinates are metadata failures.
    pub fn strict() -> Self {
        Self { strict: true, ..Self::default() }
    }

    fn key(coordinate: &ArtifactCoordinate) -> String {
        format!(
            "{}:{}:{}",
            coordinate.group_id, coordinate.artifact_id, coordinate.version
        )
    }

    /// Register the dependency list of a coordinate. Also records the
    /// version as available for range resolution.
    pub fn register(&self, coordinate: &ArtifactCoordinate, dependencies: Vec<Dependency>) {
        self.dependencies.insert(Self::key(coordinate), dependencies);
        self.versions
            .entry(coordinate.versionless_id())
            .or_default()
            .push(Version::parse(&coordinate.version));
    }

    /// Record an available version without dependency metadata.
    pub fn register_version(&self, group_id: &str, artifact_id: &str, version: &str) {
        self.versions
            .entry(format!("{group_id}:{artifact_id}"))
            .or_default()
            .push(Version::parse(version));
    }
}

#[async_trait]
impl MetadataReader for InMemoryMetadata {
    async fn read_dependencies(
        &self,
        coordinate: &ArtifactCoordinate,
    ) -> Result<DependencyMetadata, MasonError> {
        match self.dependencies.get(&Self::key(coordinate)) {
            Some(deps) => Ok(DependencyMetadata { dependencies: deps.clone() }),
            None if self.strict => Err(MasonError::MetadataUnavailable {
                coordinate: coordinate.to_string(),
                reason: "no metadata registered".to_string(),
            }),
            None => Ok(DependencyMetadata::default()),
        }
    }

    async fn available_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<Version>, MasonError> {
        Ok(self
            .versions
            .get(&format!("{group_id}:{artifact_id}"))
            .map(|v| v.clone())
            .unwrap_or_default())
    }
}

/// A recorded, non-fatal resolution failure on an optional node.
#[derive(Debug, Clone)]
pub struct ResolutionIncident {
    /// Coordinate that failed to resolve.
    pub coordinate: ArtifactCoordinate,
    /// Why it failed.
    pub reason: String,
}

/// Everything needed to collect one graph.
pub struct CollectRequest {
    /// Root artifact; `None` for a synthetic project root.
    pub root: Option<Artifact>,
    /// Direct dependencies of the root.
    pub dependencies: Vec<Dependency>,
    /// Root management policy.
    pub manager: Arc<dyn DependencyManager>,
    /// Root traversal policy.
    pub traverser: Arc<dyn DependencyTraverser>,
}

/// A collected graph plus any non-fatal incidents.
#[derive(Debug)]
pub struct CollectResult {
    /// The raw (untransformed) dependency graph.
    pub graph: DependencyGraph,
    /// Optional-node failures recorded during collection.
    pub incidents: Vec<ResolutionIncident>,
}

struct Frame {
    node: NodeId,
    dependencies: Vec<Dependency>,
    manager: Arc<dyn DependencyManager>,
    traverser: Arc<dyn DependencyTraverser>,
    exclusions: Arc<Vec<Exclusion>>,
    path: Arc<Vec<ArtifactCoordinate>>,
}

/// Collects dependency graphs through a [`MetadataReader`].
pub struct GraphBuilder<'a> {
    reader: &'a dyn MetadataReader,
}

impl<'a> GraphBuilder<'a> {
    /// Create a builder over a metadata reader.
    pub fn new(reader: &'a dyn MetadataReader) -> Self {
        Self { reader }
    }

    /// Collect the full graph for `request`.
    pub async fn collect(&self, request: CollectRequest) -> Result<CollectResult, MasonError> {
        let mut graph = DependencyGraph::new(request.root.clone());
        let mut incidents = Vec::new();
        let mut metadata_cache: HashMap<ArtifactCoordinate, Arc<Vec<Dependency>>> = HashMap::new();
        let mut versions_cache: HashMap<String, Arc<Vec<Version>>> = HashMap::new();

        let root_path: Vec<ArtifactCoordinate> = request
            .root
            .as_ref()
            .map(|a| vec![a.coordinate.clone()])
            .unwrap_or_default();

        let mut stack = vec![Frame {
            node: graph.root(),
            dependencies: request.dependencies,
            manager: request.manager,
            traverser: request.traverser,
            exclusions: Arc::new(Vec::new()),
            path: Arc::new(root_path),
        }];

        while let Some(frame) = stack.pop() {
            let parent = graph.node(frame.node).clone();

            for declared in frame.dependencies {
                let coordinate = &declared.coordinate;
                if is_excluded(&frame.exclusions, &coordinate.group_id, &coordinate.artifact_id) {
                    debug!(dependency = %declared, "skipping excluded dependency");
                    continue;
                }

                let managed = frame.manager.manage(&parent, declared);

                let resolved_version = match self
                    .resolve_version(&managed, &mut versions_cache)
                    .await
                {
                    Ok(version) => version,
                    Err(err) if managed.optional => {
                        warn!(coordinate = %managed.coordinate, error = %err,
                            "skipping optional dependency with unresolvable version");
                        incidents.push(ResolutionIncident {
                            coordinate: managed.coordinate.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                    Err(err) => return Err(err),
                };

                let mut coordinate = managed.coordinate.clone();
                coordinate.version = resolved_version;

                let child = DependencyNode {
                    artifact: Some(Artifact::with_type(coordinate.clone(), &managed.type_id)),
                    scope: managed.scope,
                    optional: managed.optional,
                    exclusions: managed.exclusions.clone(),
                    children: Vec::new(),
                };

                let descend = frame.traverser.accept(&child);
                let cycle = frame.path.iter().any(|c| *c == coordinate);
                if cycle {
                    debug!(coordinate = %coordinate, "dependency cycle detected, not descending");
                }

                let child_manager = frame.manager.derive_for_child(&child);
                let child_traverser = frame.traverser.derive_for_child(&child);
                let child_id = graph.add_child(frame.node, child);

                if !descend || cycle {
                    continue;
                }

                let metadata = match self
                    .read_cached(&coordinate, &mut metadata_cache)
                    .await
                {
                    Ok(deps) => deps,
                    Err(err) if managed.optional => {
                        warn!(coordinate = %coordinate, error = %err,
                            "metadata unavailable for optional dependency, keeping as leaf");
                        incidents.push(ResolutionIncident {
                            coordinate: coordinate.clone(),
                            reason: err.to_string(),
                        });
                        continue;
                    }
                    Err(err @ MasonError::MetadataUnavailable { .. }) => return Err(err),
                    Err(err) => {
                        return Err(MasonError::MetadataUnavailable {
                            coordinate: coordinate.to_string(),
                            reason: err.to_string(),
                        });
                    }
                };

                if metadata.is_empty() {
                    continue;
                }

                let mut child_exclusions = frame.exclusions.as_ref().clone();
                child_exclusions.extend(managed.exclusions.iter().cloned());
                let mut child_path = frame.path.as_ref().clone();
                child_path.push(coordinate);

                stack.push(Frame {
                    node: child_id,
                    dependencies: metadata.as_ref().clone(),
                    manager: child_manager,
                    traverser: child_traverser,
                    exclusions: Arc::new(child_exclusions),
                    path: Arc::new(child_path),
                });
            }
        }

        Ok(CollectResult { graph, incidents })
    }

    async fn read_cached(
        &self,
        coordinate: &ArtifactCoordinate,
        cache: &mut HashMap<ArtifactCoordinate, Arc<Vec<Dependency>>>,
    ) -> Result<Arc<Vec<Dependency>>, MasonError> {
        if let Some(cached) = cache.get(coordinate) {
            return Ok(Arc::clone(cached));
        }
        let metadata = self.reader.read_dependencies(coordinate).await?;
        let deps = Arc::new(metadata.dependencies);
        cache.insert(coordinate.clone(), Arc::clone(&deps));
        Ok(deps)
    }

    async fn resolve_version(
        &self,
        dependency: &Dependency,
        cache: &mut HashMap<String, Arc<Vec<Version>>>,
    ) -> Result<String, MasonError> {
        let constraint = VersionConstraint::parse(&dependency.coordinate.version)?;
        if !constraint.is_range() {
            return Ok(dependency.coordinate.version.clone());
        }
        let key = dependency.coordinate.versionless_id();
        let available = match cache.get(&key) {
            Some(cached) => Arc::clone(cached),
            None => {
                let versions = self
                    .reader
                    .available_versions(
                        &dependency.coordinate.group_id,
                        &dependency.coordinate.artifact_id,
                    )
                    .await?;
                let versions = Arc::new(versions);
                cache.insert(key.clone(), Arc::clone(&versions));
                versions
            }
        };
        let selected = constraint.select(&key, &available)?;
        debug!(coordinate = %key, range = %constraint, selected = %selected,
            "resolved version range");
        Ok(selected.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Exclusion;
    use crate::core::Scope;
    use crate::graph::policy::{
        ClassicDependencyManager, DependencyOverride, ScopeDependencyTraverser,
    };

    fn coord(g: &str, a: &str, v: &str) -> ArtifactCoordinate {
        ArtifactCoordinate::new(g, a, v)
    }

    fn dep(g: &str, a: &str, v: &str) -> Dependency {
        Dependency::new(coord(g, a, v))
    }

    fn request(dependencies: Vec<Dependency>) -> CollectRequest {
        CollectRequest {
            root: None,
            dependencies,
            manager: ClassicDependencyManager::empty(),
            traverser: ScopeDependencyTraverser::standard(),
        }
    }

    fn labels(graph: &DependencyGraph) -> Vec<String> {
        graph.artifacts().iter().map(|a| a.coordinate.to_string()).collect()
    }

    #[tokio::test]
    async fn collects_transitive_dependencies() {
        let metadata = InMemoryMetadata::new();
        metadata.register(&coord("g", "a", "1"), vec![dep("g", "b", "1")]);
        metadata.register(&coord("g", "b", "1"), vec![dep("g", "c", "1")]);
        metadata.register(&coord("g", "c", "1"), vec![]);

        let builder = GraphBuilder::new(&metadata);
        let result = builder.collect(request(vec![dep("g", "a", "1")])).await.unwrap();

        assert_eq!(labels(&result.graph), vec!["g:a:1", "g:b:1", "g:c:1"]);
        assert!(result.incidents.is_empty());
    }

    #[tokio::test]
    async fn rejected_nodes_stay_as_leaves() {
        let metadata = InMemoryMetadata::new();
        metadata.register(
            &coord("g", "a", "1"),
            vec![dep("g", "t", "1").with_scope(Scope::Test)],
        );
        // t's own dependencies must never be read.
        metadata.register(&coord("g", "t", "1"), vec![dep("g", "hidden", "1")]);

        let builder = GraphBuilder::new(&metadata);
        let result = builder.collect(request(vec![dep("g", "a", "1")])).await.unwrap();

        let labels = labels(&result.graph);
        assert!(labels.contains(&"g:t:1".to_string()));
        assert!(!labels.iter().any(|l| l.contains("hidden")));
    }

    #[tokio::test]
    async fn exclusions_accumulate_along_the_path() {
        let metadata = InMemoryMetadata::new();
        metadata.register(&coord("g", "a", "1"), vec![dep("g", "b", "1")]);
        metadata.register(&coord("g", "b", "1"), vec![dep("g", "unwanted", "1")]);

        let builder = GraphBuilder::new(&metadata);
        let result = builder
            .collect(request(vec![
                dep("g", "a", "1").exclude(Exclusion::new("g", "unwanted")),
            ]))
            .await
            .unwrap();

        assert!(!labels(&result.graph).iter().any(|l| l.contains("unwanted")));
    }

    #[tokio::test]
    async fn management_overrides_transitive_versions() {
        let metadata = InMemoryMetadata::new();
        metadata.register(&coord("g", "a", "1"), vec![dep("g", "lib", "1.0")]);
        metadata.register(&coord("g", "lib", "2.0"), vec![]);

        let mut overrides = HashMap::new();
        overrides.insert(
            ("g".to_string(), "lib".to_string()),
            DependencyOverride { version: Some("2.0".to_string()), ..Default::default() },
        );

        let builder = GraphBuilder::new(&metadata);
        let result = builder
            .collect(CollectRequest {
                root: None,
                dependencies: vec![dep("g", "a", "1")],
                manager: ClassicDependencyManager::new(overrides),
                traverser: ScopeDependencyTraverser::standard(),
            })
            .await
            .unwrap();

        assert!(labels(&result.graph).contains(&"g:lib:2.0".to_string()));
    }

    #[tokio::test]
    async fn version_ranges_resolve_to_highest_match() {
        let metadata = InMemoryMetadata::new();
        metadata.register(&coord("g", "lib", "1.0"), vec![]);
        metadata.register(&coord("g", "lib", "1.5"), vec![]);
        metadata.register(&coord("g", "lib", "2.0"), vec![]);

        let builder = GraphBuilder::new(&metadata);
        let result = builder
            .collect(request(vec![dep("g", "lib", "[1.0,2.0)")]))
            .await
            .unwrap();

        assert_eq!(labels(&result.graph), vec!["g:lib:1.5"]);
    }

    #[tokio::test]
    async fn required_metadata_failure_is_fatal_and_names_coordinate() {
        let metadata = InMemoryMetadata::strict();
        let builder = GraphBuilder::new(&metadata);
        let err = builder.collect(request(vec![dep("g", "gone", "1")])).await.unwrap_err();
        match err {
            MasonError::MetadataUnavailable { coordinate, .. } => {
                assert!(coordinate.contains("g:gone:1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn optional_metadata_failure_is_recorded_not_fatal() {
        let metadata = InMemoryMetadata::strict();
        metadata.register(
            &coord("g", "a", "1"),
            vec![dep("g", "maybe", "1").optional()],
        );

        let builder = GraphBuilder::new(&metadata);
        let result = builder.collect(request(vec![dep("g", "a", "1")])).await.unwrap();

        assert_eq!(result.incidents.len(), 1);
        assert_eq!(result.incidents[0].coordinate.artifact_id, "maybe");
        // The optional node itself is still part of the graph.
        assert!(labels(&result.graph).contains(&"g:maybe:1".to_string()));
    }

    #[tokio::test]
    async fn metadata_cycles_do_not_loop() {
        let metadata = InMemoryMetadata::new();
        metadata.register(&coord("g", "a", "1"), vec![dep("g", "b", "1")]);
        metadata.register(&coord("g", "b", "1"), vec![dep("g", "a", "1")]);

        let builder = GraphBuilder::new(&metadata);
        let result = builder.collect(request(vec![dep("g", "a", "1")])).await.unwrap();

        // a -> b -> a(leaf); the second occurrence of a is not descended.
        assert_eq!(labels(&result.graph), vec!["g:a:1", "g:b:1", "g:a:1"]);
    }

    #[tokio::test]
    async fn shared_artifacts_are_read_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingReader {
            inner: InMemoryMetadata,
            reads: AtomicUsize,
        }

        #[async_trait]
        impl MetadataReader for CountingReader {
            async fn read_dependencies(
                &self,
                coordinate: &ArtifactCoordinate,
            ) -> Result<DependencyMetadata, MasonError> {
                self.reads.fetch_add(1, Ordering::SeqCst);
                self.inner.read_dependencies(coordinate).await
            }

            async fn available_versions(
                &self,
                group_id: &str,
                artifact_id: &str,
            ) -> Result<Vec<Version>, MasonError> {
                self.inner.available_versions(group_id, artifact_id).await
            }
        }

        let inner = InMemoryMetadata::new();
        // Diamond: root -> a, b; a -> shared; b -> shared.
        inner.register(&coord("g", "a", "1"), vec![dep("g", "shared", "1")]);
        inner.register(&coord("g", "b", "1"), vec![dep("g", "shared", "1")]);
        inner.register(&coord("g", "shared", "1"), vec![dep("g", "leaf", "1")]);
        inner.register(&coord("g", "leaf", "1"), vec![]);
        let reader = CountingReader { inner, reads: AtomicUsize::new(0) };

        let builder = GraphBuilder::new(&reader);
        let result = builder
            .collect(CollectRequest {
                root: None,
                dependencies: vec![dep("g", "a", "1"), dep("g", "b", "1")],
                manager: ClassicDependencyManager::empty(),
                traverser: ScopeDependencyTraverser::standard(),
            })
            .await
            .unwrap();

        // shared appears under both parents...
        let labels = labels(&result.graph);
        assert_eq!(labels.iter().filter(|l| l.contains("shared")).count(), 2);
        // ...but its metadata was read exactly once (4 distinct coordinates).
        assert_eq!(reader.reads.load(Ordering::SeqCst), 4);
    }
}
