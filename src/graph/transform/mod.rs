//! The conflict/transform pipeline.
//!
//! After collection, a graph is run through an ordered list of
//! [`GraphTransformer`]s that resolve version conflicts, eliminate
//! duplicates, settle effective scopes and derive types. Every shipped
//! transformer is idempotent: running the pipeline twice over a graph yields
//! the same result as running it once, because pipelines may be re-entered
//! for nested or aggregated resolutions.

mod conflict;
mod duplicate;
mod scope;
mod type_deriver;

pub use conflict::NearestVersionSelector;
pub use duplicate::DuplicateEliminator;
pub use scope::ScopeResolver;
pub use type_deriver::TypeDeriver;

use crate::artifact::TypeRegistry;
use crate::core::MasonError;
use crate::graph::DependencyGraph;
use std::sync::Arc;
use tracing::debug;

/// Shared state threaded through a pipeline run.
pub struct TransformContext {
    /// Type registry consulted by type derivation.
    pub registry: Arc<TypeRegistry>,
    /// Nodes pruned by conflict resolution.
    pub pruned_conflicts: usize,
    /// Nodes pruned by duplicate elimination.
    pub pruned_duplicates: usize,
    /// Artifacts remapped by type derivation.
    pub derived_types: usize,
}

impl TransformContext {
    /// Create a context over a type registry.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry, pruned_conflicts: 0, pruned_duplicates: 0, derived_types: 0 }
    }
}

/// One pass over a dependency graph.
///
/// Transformers may swap node artifacts and prune child lists but must not
/// grow the topology, and must be idempotent.
pub trait GraphTransformer: Send + Sync {
    /// Transformer name, for logging.
    fn name(&self) -> &'static str;

    /// Apply this transformer to `graph`.
    fn transform(
        &self,
        graph: &mut DependencyGraph,
        ctx: &mut TransformContext,
    ) -> Result<(), MasonError>;
}

/// An ordered chain of graph transformers.
pub struct TransformPipeline {
    transformers: Vec<Box<dyn GraphTransformer>>,
}

impl TransformPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { transformers: Vec::new() }
    }

    /// The standard pipeline: nearest-wins conflict resolution, duplicate
    /// elimination, scope resolution, then type derivation.
    pub fn standard() -> Self {
        Self::new()
            .with(NearestVersionSelector)
            .with(DuplicateEliminator)
            .with(ScopeResolver)
            .with(TypeDeriver)
    }

    /// Append a transformer.
    pub fn with(mut self, transformer: impl GraphTransformer + 'static) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Run every transformer in order.
    pub fn run(
        &self,
        graph: &mut DependencyGraph,
        ctx: &mut TransformContext,
    ) -> Result<(), MasonError> {
        for transformer in &self.transformers {
            debug!(transformer = transformer.name(), "running graph transformer");
            transformer.transform(graph, ctx)?;
        }
        Ok(())
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::standard()
    }
}
