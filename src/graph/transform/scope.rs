//! Effective scope resolution.
//!
//! A dependency's effective scope is the narrower of its declared scope and
//! the scope imposed by its resolution path (its parent's effective scope).
//! `system` is exempt: a system-scoped node keeps its scope, and a system
//! parent does not rewrite its children.

use super::{GraphTransformer, TransformContext};
use crate::core::{MasonError, Scope};
use crate::graph::DependencyGraph;
use tracing::trace;

/// Top-down scope narrowing pass.
pub struct ScopeResolver;

impl GraphTransformer for ScopeResolver {
    fn name(&self) -> &'static str {
        "scope-resolver"
    }

    fn transform(
        &self,
        graph: &mut DependencyGraph,
        _ctx: &mut TransformContext,
    ) -> Result<(), MasonError> {
        let root = graph.root();
        let mut stack: Vec<(crate::graph::NodeId, Scope)> = graph
            .node(root)
            .children
            .iter()
            .rev()
            .map(|&c| (c, graph.node(root).scope))
            .collect();

        while let Some((id, inherited)) = stack.pop() {
            let node = graph.node_mut(id);
            let effective = node.scope.narrower_of(inherited);
            if effective != node.scope {
                trace!(scope = %effective, declared = %node.scope, "narrowed dependency scope");
                node.scope = effective;
            }
            let parent_scope = node.scope;
            let children: Vec<_> = node.children.clone();
            for child in children.into_iter().rev() {
                stack.push((child, parent_scope));
            }
        }
        Ok(())
    }
}
