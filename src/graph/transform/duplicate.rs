//! Duplicate elimination.
//!
//! After conflict resolution, all surviving occurrences of an artifact carry
//! the same version. This pass keeps the first pre-order occurrence of each
//! coordinate and prunes the rest, so the resolved set contains each artifact
//! exactly once.

use super::{GraphTransformer, TransformContext};
use crate::core::MasonError;
use crate::graph::{DependencyGraph, NodeId};
use std::collections::HashSet;
use tracing::debug;

/// Removes repeated occurrences of an artifact, keeping the first.
pub struct DuplicateEliminator;

impl GraphTransformer for DuplicateEliminator {
    fn name(&self) -> &'static str {
        "duplicate-eliminator"
    }

    fn transform(
        &self,
        graph: &mut DependencyGraph,
        ctx: &mut TransformContext,
    ) -> Result<(), MasonError> {
        let mut seen = HashSet::new();
        let mut losers: HashSet<NodeId> = HashSet::new();

        // DFS that does not descend into duplicates: a duplicate's subtree is
        // dropped wholesale, it must not claim first occurrences.
        let mut stack = vec![graph.root()];
        let mut visited = Vec::new();
        while let Some(id) = stack.pop() {
            let node = graph.node(id);
            if let Some(artifact) = &node.artifact {
                let key = (artifact.coordinate.clone(), artifact.type_id.clone());
                if !seen.insert(key) {
                    debug!(artifact = %artifact, "pruning duplicate occurrence");
                    losers.insert(id);
                    continue;
                }
            }
            visited.push(id);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }

        if losers.is_empty() {
            return Ok(());
        }

        for id in visited {
            graph.retain_children(id, |child| !losers.contains(&child));
        }
        ctx.pruned_duplicates += losers.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, ArtifactCoordinate, TypeRegistry};
    use crate::core::Scope;
    use crate::graph::DependencyNode;
    use std::sync::Arc;

    fn leaf(g: &str, a: &str, v: &str) -> DependencyNode {
        DependencyNode {
            artifact: Some(Artifact::new(ArtifactCoordinate::new(g, a, v))),
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
            children: Vec::new(),
        }
    }

    fn run(graph: &mut DependencyGraph) {
        let mut ctx = TransformContext::new(Arc::new(TypeRegistry::default()));
        DuplicateEliminator.transform(graph, &mut ctx).unwrap();
    }

    #[test]
    fn keeps_first_occurrence_only() {
        // Diamond: root -> a -> shared, root -> b -> shared
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let a = graph.add_child(root, leaf("g", "a", "1"));
        graph.add_child(a, leaf("g", "shared", "1"));
        let b = graph.add_child(root, leaf("g", "b", "1"));
        graph.add_child(b, leaf("g", "shared", "1"));

        run(&mut graph);
        let shared: Vec<_> = graph
            .artifacts()
            .iter()
            .filter(|x| x.coordinate.artifact_id == "shared")
            .map(|x| x.coordinate.version.clone())
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn duplicate_subtree_does_not_claim_first_occurrences() {
        // root -> shared -> x
        //      -> shared(dup) -> y
        // y must disappear with the duplicate, x must survive.
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let first = graph.add_child(root, leaf("g", "shared", "1"));
        graph.add_child(first, leaf("g", "x", "1"));
        let dup = graph.add_child(root, leaf("g", "shared", "1"));
        graph.add_child(dup, leaf("g", "y", "1"));

        run(&mut graph);
        let names: Vec<_> = graph
            .artifacts()
            .iter()
            .map(|a| a.coordinate.artifact_id.clone())
            .collect();
        assert!(names.contains(&"x".to_string()));
        assert!(!names.contains(&"y".to_string()));
    }

    #[test]
    fn idempotent() {
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        graph.add_child(root, leaf("g", "a", "1"));
        graph.add_child(root, leaf("g", "a", "1"));

        run(&mut graph);
        let first = graph.reachable_count();
        run(&mut graph);
        assert_eq!(graph.reachable_count(), first);
    }
}
