//! Type derivation.
//!
//! A single depth-first pass that maintains an explicit stack of the current
//! ancestor type. On entering a node, its nominal type (declared, defaulting
//! to `jar`) is remapped through the registry's derivation table whenever the
//! immediate parent's type derives its children: `jar → processor`,
//! `classpath-jar → classpath-processor`, `modular-jar → modular-processor`.
//! The node's artifact is swapped for a retyped copy; artifacts themselves
//! stay immutable. The effective (possibly derived) type is what gets pushed
//! onto the stack, which is what makes the derivation cascade to every
//! descendant.
//!
//! A synthetic root with no artifact is treated as `jar` for stack purposes
//! only; it is never derived or logged. An unknown required derived type is
//! fatal and names the missing type id.

use super::{GraphTransformer, TransformContext};
use crate::artifact::types::JAR;
use crate::core::MasonError;
use crate::graph::{DependencyGraph, NodeId};
use tracing::debug;

/// The type-derivation graph pass.
pub struct TypeDeriver;

enum Walk {
    Enter(NodeId),
    Leave,
}

impl GraphTransformer for TypeDeriver {
    fn name(&self) -> &'static str {
        "type-deriver"
    }

    fn transform(
        &self,
        graph: &mut DependencyGraph,
        ctx: &mut TransformContext,
    ) -> Result<(), MasonError> {
        let mut type_stack: Vec<String> = Vec::new();
        let mut walk = vec![Walk::Enter(graph.root())];

        while let Some(step) = walk.pop() {
            match step {
                Walk::Leave => {
                    type_stack.pop();
                }
                Walk::Enter(id) => {
                    let parent_derives = type_stack
                        .last()
                        .is_some_and(|ty| ctx.registry.derives_children(ty));
                    let parent_type = type_stack.last().cloned();

                    let node = graph.node_mut(id);
                    let effective = match &node.artifact {
                        // Synthetic root: counts as jar on the stack, no
                        // derivation, no logging.
                        None => JAR.to_string(),
                        Some(artifact) => {
                            let nominal = artifact.type_id.clone();
                            if parent_derives {
                                let parent_type = parent_type.as_deref().unwrap_or(JAR);
                                let derived = ctx.registry.derive(parent_type, &nominal)?;
                                if derived.id != nominal {
                                    debug!(
                                        artifact = %artifact,
                                        from = %nominal,
                                        to = %derived.id,
                                        "derived dependency type"
                                    );
                                    let retyped = artifact.retyped(derived);
                                    node.artifact = Some(retyped);
                                    ctx.derived_types += 1;
                                }
                                derived.id.clone()
                            } else {
                                nominal
                            }
                        }
                    };

                    type_stack.push(effective);
                    walk.push(Walk::Leave);
                    for &child in graph.node(id).children.iter().rev() {
                        walk.push(Walk::Enter(child));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::types::{
        CLASSPATH_JAR, CLASSPATH_PROCESSOR, MODULAR_JAR, MODULAR_PROCESSOR, PROCESSOR,
    };
    use crate::artifact::{Artifact, ArtifactCoordinate, TypeRegistry};
    use crate::core::Scope;
    use crate::graph::DependencyNode;
    use std::sync::Arc;

    fn typed(a: &str, type_id: &str) -> DependencyNode {
        DependencyNode {
            artifact: Some(Artifact::with_type(ArtifactCoordinate::new("g", a, "1"), type_id)),
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
            children: Vec::new(),
        }
    }

    fn run(graph: &mut DependencyGraph) -> Result<(), MasonError> {
        let mut ctx = TransformContext::new(Arc::new(TypeRegistry::default()));
        TypeDeriver.transform(graph, &mut ctx)
    }

    fn type_of(graph: &DependencyGraph, artifact: &str) -> String {
        graph
            .artifacts()
            .iter()
            .find(|a| a.coordinate.artifact_id == artifact)
            .unwrap()
            .type_id
            .clone()
    }

    #[test]
    fn children_of_processor_become_processors() {
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let proc = graph.add_child(root, typed("apt", PROCESSOR));
        graph.add_child(proc, typed("dep", JAR));

        run(&mut graph).unwrap();
        assert_eq!(type_of(&graph, "dep"), PROCESSOR);
    }

    #[test]
    fn derivation_cascades_to_all_descendants() {
        // apt(processor) -> a(jar) -> b(classpath-jar) -> c(modular-jar)
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let apt = graph.add_child(root, typed("apt", PROCESSOR));
        let a = graph.add_child(apt, typed("a", JAR));
        let b = graph.add_child(a, typed("b", CLASSPATH_JAR));
        graph.add_child(b, typed("c", MODULAR_JAR));

        run(&mut graph).unwrap();
        assert_eq!(type_of(&graph, "a"), PROCESSOR);
        assert_eq!(type_of(&graph, "b"), CLASSPATH_PROCESSOR);
        assert_eq!(type_of(&graph, "c"), MODULAR_PROCESSOR);
    }

    #[test]
    fn siblings_outside_the_processor_subtree_are_untouched() {
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let apt = graph.add_child(root, typed("apt", PROCESSOR));
        graph.add_child(apt, typed("inside", JAR));
        graph.add_child(root, typed("outside", JAR));

        run(&mut graph).unwrap();
        assert_eq!(type_of(&graph, "inside"), PROCESSOR);
        assert_eq!(type_of(&graph, "outside"), JAR);
    }

    #[test]
    fn unknown_child_type_under_processor_is_fatal() {
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let apt = graph.add_child(root, typed("apt", PROCESSOR));
        graph.add_child(apt, typed("odd", "war"));

        let err = run(&mut graph).unwrap_err();
        match err {
            MasonError::UnknownDerivedType { child_type, .. } => assert_eq!(child_type, "war"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn synthetic_root_counts_as_jar() {
        // Root has no artifact; its direct jar children must not be derived.
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        graph.add_child(root, typed("plain", JAR));

        run(&mut graph).unwrap();
        assert_eq!(type_of(&graph, "plain"), JAR);
    }

    #[test]
    fn idempotent() {
        let mut graph = DependencyGraph::new(None);
        let root = graph.root();
        let apt = graph.add_child(root, typed("apt", PROCESSOR));
        let a = graph.add_child(apt, typed("a", JAR));
        graph.add_child(a, typed("b", CLASSPATH_JAR));

        run(&mut graph).unwrap();
        let first: Vec<_> =
            graph.artifacts().iter().map(|a| a.type_id.clone()).collect();
        run(&mut graph).unwrap();
        let second: Vec<_> =
            graph.artifacts().iter().map(|a| a.type_id.clone()).collect();
        assert_eq!(first, second);
    }
}
