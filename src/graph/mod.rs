//! Dependency graph model and construction.
//!
//! The graph is arena-backed: [`DependencyGraph`] owns a flat vector of
//! [`DependencyNode`]s addressed by [`NodeId`] handles, and each node holds an
//! explicit ordered list of child ids. Nodes are mutable *containers* of an
//! otherwise-immutable [`Artifact`] value: transformations swap the artifact
//! handle (e.g. type derivation) or prune child lists (conflict resolution),
//! but never grow the topology after collection.
//!
//! Submodules:
//! - [`builder`]: collects a graph from declared dependencies and a
//!   [`builder::MetadataReader`] collaborator
//! - [`policy`]: derivable per-node [`policy::DependencyManager`] /
//!   [`policy::DependencyTraverser`] policies
//! - [`transform`]: the conflict/transform pipeline run over collected graphs

pub mod builder;
pub mod policy;
pub mod transform;

use crate::artifact::{Artifact, ArtifactCoordinate, Exclusion};
use crate::core::Scope;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dependency as declared, before collection: the version may still be a
/// range expression and the artifact not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Requested coordinate; `version` may be a range such as `[1.0,2.0)`.
    pub coordinate: ArtifactCoordinate,
    /// Declared type id; defaults to `jar`.
    #[serde(default = "default_type")]
    pub type_id: String,
    /// Declared scope.
    #[serde(default)]
    pub scope: Scope,
    /// Whether the dependency is optional.
    #[serde(default)]
    pub optional: bool,
    /// Exclusions applied to this dependency's subtree.
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

fn default_type() -> String {
    crate::artifact::types::JAR.to_string()
}

impl Dependency {
    /// A compile-scope, non-optional jar dependency on `coordinate`.
    pub fn new(coordinate: ArtifactCoordinate) -> Self {
        Self {
            coordinate,
            type_id: default_type(),
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
        }
    }

    /// Builder-style scope override.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Builder-style optional flag.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Builder-style type override.
    pub fn with_type(mut self, type_id: impl Into<String>) -> Self {
        self.type_id = type_id.into();
        self
    }

    /// Builder-style exclusion.
    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.coordinate, self.scope)
    }
}

/// Handle into a [`DependencyGraph`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A node of the dependency graph.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// The resolved artifact. `None` only for a synthetic root standing in
    /// for the requesting project.
    pub artifact: Option<Artifact>,
    /// Effective scope of this node.
    pub scope: Scope,
    /// Whether the node is optional.
    pub optional: bool,
    /// Exclusions declared on this node, applied to its subtree.
    pub exclusions: Vec<Exclusion>,
    /// Ordered children. Declaration order is significant: ties in conflict
    /// resolution go to the first-declared occurrence.
    pub children: Vec<NodeId>,
}

impl DependencyNode {
    /// The node's conflict key: group, artifact, classifier and extension,
    /// version excluded. Nodes with equal keys compete during conflict
    /// resolution.
    pub fn conflict_key(&self) -> Option<(String, String, Option<String>, String)> {
        self.artifact.as_ref().map(|a| {
            (
                a.coordinate.group_id.clone(),
                a.coordinate.artifact_id.clone(),
                a.coordinate.classifier.clone(),
                a.coordinate.extension.clone(),
            )
        })
    }

    fn label(&self) -> String {
        match &self.artifact {
            Some(a) => format!("{} ({})", a, self.scope),
            None => "(root)".to_string(),
        }
    }
}

/// Arena-backed dependency graph with a distinguished root.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    root: NodeId,
}

impl DependencyGraph {
    /// Create a graph with a root node. Pass `None` for a synthetic root
    /// representing the requesting project.
    pub fn new(root_artifact: Option<Artifact>) -> Self {
        let root = DependencyNode {
            artifact: root_artifact,
            scope: Scope::Compile,
            optional: false,
            exclusions: Vec::new(),
            children: Vec::new(),
        };
        Self { nodes: vec![root], root: NodeId(0) }
    }

    /// The root node id.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Append `node` to the arena and link it under `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: DependencyNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut DependencyNode {
        &mut self.nodes[id.0]
    }

    /// Retain only the children of `parent` for which `keep` returns true.
    /// Pruned subtrees stay in the arena but become unreachable.
    pub fn retain_children(&mut self, parent: NodeId, mut keep: impl FnMut(NodeId) -> bool) {
        let mut children = std::mem::take(&mut self.nodes[parent.0].children);
        children.retain(|&c| keep(c));
        self.nodes[parent.0].children = children;
    }

    /// Pre-order traversal of the reachable graph: `(id, depth)` pairs, the
    /// root at depth 0, children in declaration order.
    pub fn preorder(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for &child in self.nodes[id.0].children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Number of reachable nodes, root included.
    pub fn reachable_count(&self) -> usize {
        self.preorder().len()
    }

    /// Artifacts of all reachable non-root nodes, in pre-order.
    pub fn artifacts(&self) -> Vec<&Artifact> {
        self.preorder()
            .iter()
            .filter_map(|&(id, _)| self.node(id).artifact.as_ref())
            .collect()
    }

    /// Render the reachable graph as an indented tree, for diagnostics and
    /// the `mason tree` command.
    pub fn to_tree_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.node(self.root).label());
        out.push('\n');
        self.render_children(self.root, "", &mut out);
        out
    }

    fn render_children(&self, id: NodeId, prefix: &str, out: &mut String) {
        let children = &self.node(id).children;
        for (i, &child) in children.iter().enumerate() {
            let last = i == children.len() - 1;
            let connector = if last { "└── " } else { "├── " };
            out.push_str(&format!("{}{}{}\n", prefix, connector, self.node(child).label()));
            let child_prefix =
                if last { format!("{prefix}    ") } else { format!("{prefix}│   ") };
            self.render_children(child, &child_prefix, out);
        }
    }
}
