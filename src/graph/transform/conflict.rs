//! Nearest-wins version conflict resolution.
//!
//! Nodes with equal conflict keys (group, artifact, classifier, extension)
//! compete; the winner is the occurrence at the shallowest depth, with ties
//! broken by declaration order (first pre-order occurrence wins). Every
//! occurrence carrying a version other than the winner's is pruned together
//! with its subtree.

use super::{GraphTransformer, TransformContext};
use crate::core::MasonError;
use crate::graph::{DependencyGraph, NodeId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The nearest-wins conflict resolver.
pub struct NearestVersionSelector;

type ConflictKey = (String, String, Option<String>, String);

impl GraphTransformer for NearestVersionSelector {
    fn name(&self) -> &'static str {
        "nearest-version-selector"
    }

    fn transform(
        &self,
        graph: &mut DependencyGraph,
        ctx: &mut TransformContext,
    ) -> Result<(), MasonError> {
        let order = graph.preorder();

        // Pick a winning version per conflict key: min (depth, pre-order
        // index).
        let mut winners: HashMap<ConflictKey, (usize, usize, String)> = HashMap::new();
        for (index, &(id, depth)) in order.iter().enumerate() {
            let node = graph.node(id);
            let Some(key) = node.conflict_key() else { continue };
            let Some(artifact) = node.artifact.as_ref() else { continue };
            let version = artifact.coordinate.version.clone();
            match winners.get(&key) {
                Some(&(best_depth, best_index, _))
                    if (best_depth, best_index) <= (depth, index) => {}
                _ => {
                    winners.insert(key, (depth, index, version));
                }
            }
        }

        // Everything carrying a losing version is pruned with its subtree.
        let mut losers: HashSet<NodeId> = HashSet::new();
        for &(id, _) in &order {
            let node = graph.node(id);
            let Some(key) = node.conflict_key() else { continue };
            let Some(artifact) = node.artifact.as_ref() else { continue };
            if let Some((_, _, winner)) = winners.get(&key) {
                if *winner != artifact.coordinate.version {
                    debug!(
                        artifact = %artifact,
                        winner = %winner,
                        "pruning version conflict loser"
                    );
                    losers.insert(id);
                }
            }
        }

        if losers.is_empty() {
            return Ok(());
        }

        for &(id, _) in &order {
            graph.retain_children(id, |child| !losers.contains(&child));
        }
        ctx.pruned_conflicts += losers.len();
        Ok(())
    }
}
