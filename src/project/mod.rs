//! Reactor projects and the inter-project dependency graph.
//!
//! A multi-module build is a *reactor*: a set of projects that may depend on
//! each other's artifacts. The [`ReactorGraph`] captures those edges, rejects
//! cycles before any planning happens, and answers the two questions the
//! planner needs: a stable upstream-first ordering, and the transitive
//! upstream set of each project.

use crate::core::MasonError;
use crate::executor::mojo::MojoExecution;
use crate::graph::Dependency;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// Identity of a reactor project: `group:artifact:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ProjectId {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }

    /// Parse a `group:artifact:version` id.
    pub fn parse(id: &str) -> Result<Self, MasonError> {
        let parts: Vec<&str> = id.split(':').collect();
        match parts.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self::new(*group, *artifact, *version))
            }
            _ => Err(MasonError::InvalidModuleId { id: id.to_string() }),
        }
    }

    /// `group:artifact`, the key used to match dependencies against reactor
    /// modules.
    pub fn versionless_id(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// One module of the reactor.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    /// Declared artifact dependencies, reactor-internal and external alike.
    pub dependencies: Vec<Dependency>,
    /// Mojo executions bound per lifecycle phase name.
    pub executions: HashMap<String, Vec<MojoExecution>>,
}

impl Project {
    pub fn new(id: ProjectId) -> Self {
        Self { id, dependencies: Vec::new(), executions: HashMap::new() }
    }

    /// Bind a mojo execution to a phase.
    pub fn bind(mut self, phase: impl Into<String>, execution: MojoExecution) -> Self {
        self.executions.entry(phase.into()).or_default().push(execution);
        self
    }

    /// Declare a dependency.
    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Directed graph of reactor projects.
///
/// Edges point from a project to the projects it depends on. An edge exists
/// when a declared dependency's `group:artifact` matches another module of
/// the same reactor; the version is not consulted, since a reactor builds
/// exactly one version of each module.
#[derive(Debug)]
pub struct ReactorGraph {
    graph: DiGraph<ProjectId, ()>,
    node_map: HashMap<ProjectId, NodeIndex>,
}

impl ReactorGraph {
    /// Build the graph for a set of projects and reject cycles.
    pub fn from_projects(projects: &[Project]) -> Result<Self, MasonError> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for project in projects {
            let index = graph.add_node(project.id.clone());
            node_map.insert(project.id.clone(), index);
        }

        let by_key: HashMap<String, ProjectId> =
            projects.iter().map(|p| (p.id.versionless_id(), p.id.clone())).collect();

        for project in projects {
            let from = node_map[&project.id];
            for dependency in &project.dependencies {
                let key = dependency.coordinate.versionless_id();
                if let Some(upstream) = by_key.get(&key)
                    && *upstream != project.id
                {
                    graph.add_edge(from, node_map[upstream], ());
                }
            }
        }

        let reactor = Self { graph, node_map };
        reactor.detect_cycles()?;
        Ok(reactor)
    }

    /// Number of projects.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Detect cycles with a color DFS. The error carries the cycle path.
    fn detect_cycles(&self) -> Result<(), MasonError> {
        let mut colors: HashMap<NodeIndex, Color> = HashMap::new();
        let mut path: Vec<ProjectId> = Vec::new();

        for node in self.graph.node_indices() {
            colors.insert(node, Color::White);
        }

        for node in self.graph.node_indices() {
            if matches!(colors.get(&node), Some(Color::White))
                && let Some(cycle) = self.dfs_visit(node, &mut colors, &mut path)
            {
                let cycle_str =
                    cycle.iter().map(ProjectId::to_string).collect::<Vec<_>>().join(" -> ");
                return Err(MasonError::ReactorCycle { cycle: cycle_str });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: NodeIndex,
        colors: &mut HashMap<NodeIndex, Color>,
        path: &mut Vec<ProjectId>,
    ) -> Option<Vec<ProjectId>> {
        colors.insert(node, Color::Gray);
        path.push(self.graph[node].clone());

        for neighbor in self.graph.neighbors(node) {
            match colors.get(&neighbor) {
                Some(Color::Gray) => {
                    // A gray neighbor is always on the current path.
                    let cycle_start = path
                        .iter()
                        .position(|n| *n == self.graph[neighbor])
                        .unwrap_or_default();
                    let mut cycle = path[cycle_start..].to_vec();
                    cycle.push(self.graph[neighbor].clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_visit(neighbor, colors, path) {
                        return Some(cycle);
                    }
                }
                _ => {}
            }
        }

        path.pop();
        colors.insert(node, Color::Black);
        None
    }

    /// Projects in build order: every project comes after all of its
    /// upstream projects.
    pub fn sorted_projects(&self) -> Result<Vec<ProjectId>, MasonError> {
        match toposort(&self.graph, None) {
            // Edges point at dependencies, so the raw order is
            // dependents-first; reverse it.
            Ok(indices) => {
                Ok(indices.into_iter().rev().map(|idx| self.graph[idx].clone()).collect())
            }
            Err(_) => {
                // Unreachable once construction has rejected cycles.
                Err(MasonError::ReactorCycle { cycle: "<unknown>".to_string() })
            }
        }
    }

    /// Direct upstream projects of `id`.
    pub fn direct_upstream(&self, id: &ProjectId) -> Vec<ProjectId> {
        match self.node_map.get(id) {
            Some(&index) => {
                self.graph.neighbors(index).map(|idx| self.graph[idx].clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// All projects `id` transitively depends on.
    pub fn upstream_of(&self, id: &ProjectId) -> HashSet<ProjectId> {
        let mut upstream = HashSet::new();
        let mut queue = VecDeque::new();

        if let Some(&index) = self.node_map.get(id) {
            queue.push_back(index);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if upstream.insert(self.graph[neighbor].clone()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }
        upstream
    }
}
