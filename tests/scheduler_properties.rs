//! Randomized scheduler checks.
//!
//! Generates random acyclic reactors, executes them with a recording mojo
//! executor, and checks the ordering guarantees: per-project phase order and
//! the cross-project gate (a project's `verify` runs after every upstream
//! project's `install`).

use async_trait::async_trait;
use mason_cli::artifact::ArtifactCoordinate;
use mason_cli::core::MasonError;
use mason_cli::executor::mojo::{MojoExecution, MojoExecutor};
use mason_cli::executor::{BuildPlanExecutor, ReactorFailureBehavior};
use mason_cli::graph::Dependency;
use mason_cli::lifecycle::default_lifecycle;
use mason_cli::lifecycle::plan::BuildPlan;
use mason_cli::project::{Project, ProjectId, ReactorGraph};
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

struct RecordingExecutor {
    log: Mutex<Vec<String>>,
}

#[async_trait]
impl MojoExecutor for RecordingExecutor {
    async fn execute(
        &self,
        _project: &ProjectId,
        _phase: &str,
        mojo: &MojoExecution,
    ) -> Result<(), MasonError> {
        // Yield so schedules actually interleave under the test runtime.
        tokio::task::yield_now().await;
        self.log.lock().unwrap().push(mojo.id.clone());
        Ok(())
    }
}

/// A random reactor: `edges[i]` holds upstream indices of project `i`, all
/// strictly smaller than `i` so the graph is acyclic by construction.
fn reactor_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..7).prop_flat_map(|n| {
        let mut per_project = Vec::new();
        for i in 0..n {
            per_project.push(proptest::collection::vec(0..i.max(1), 0..=i.min(3)));
        }
        per_project
    })
}

fn build_projects(edges: &[Vec<usize>]) -> Vec<Project> {
    edges
        .iter()
        .enumerate()
        .map(|(i, upstream)| {
            let mut project = Project::new(ProjectId::new("org.example", format!("p{i}"), "1.0"))
                .bind("compile", MojoExecution::new(format!("p{i}-compile"), ""))
                .bind("verify", MojoExecution::new(format!("p{i}-verify"), ""))
                .bind("install", MojoExecution::new(format!("p{i}-install"), ""));
            for &up in upstream {
                if up != i {
                    project = project.depends_on(Dependency::new(ArtifactCoordinate::new(
                        "org.example",
                        format!("p{up}"),
                        "1.0",
                    )));
                }
            }
            project
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn ordering_invariants_hold(edges in reactor_strategy(), threads in 1usize..5) {
        let projects = build_projects(&edges);
        let reactor = ReactorGraph::from_projects(&projects).unwrap();
        let plan =
            BuildPlan::for_phase(&projects, &reactor, &default_lifecycle(), "install").unwrap();

        let executor = Arc::new(RecordingExecutor { log: Mutex::new(Vec::new()) });
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .build()
            .unwrap();
        let summary = rt
            .block_on(
                BuildPlanExecutor::new(executor.clone(), threads)
                    .with_behavior(ReactorFailureBehavior::FailAtEnd)
                    .execute(plan),
            )
            .unwrap();
        prop_assert!(summary.is_success());

        let log = executor.log.lock().unwrap().clone();
        let pos = |id: &str| log.iter().position(|m| m == id);

        for (i, upstream) in edges.iter().enumerate() {
            // Per-project phase order.
            let compile = pos(&format!("p{i}-compile")).unwrap();
            let verify = pos(&format!("p{i}-verify")).unwrap();
            let install = pos(&format!("p{i}-install")).unwrap();
            prop_assert!(compile < verify);
            prop_assert!(verify < install);

            // Cross-project gate: verify waits for every upstream install.
            for &up in upstream {
                if up == i {
                    continue;
                }
                let up_install = pos(&format!("p{up}-install")).unwrap();
                prop_assert!(
                    up_install < verify,
                    "p{i} verify ran before p{up} install"
                );
            }
        }
    }
}
