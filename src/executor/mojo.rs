//! Mojo executions and their executor collaborator.
//!
//! A *mojo* is one unit of plugin work bound to a lifecycle phase. The build
//! core treats mojos as opaque: it only orders them (by priority within a
//! step, lower first) and asks a [`MojoExecutor`] to run them. The shipped
//! [`CommandMojoExecutor`] runs each goal as a shell command; anything else
//! can be plugged in for embedding or testing.

use crate::core::MasonError;
use crate::project::ProjectId;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// One execution of a mojo, bound to a phase by its owning project.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MojoExecution {
    /// Stable id; fusing two plans deduplicates executions by id.
    pub id: String,
    /// The goal to run. For the command executor this is a shell command.
    pub goal: String,
    /// Ordering within a step, lower runs first.
    #[serde(default)]
    pub priority: i32,
}

impl MojoExecution {
    pub fn new(id: impl Into<String>, goal: impl Into<String>) -> Self {
        Self { id: id.into(), goal: goal.into(), priority: 0 }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Runs mojo executions on behalf of the scheduler.
#[async_trait]
pub trait MojoExecutor: Send + Sync {
    /// Run one mojo. An `Err` fails the owning step.
    async fn execute(
        &self,
        project: &ProjectId,
        phase: &str,
        mojo: &MojoExecution,
    ) -> Result<(), MasonError>;
}

/// Executes goals as shell commands.
pub struct CommandMojoExecutor {
    working_dir: Option<PathBuf>,
}

impl CommandMojoExecutor {
    pub fn new() -> Self {
        Self { working_dir: None }
    }

    pub fn in_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self { working_dir: Some(working_dir.into()) }
    }
}

impl Default for CommandMojoExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MojoExecutor for CommandMojoExecutor {
    async fn execute(
        &self,
        project: &ProjectId,
        phase: &str,
        mojo: &MojoExecution,
    ) -> Result<(), MasonError> {
        debug!(project = %project, phase, mojo = %mojo.id, goal = %mojo.goal, "running mojo");

        let mut command = if cfg!(windows) {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg(&mojo.goal);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.arg("-c").arg(&mojo.goal);
            c
        };
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|err| MasonError::MojoFailed {
            project: project.to_string(),
            phase: phase.to_string(),
            mojo: mojo.id.clone(),
            reason: format!("failed to spawn: {err}"),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or("").to_string();
            Err(MasonError::MojoFailed {
                project: project.to_string(),
                phase: phase.to_string(),
                mojo: mojo.id.clone(),
                reason: format!("exit status {}: {}", output.status, tail),
            })
        }
    }
}
