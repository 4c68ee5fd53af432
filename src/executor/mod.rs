//! Concurrent build plan execution.
//!
//! The scheduler is a single loop that owns all aggregate state. Workers run
//! steps inside a wave of the [`PhasingExecutor`](phasing::PhasingExecutor)
//! and report completions exactly once over an mpsc channel; the loop is the
//! only writer of terminal states and outcome records, so no locks guard the
//! bookkeeping.
//!
//! Each scan walks every step of the plan and dispatches the ones whose
//! predecessors are all terminal and satisfied; the scan repeats to a
//! fixpoint before the loop parks on the completion channel. A full re-scan
//! per completion is quadratic in the step count, which is fine at reactor
//! sizes.
//!
//! No step starts before all of its predecessors are terminal; within a
//! project the phase chain serializes steps.

pub mod mojo;
pub mod phasing;

use crate::core::MasonError;
use crate::lifecycle::plan::{BuildPlan, StepRef, StepState};
use crate::project::ProjectId;
use colored::Colorize;
use mojo::MojoExecutor;
use phasing::PhasingExecutor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// How the reactor reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReactorFailureBehavior {
    /// Stop dispatching new steps after the first failure; running steps
    /// finish, everything still pending is skipped.
    #[default]
    FailFast,
    /// Keep building every project not downstream of a failure; report all
    /// failures at the end.
    FailAtEnd,
    /// A failure only dooms the rest of its own project's phase chain;
    /// downstream projects build against whatever did succeed.
    FailNever,
}

/// Terminal record of one executed step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub project: ProjectId,
    pub phase: String,
    pub state: StepState,
    pub duration: Duration,
    pub error: Option<String>,
}

/// What one worker reports back to the scheduler.
struct Completion {
    step_ref: StepRef,
    duration: Duration,
    result: Result<(), MasonError>,
}

/// Executes a [`BuildPlan`] over a thread budget.
pub struct BuildPlanExecutor {
    mojo_executor: Arc<dyn MojoExecutor>,
    threads: usize,
    behavior: ReactorFailureBehavior,
}

impl BuildPlanExecutor {
    pub fn new(mojo_executor: Arc<dyn MojoExecutor>, threads: usize) -> Self {
        Self { mojo_executor, threads, behavior: ReactorFailureBehavior::default() }
    }

    pub fn with_behavior(mut self, behavior: ReactorFailureBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Run the plan to completion and return the reactor summary.
    ///
    /// A failed build returns `Ok` with a failing summary; `Err` is reserved
    /// for scheduler-level problems such as an already-open wave.
    pub async fn execute(&self, plan: BuildPlan) -> Result<ReactorSummary, MasonError> {
        let started = Instant::now();
        let plan = Arc::new(plan);

        // More workers than projects cannot help: within a project the phase
        // chain serializes everything anyway.
        let workers = self.threads.clamp(1, plan.projects().len().max(1));
        info!(workers, steps = plan.len(), behavior = ?self.behavior, "starting reactor");

        let phasing = PhasingExecutor::new(workers);
        let wave = phasing.phase()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();

        let mut outcomes: Vec<StepOutcome> = Vec::new();
        let mut remaining = plan.len();
        let mut in_flight = 0usize;
        let mut halted = false;

        while remaining > 0 {
            // Dispatch to a fixpoint: cascaded skips unlock successors within
            // the same scan round.
            let mut progress = true;
            while progress && !halted {
                progress = false;
                for step in plan.steps() {
                    if step.state() != StepState::Pending {
                        continue;
                    }
                    match self.readiness(&plan, step) {
                        Readiness::Waiting => {}
                        Readiness::Doomed => {
                            if step.try_transition(StepState::Pending, StepState::Skipped) {
                                debug!(step = %step.step_ref(), "skipping, predecessor failed");
                                outcomes.push(skip_outcome(step));
                                remaining -= 1;
                                progress = true;
                            }
                        }
                        Readiness::Ready => {
                            if step.is_planned_skip() {
                                // Gates ordering only; completes without
                                // dispatch.
                                if step.try_transition(StepState::Pending, StepState::Skipped) {
                                    remaining -= 1;
                                    progress = true;
                                }
                                continue;
                            }
                            if !step.try_transition(StepState::Pending, StepState::Ready) {
                                continue;
                            }
                            if !step.try_transition(StepState::Ready, StepState::Running) {
                                continue;
                            }
                            in_flight += 1;
                            self.dispatch(&wave, plan.clone(), step.step_ref(), tx.clone());
                        }
                    }
                }
            }

            if remaining == 0 {
                break;
            }
            if in_flight == 0 {
                // Nothing running and nothing dispatchable: either the build
                // halted or the remaining steps can never become ready.
                break;
            }

            let Some(completion) = rx.recv().await else { break };
            in_flight -= 1;
            remaining -= 1;
            // Completions only ever name steps the scheduler dispatched.
            let Some(step) = plan.step(&completion.step_ref) else { continue };

            match completion.result {
                Ok(()) => {
                    step.set_state(StepState::Succeeded);
                    outcomes.push(StepOutcome {
                        project: step.project.clone(),
                        phase: step.name.clone(),
                        state: StepState::Succeeded,
                        duration: completion.duration,
                        error: None,
                    });
                }
                Err(err) => {
                    step.set_state(StepState::Failed);
                    warn!(step = %completion.step_ref, error = %err, "step failed");
                    outcomes.push(StepOutcome {
                        project: step.project.clone(),
                        phase: step.name.clone(),
                        state: StepState::Failed,
                        duration: completion.duration,
                        error: Some(err.to_string()),
                    });
                    if self.behavior == ReactorFailureBehavior::FailFast {
                        halted = true;
                    }
                }
            }
        }

        // Let in-flight steps finish before sealing the summary.
        while in_flight > 0 {
            let Some(completion) = rx.recv().await else { break };
            in_flight -= 1;
            if let Some(step) = plan.step(&completion.step_ref) {
                let (state, error) = match completion.result {
                    Ok(()) => (StepState::Succeeded, None),
                    Err(err) => (StepState::Failed, Some(err.to_string())),
                };
                step.set_state(state);
                outcomes.push(StepOutcome {
                    project: step.project.clone(),
                    phase: step.name.clone(),
                    state,
                    duration: completion.duration,
                    error,
                });
            }
        }
        wave.join().await;

        // Whatever never ran is skipped.
        for step in plan.steps() {
            if step.try_transition(StepState::Pending, StepState::Skipped)
                && !step.is_planned_skip()
            {
                outcomes.push(skip_outcome(step));
            }
        }

        Ok(ReactorSummary::new(plan.projects().to_vec(), outcomes, started.elapsed()))
    }

    fn dispatch(
        &self,
        wave: &phasing::Phase<'_>,
        plan: Arc<BuildPlan>,
        step_ref: StepRef,
        tx: mpsc::UnboundedSender<Completion>,
    ) {
        let mojo_executor = self.mojo_executor.clone();
        wave.spawn(async move {
            let started = Instant::now();
            let result = run_step(&plan, &step_ref, mojo_executor.as_ref()).await;
            // The receiver outlives every worker; a send failure means the
            // scheduler is already gone and the result is moot.
            let _ = tx.send(Completion { step_ref, duration: started.elapsed(), result });
        });
    }

    /// Classify a pending step against its predecessors.
    fn readiness(&self, plan: &BuildPlan, step: &crate::lifecycle::plan::BuildStep) -> Readiness {
        let mut satisfied = true;
        for predecessor in &step.predecessors {
            let Some(pred) = plan.step(predecessor) else {
                return Readiness::Doomed;
            };
            let state = pred.state();
            if !state.is_terminal() {
                return Readiness::Waiting;
            }
            let ok = match state {
                StepState::Succeeded => true,
                // A planned skip is a satisfied gate by construction.
                StepState::Skipped if pred.is_planned_skip() => true,
                _ => {
                    self.behavior == ReactorFailureBehavior::FailNever
                        && predecessor.project != step.project
                }
            };
            if !ok {
                satisfied = false;
            }
        }
        if satisfied { Readiness::Ready } else { Readiness::Doomed }
    }
}

enum Readiness {
    /// At least one predecessor is not terminal yet.
    Waiting,
    /// All predecessors terminal and satisfied.
    Ready,
    /// A predecessor terminated unsatisfied; the step is skipped.
    Doomed,
}

async fn run_step(
    plan: &BuildPlan,
    step_ref: &StepRef,
    mojo_executor: &dyn MojoExecutor,
) -> Result<(), MasonError> {
    let Some(step) = plan.step(step_ref) else {
        return Ok(());
    };
    for mojo in &step.mojos {
        mojo_executor.execute(&step.project, &step.name, mojo).await?;
    }
    Ok(())
}

fn skip_outcome(step: &crate::lifecycle::plan::BuildStep) -> StepOutcome {
    StepOutcome {
        project: step.project.clone(),
        phase: step.name.clone(),
        state: StepState::Skipped,
        duration: Duration::ZERO,
        error: None,
    }
}

/// Aggregated result of a reactor run.
pub struct ReactorSummary {
    projects: Vec<ProjectId>,
    outcomes: Vec<StepOutcome>,
    wall_time: Duration,
}

impl ReactorSummary {
    fn new(projects: Vec<ProjectId>, outcomes: Vec<StepOutcome>, wall_time: Duration) -> Self {
        Self { projects, outcomes, wall_time }
    }

    /// Per-step outcomes in completion order.
    pub fn outcomes(&self) -> &[StepOutcome] {
        &self.outcomes
    }

    pub fn wall_time(&self) -> Duration {
        self.wall_time
    }

    /// Root causes of every failed step.
    pub fn failures(&self) -> Vec<&StepOutcome> {
        self.outcomes.iter().filter(|o| o.state == StepState::Failed).collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.state != StepState::Failed)
    }

    /// Final state of one project: failed if any step failed, skipped if any
    /// step was skipped, succeeded otherwise.
    pub fn project_state(&self, project: &ProjectId) -> StepState {
        let mut state = StepState::Succeeded;
        for outcome in self.outcomes.iter().filter(|o| o.project == *project) {
            match outcome.state {
                StepState::Failed => return StepState::Failed,
                StepState::Skipped => state = StepState::Skipped,
                _ => {}
            }
        }
        state
    }

    fn project_time(&self, project: &ProjectId) -> Duration {
        self.outcomes
            .iter()
            .filter(|o| o.project == *project)
            .map(|o| o.duration)
            .sum()
    }
}

impl fmt::Display for ReactorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "Reactor Summary:".bold())?;
        writeln!(f)?;

        let per_project: HashMap<&ProjectId, StepState> =
            self.projects.iter().map(|p| (p, self.project_state(p))).collect();

        for project in &self.projects {
            let state = per_project[project];
            let label = match state {
                StepState::Succeeded => "SUCCESS".green().to_string(),
                StepState::Failed => "FAILURE".red().to_string(),
                _ => "SKIPPED".yellow().to_string(),
            };
            let name = project.to_string();
            let dots = ".".repeat(52usize.saturating_sub(name.len()).max(1));
            writeln!(
                f,
                "{} {} {} [{:>7.3} s]",
                name,
                dots,
                label,
                self.project_time(project).as_secs_f64()
            )?;
        }

        writeln!(f)?;
        if self.is_success() {
            writeln!(f, "{}", "BUILD SUCCESS".green().bold())?;
        } else {
            writeln!(f, "{}", "BUILD FAILURE".red().bold())?;
            for failure in self.failures() {
                writeln!(
                    f,
                    "  {} [{}]: {}",
                    failure.project,
                    failure.phase,
                    failure.error.as_deref().unwrap_or("unknown cause")
                )?;
            }
        }
        write!(f, "Total time: {:.3} s", self.wall_time.as_secs_f64())
    }
}
