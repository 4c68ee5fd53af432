//! The concurrent build plan.
//!
//! A [`BuildPlan`] is a map from (project, step name) to a [`BuildStep`]. A
//! step carries the mojo executions bound to its phase, a predecessor set
//! that may cross projects, and an atomic state that the scheduler advances
//! with compare-and-swap transitions.
//!
//! Plan construction for an end phase creates steps for *every* lifecycle
//! phase. Phases past the requested end are flagged as *planned skips*: they
//! run no mojos and complete as `Skipped`, but they exist, which keeps
//! cross-project dependency links anchored to real steps no matter which
//! phase was requested. Requesting `verify` and later chaining `install` via
//! [`BuildPlan::then`] simply activates the already-present install steps.

use crate::core::MasonError;
use crate::executor::mojo::MojoExecution;
use crate::lifecycle::Lifecycle;
use crate::project::{Project, ProjectId, ReactorGraph};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// State of one build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepState {
    Pending = 0,
    Ready = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
    Skipped = 5,
}

impl StepState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Ready,
            2 => Self::Running,
            3 => Self::Succeeded,
            4 => Self::Failed,
            _ => Self::Skipped,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(label)
    }
}

/// Reference to a step: a project plus a step name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepRef {
    pub project: ProjectId,
    pub name: String,
}

impl StepRef {
    pub fn new(project: ProjectId, name: impl Into<String>) -> Self {
        Self { project, name: name.into() }
    }
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.project, self.name)
    }
}

/// One step of the plan.
#[derive(Debug)]
pub struct BuildStep {
    pub project: ProjectId,
    pub name: String,
    /// Bound executions, kept sorted by priority (lower first).
    pub mojos: Vec<MojoExecution>,
    /// Steps that must be terminal before this one may start.
    pub predecessors: BTreeSet<StepRef>,
    state: AtomicU8,
    planned_skip: bool,
}

impl BuildStep {
    fn new(project: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
            mojos: Vec::new(),
            predecessors: BTreeSet::new(),
            state: AtomicU8::new(StepState::Pending as u8),
            planned_skip: false,
        }
    }

    /// Reference to this step.
    pub fn step_ref(&self) -> StepRef {
        StepRef::new(self.project.clone(), self.name.clone())
    }

    /// Current state.
    pub fn state(&self) -> StepState {
        StepState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Compare-and-swap transition. Returns whether the transition won.
    pub fn try_transition(&self, from: StepState, to: StepState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditional transition, for terminal bookkeeping by the scheduler.
    pub fn set_state(&self, to: StepState) {
        self.state.store(to as u8, Ordering::Release);
    }

    /// Whether this step exists only to gate ordering: it runs no mojos and
    /// completes as `Skipped`.
    pub fn is_planned_skip(&self) -> bool {
        self.planned_skip
    }
}

/// A concurrent build plan over a reactor.
#[derive(Debug)]
pub struct BuildPlan {
    steps: HashMap<StepRef, BuildStep>,
    /// Insertion order; per project this is the phase chain order.
    order: Vec<StepRef>,
    projects: Vec<ProjectId>,
}

impl BuildPlan {
    /// Build the plan for running `projects` through `lifecycle` up to
    /// `end_phase`.
    ///
    /// Steps are created for every phase; those past `end_phase` are planned
    /// skips. Within a project, each phase's step has the previous phase as
    /// predecessor. A phase with a dependency link additionally takes the
    /// linked phase of every direct upstream project as predecessor.
    pub fn for_phase(
        projects: &[Project],
        reactor: &ReactorGraph,
        lifecycle: &Lifecycle,
        end_phase: &str,
    ) -> Result<Self, MasonError> {
        let end = lifecycle.phase_index(end_phase)?;
        let sorted = reactor.sorted_projects()?;
        let by_id: HashMap<&ProjectId, &Project> =
            projects.iter().map(|p| (&p.id, p)).collect();

        let mut plan = Self { steps: HashMap::new(), order: Vec::new(), projects: Vec::new() };

        for project_id in &sorted {
            let project = by_id[project_id];
            let mut previous: Option<StepRef> = None;

            for (index, phase) in lifecycle.phases.iter().enumerate() {
                let mut step = BuildStep::new(project_id.clone(), &phase.name);
                step.planned_skip = index > end;

                if let Some(bound) = project.executions.get(&phase.name) {
                    step.mojos = bound.clone();
                    step.mojos.sort_by_key(|m| m.priority);
                }
                if let Some(prev) = previous.take() {
                    step.predecessors.insert(prev);
                }
                if let Some(link) = &phase.dependency_link {
                    for up in reactor.direct_upstream(project_id) {
                        step.predecessors.insert(StepRef::new(up, link));
                    }
                }

                let step_ref = step.step_ref();
                plan.order.push(step_ref.clone());
                plan.steps.insert(step_ref.clone(), step);
                previous = Some(step_ref);
            }

            plan.projects.push(project_id.clone());
        }

        plan.validate()?;
        Ok(plan)
    }

    /// Chain `next` after this plan.
    ///
    /// Steps with the same (project, name) are fused: mojos are unioned by
    /// id, predecessor sets are unioned, and an active step clears a planned
    /// skip. A step of `next` with no counterpart here is appended, and the
    /// first such step of each project gains the project's current exit step
    /// as predecessor so per-project ordering is preserved. Cross-project
    /// parallelism is untouched.
    pub fn then(mut self, next: BuildPlan) -> Result<BuildPlan, MasonError> {
        // Current exit step of each project in this plan.
        let mut exits: HashMap<ProjectId, StepRef> = HashMap::new();
        for step_ref in &self.order {
            exits.insert(step_ref.project.clone(), step_ref.clone());
        }

        let BuildPlan { mut steps, order, projects } = next;
        let mut entered: HashSet<ProjectId> = HashSet::new();

        for step_ref in order {
            let Some(incoming) = steps.remove(&step_ref) else { continue };
            match self.steps.get_mut(&step_ref) {
                Some(existing) => {
                    for mojo in incoming.mojos {
                        if !existing.mojos.iter().any(|m| m.id == mojo.id) {
                            existing.mojos.push(mojo);
                        }
                    }
                    existing.mojos.sort_by_key(|m| m.priority);
                    existing.predecessors.extend(incoming.predecessors);
                    if !incoming.planned_skip {
                        existing.planned_skip = false;
                    }
                }
                None => {
                    let mut incoming = incoming;
                    if entered.insert(step_ref.project.clone())
                        && let Some(exit) = exits.get(&step_ref.project)
                    {
                        incoming.predecessors.insert(exit.clone());
                    }
                    self.order.push(step_ref.clone());
                    self.steps.insert(step_ref, incoming);
                }
            }
        }

        for project in projects {
            if !self.projects.contains(&project) {
                self.projects.push(project);
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Every referenced predecessor must be a step of the plan.
    pub fn validate(&self) -> Result<(), MasonError> {
        for step in self.steps.values() {
            for predecessor in &step.predecessors {
                if !self.steps.contains_key(predecessor) {
                    return Err(MasonError::MissingPredecessor {
                        step: step.step_ref().to_string(),
                        predecessor: predecessor.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn step(&self, step_ref: &StepRef) -> Option<&BuildStep> {
        self.steps.get(step_ref)
    }

    /// All steps in insertion order.
    pub fn steps(&self) -> impl Iterator<Item = &BuildStep> {
        self.order.iter().filter_map(|r| self.steps.get(r))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Projects of the plan, upstream-first.
    pub fn projects(&self) -> &[ProjectId] {
        &self.projects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactCoordinate;
    use crate::graph::Dependency;
    use crate::lifecycle::default_lifecycle;

    fn two_projects() -> Vec<Project> {
        let a = Project::new(ProjectId::new("org.example", "a", "1.0"))
            .bind("compile", MojoExecution::new("compile-a", "true"));
        let b = Project::new(ProjectId::new("org.example", "b", "1.0"))
            .depends_on(Dependency::new(ArtifactCoordinate::new("org.example", "a", "1.0")))
            .bind("compile", MojoExecution::new("compile-b", "true"));
        vec![a, b]
    }

    fn plan_for(projects: &[Project], end_phase: &str) -> BuildPlan {
        let reactor = ReactorGraph::from_projects(projects).unwrap();
        BuildPlan::for_phase(projects, &reactor, &default_lifecycle(), end_phase).unwrap()
    }

    fn step_ref(artifact: &str, name: &str) -> StepRef {
        StepRef::new(ProjectId::new("org.example", artifact, "1.0"), name)
    }

    #[test]
    fn every_phase_gets_a_step() {
        let projects = two_projects();
        let plan = plan_for(&projects, "compile");
        // 12 phases x 2 projects
        assert_eq!(plan.len(), 24);
    }

    #[test]
    fn phases_past_the_end_are_planned_skips() {
        let projects = two_projects();
        let plan = plan_for(&projects, "compile");

        assert!(!plan.step(&step_ref("a", "compile")).unwrap().is_planned_skip());
        assert!(!plan.step(&step_ref("a", "validate")).unwrap().is_planned_skip());
        assert!(plan.step(&step_ref("a", "test")).unwrap().is_planned_skip());
        assert!(plan.step(&step_ref("a", "install")).unwrap().is_planned_skip());
    }

    #[test]
    fn phase_chain_links_each_step_to_the_previous() {
        let projects = two_projects();
        let plan = plan_for(&projects, "install");

        let test = plan.step(&step_ref("a", "test")).unwrap();
        assert!(test.predecessors.contains(&step_ref("a", "test-compile")));
    }

    #[test]
    fn dependency_link_crosses_projects() {
        let projects = two_projects();
        let plan = plan_for(&projects, "install");

        let verify_b = plan.step(&step_ref("b", "verify")).unwrap();
        assert!(verify_b.predecessors.contains(&step_ref("a", "install")));
        // No link on compile: downstream compilation does not wait.
        let compile_b = plan.step(&step_ref("b", "compile")).unwrap();
        assert!(compile_b.predecessors.iter().all(|p| p.project.artifact_id == "b"));
    }

    #[test]
    fn chaining_install_after_verify_activates_install_steps() {
        let projects = two_projects();
        let verify_plan = plan_for(&projects, "verify");
        assert!(verify_plan.step(&step_ref("a", "install")).unwrap().is_planned_skip());

        let chained = verify_plan.then(plan_for(&projects, "install")).unwrap();

        let install_a = chained.step(&step_ref("a", "install")).unwrap();
        assert!(!install_a.is_planned_skip());
        assert!(install_a.predecessors.contains(&step_ref("a", "verify")));
        // The cross-project gate still holds after fusion.
        let verify_b = chained.step(&step_ref("b", "verify")).unwrap();
        assert!(verify_b.predecessors.contains(&step_ref("a", "install")));
        // Fusion does not grow the step count.
        assert_eq!(chained.len(), 24);
    }

    #[test]
    fn fusing_deduplicates_mojos_by_id() {
        let projects = two_projects();
        let chained =
            plan_for(&projects, "compile").then(plan_for(&projects, "compile")).unwrap();
        let compile_a = chained.step(&step_ref("a", "compile")).unwrap();
        assert_eq!(compile_a.mojos.len(), 1);
    }

    #[test]
    fn mojos_are_ordered_by_priority() {
        let project = Project::new(ProjectId::new("org.example", "solo", "1.0"))
            .bind("compile", MojoExecution::new("late", "true").with_priority(10))
            .bind("compile", MojoExecution::new("early", "true").with_priority(-5));
        let projects = vec![project];
        let plan = plan_for(&projects, "compile");

        let compile = plan
            .step(&StepRef::new(ProjectId::new("org.example", "solo", "1.0"), "compile"))
            .unwrap();
        let ids: Vec<_> = compile.mojos.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn dangling_predecessor_fails_validation() {
        let projects = two_projects();
        let mut plan = plan_for(&projects, "compile");
        let ghost = step_ref("ghost", "install");
        plan.steps
            .get_mut(&step_ref("a", "compile"))
            .unwrap()
            .predecessors
            .insert(ghost.clone());

        let err = plan.validate().unwrap_err();
        match err {
            MasonError::MissingPredecessor { step, predecessor } => {
                assert_eq!(step, step_ref("a", "compile").to_string());
                assert_eq!(predecessor, ghost.to_string());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_end_phase_is_rejected() {
        let projects = two_projects();
        let reactor = ReactorGraph::from_projects(&projects).unwrap();
        let err = BuildPlan::for_phase(&projects, &reactor, &default_lifecycle(), "polish")
            .unwrap_err();
        assert!(matches!(err, MasonError::UnknownPhase { .. }));
    }

    #[test]
    fn cas_transitions_enforce_the_expected_from_state() {
        let projects = two_projects();
        let plan = plan_for(&projects, "compile");
        let step = plan.step(&step_ref("a", "compile")).unwrap();

        assert_eq!(step.state(), StepState::Pending);
        assert!(step.try_transition(StepState::Pending, StepState::Ready));
        // A stale scan loses the race.
        assert!(!step.try_transition(StepState::Pending, StepState::Ready));
        assert!(step.try_transition(StepState::Ready, StepState::Running));
        step.set_state(StepState::Succeeded);
        assert!(step.state().is_terminal());
    }
}
