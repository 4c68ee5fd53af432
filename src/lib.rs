//! Mason, a build-lifecycle orchestrator and dependency resolver for
//! multi-module projects.
//!
//! The crate is organized around three stages:
//!
//! 1. **Resolution**: [`graph`] collects a dependency graph from declared
//!    dependencies through a [`graph::builder::MetadataReader`], then runs it
//!    through the transform pipeline (nearest-wins conflict resolution,
//!    duplicate elimination, scope resolution, type derivation). [`artifact`]
//!    and [`version`] provide the coordinate, type and version vocabulary,
//!    [`repository`] the local/remote artifact stores.
//! 2. **Planning**: [`project`] models the reactor and its inter-project
//!    graph, [`lifecycle`] the phase sequence, and
//!    [`lifecycle::plan::BuildPlan`] the concurrent step graph with
//!    per-project phase chains and cross-project dependency links.
//! 3. **Execution**: [`executor`] schedules the plan over a worker budget
//!    with configurable failure behavior and renders the reactor summary.
//!
//! The [`cli`] and [`manifest`] modules wire the stages into the `mason`
//! binary.

pub mod artifact;
pub mod cli;
pub mod core;
pub mod executor;
pub mod graph;
pub mod lifecycle;
pub mod manifest;
pub mod project;
pub mod repository;
pub mod utils;
pub mod version;
