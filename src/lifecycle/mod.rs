//! Build lifecycles.
//!
//! A lifecycle is an ordered list of named phases. Within one project the
//! phases execute strictly in declared order. A phase may additionally carry
//! a *dependency link*: phase `P` of a project with a link on `L` executes
//! only after phase `L` of every upstream project, which is what lets
//! downstream compilation start before upstream verification has finished.

pub mod plan;

use crate::core::MasonError;

/// One phase of a lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    /// Cross-project ordering: this phase runs after the named phase of
    /// every upstream project.
    pub dependency_link: Option<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), dependency_link: None }
    }

    pub fn linked(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self { name: name.into(), dependency_link: Some(link.into()) }
    }
}

/// An ordered sequence of phases.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    pub id: String,
    pub phases: Vec<Phase>,
}

impl Lifecycle {
    pub fn new(id: impl Into<String>, phases: Vec<Phase>) -> Self {
        Self { id: id.into(), phases }
    }

    /// Index of a phase by name, or [`MasonError::UnknownPhase`].
    pub fn phase_index(&self, name: &str) -> Result<usize, MasonError> {
        self.phases.iter().position(|p| p.name == name).ok_or_else(|| {
            MasonError::UnknownPhase {
                phase: name.to_string(),
                available: self
                    .phases
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }
        })
    }

    pub fn phase(&self, name: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }
}

/// The default build lifecycle.
///
/// `verify` links on `install` so a project's verification waits for its
/// upstream projects to be installed, while everything up to `package` can
/// proceed as soon as the per-project chain allows.
pub fn default_lifecycle() -> Lifecycle {
    Lifecycle::new(
        "default",
        vec![
            Phase::new("validate"),
            Phase::new("initialize"),
            Phase::new("sources"),
            Phase::new("resources"),
            Phase::new("compile"),
            Phase::new("test-compile"),
            Phase::new("test"),
            Phase::new("package"),
            Phase::new("integration-test"),
            Phase::linked("verify", "install"),
            Phase::new("install"),
            Phase::new("deploy"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lifecycle_orders_package_before_install() {
        let lifecycle = default_lifecycle();
        let package = lifecycle.phase_index("package").unwrap();
        let verify = lifecycle.phase_index("verify").unwrap();
        let install = lifecycle.phase_index("install").unwrap();
        assert!(package < verify);
        assert!(verify < install);
    }

    #[test]
    fn verify_links_on_install() {
        let lifecycle = default_lifecycle();
        assert_eq!(lifecycle.phase("verify").unwrap().dependency_link.as_deref(), Some("install"));
        assert_eq!(lifecycle.phase("compile").unwrap().dependency_link, None);
    }

    #[test]
    fn unknown_phase_lists_the_valid_ones() {
        let lifecycle = default_lifecycle();
        let err = lifecycle.phase_index("ship-it").unwrap_err();
        match err {
            MasonError::UnknownPhase { phase, available } => {
                assert_eq!(phase, "ship-it");
                assert!(available.contains("compile"));
                assert!(available.contains("deploy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
