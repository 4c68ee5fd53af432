//! Dependency exclusions with glob-pattern matching.
//!
//! An exclusion names a `group_id`/`artifact_id` pair; either field may be
//! `*` or a glob pattern such as `maven-*`. During graph collection the
//! exclusions accumulated along a resolution path filter children before
//! nodes are created for them.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exclusion {
    /// Group pattern; `*` matches any group.
    pub group_id: String,
    /// Artifact pattern; `*` matches any artifact.
    pub artifact_id: String,
}

impl Exclusion {
    /// Create an exclusion from group/artifact patterns.
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self { group_id: group_id.into(), artifact_id: artifact_id.into() }
    }

    /// Exclude everything. Used to cut a subtree entirely.
    pub fn wildcard() -> Self {
        Self::new("*", "*")
    }

    /// Parse `group:artifact`, `group` (artifact defaults to `*`), or `*`.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(':') {
            Some((group, artifact)) => Self::new(group, artifact),
            None => Self::new(spec, "*"),
        }
    }

    /// Whether this rule excludes the given group/artifact pair.
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        segment_matches(&self.group_id, group_id) && segment_matches(&self.artifact_id, artifact_id)
    }
}

fn segment_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains('*') || pattern.contains('?') {
        // A malformed pattern falls back to literal comparison.
        return Pattern::new(pattern).map(|p| p.matches(value)).unwrap_or(pattern == value);
    }
    pattern == value
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Whether any rule in `exclusions` matches the pair.
pub fn is_excluded(exclusions: &[Exclusion], group_id: &str, artifact_id: &str) -> bool {
    exclusions.iter().any(|e| e.matches(group_id, artifact_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let e = Exclusion::new("org.example", "lib");
        assert!(e.matches("org.example", "lib"));
        assert!(!e.matches("org.example", "other"));
        assert!(!e.matches("org.other", "lib"));
    }

    #[test]
    fn wildcard_group_with_artifact_glob() {
        // The canonical case: exclude every maven-* artifact from any group.
        let e = Exclusion::new("*", "maven-*");
        assert!(e.matches("org.apache.maven", "maven-core"));
        assert!(!e.matches("org.junit.jupiter", "junit-jupiter-engine"));
    }

    #[test]
    fn full_wildcard_excludes_everything() {
        let e = Exclusion::wildcard();
        assert!(e.matches("anything", "at-all"));
    }

    #[test]
    fn parse_forms() {
        assert_eq!(Exclusion::parse("g:a"), Exclusion::new("g", "a"));
        assert_eq!(Exclusion::parse("g"), Exclusion::new("g", "*"));
        assert_eq!(Exclusion::parse("*"), Exclusion::new("*", "*"));
    }

    #[test]
    fn list_helper() {
        let rules = vec![Exclusion::new("org.a", "*"), Exclusion::new("*", "shaded-*")];
        assert!(is_excluded(&rules, "org.a", "anything"));
        assert!(is_excluded(&rules, "org.b", "shaded-deps"));
        assert!(!is_excluded(&rules, "org.b", "plain"));
    }
}
