//! Version range expressions and constraint resolution.
//!
//! A dependency's version field is either a *soft* constraint (a plain
//! version, taken as a recommendation) or a *range*:
//!
//! - `[1.0,2.0)`: between 1.0 inclusive and 2.0 exclusive
//! - `(,1.0]`: up to and including 1.0
//! - `[1.0]`: exactly 1.0
//! - `[1.5,)`: 1.5 or newer
//!
//! Range resolution picks the **highest** available version matching the
//! constraint; an unsatisfiable range is a resolution error surfaced with the
//! offending coordinate.

use super::Version;
use crate::core::MasonError;
use std::fmt;

/// One endpoint of a version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    /// Endpoint version.
    pub version: Version,
    /// Whether the endpoint itself is included.
    pub inclusive: bool,
}

/// A bounded version range. Either endpoint may be absent (open).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl VersionRange {
    /// Parse a bracketed range expression such as `[1.0,2.0)` or `[1.0]`.
    pub fn parse(raw: &str) -> Result<Self, MasonError> {
        let invalid = |reason: &str| MasonError::InvalidVersionRange {
            range: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.len() < 2 {
            return Err(invalid("empty range"));
        }
        let mut chars = trimmed.chars();
        let open = chars.next().ok_or_else(|| invalid("empty range"))?;
        let close = trimmed.chars().last().ok_or_else(|| invalid("empty range"))?;
        let lower_inclusive = match open {
            '[' => true,
            '(' => false,
            _ => return Err(invalid("range must start with '[' or '('")),
        };
        let upper_inclusive = match close {
            ']' => true,
            ')' => false,
            _ => return Err(invalid("range must end with ']' or ')'")),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let (low, high) = match inner.split_once(',') {
            Some((l, h)) => (l.trim(), h.trim()),
            None => {
                // Single-version form: must be fully inclusive, e.g. [1.0].
                if !(lower_inclusive && upper_inclusive) {
                    return Err(invalid("single-version range must use brackets, e.g. [1.0]"));
                }
                let v = inner.trim();
                if v.is_empty() {
                    return Err(invalid("missing version"));
                }
                (v, v)
            }
        };
        if inner.contains(',') && low.is_empty() && high.is_empty() {
            return Err(invalid("range must have at least one bound"));
        }

        let lower = (!low.is_empty()).then(|| Bound {
            version: Version::parse(low),
            inclusive: lower_inclusive,
        });
        let upper = (!high.is_empty()).then(|| Bound {
            version: Version::parse(high),
            inclusive: upper_inclusive,
        });

        if let (Some(l), Some(u)) = (&lower, &upper) {
            if l.version > u.version {
                return Err(invalid("lower bound is greater than upper bound"));
            }
        }

        Ok(Self { raw: trimmed.to_string(), lower, upper })
    }

    /// Whether `version` falls inside this range.
    pub fn matches(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            let ok = if lower.inclusive { *version >= lower.version } else { *version > lower.version };
            if !ok {
                return false;
            }
        }
        if let Some(upper) = &self.upper {
            let ok = if upper.inclusive { *version <= upper.version } else { *version < upper.version };
            if !ok {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A dependency's version requirement: a recommendation or a hard range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Plain version string; used as-is unless overridden by management.
    Soft(Version),
    /// Bracketed range; must be resolved against available versions.
    Range(VersionRange),
}

impl VersionConstraint {
    /// Parse a version field. Strings starting with `[` or `(` are ranges;
    /// anything else is a soft constraint.
    pub fn parse(raw: &str) -> Result<Self, MasonError> {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('(') {
            Ok(VersionConstraint::Range(VersionRange::parse(trimmed)?))
        } else {
            Ok(VersionConstraint::Soft(Version::parse(trimmed)))
        }
    }

    /// Whether this constraint needs range resolution.
    pub fn is_range(&self) -> bool {
        matches!(self, VersionConstraint::Range(_))
    }

    /// Select the version to use. Soft constraints resolve to themselves;
    /// ranges resolve to the highest available matching version.
    ///
    /// `coordinate` is used for error reporting only.
    pub fn select<'a>(
        &'a self,
        coordinate: &str,
        available: &'a [Version],
    ) -> Result<&'a Version, MasonError> {
        match self {
            VersionConstraint::Soft(v) => Ok(v),
            VersionConstraint::Range(range) => available
                .iter()
                .filter(|v| range.matches(v))
                .max()
                .ok_or_else(|| MasonError::VersionRangeUnsatisfiable {
                    coordinate: coordinate.to_string(),
                    range: range.to_string(),
                    available: available
                        .iter()
                        .map(Version::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
        }
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Soft(v) => v.fmt(f),
            VersionConstraint::Range(r) => r.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn closed_open_range() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.matches(&v("1.0")));
        assert!(range.matches(&v("1.9.9")));
        assert!(!range.matches(&v("2.0")));
        assert!(!range.matches(&v("0.9")));
    }

    #[test]
    fn open_lower_bound() {
        let range = VersionRange::parse("(,1.0]").unwrap();
        assert!(range.matches(&v("0.1")));
        assert!(range.matches(&v("1.0")));
        assert!(!range.matches(&v("1.0.1")));
    }

    #[test]
    fn exact_range() {
        let range = VersionRange::parse("[1.0]").unwrap();
        assert!(range.matches(&v("1.0")));
        assert!(range.matches(&v("1.0.0")));
        assert!(!range.matches(&v("1.0.1")));
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        assert!(VersionRange::parse("1.0,2.0").is_err());
        assert!(VersionRange::parse("[2.0,1.0]").is_err());
        assert!(VersionRange::parse("(1.0)").is_err());
        assert!(VersionRange::parse("[,]").is_err());
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse("[").is_err());
    }

    #[test]
    fn range_selects_highest_matching() {
        let constraint = VersionConstraint::parse("[1.0,2.0)").unwrap();
        let available = vec![v("0.9"), v("1.0"), v("1.5"), v("1.9"), v("2.0")];
        let selected = constraint.select("org.example:lib", &available).unwrap();
        assert_eq!(selected.as_str(), "1.9");
    }

    #[test]
    fn unsatisfiable_range_names_coordinate() {
        let constraint = VersionConstraint::parse("[3.0,)").unwrap();
        let available = vec![v("1.0"), v("2.0")];
        let err = constraint.select("org.example:lib", &available).unwrap_err();
        match err {
            MasonError::VersionRangeUnsatisfiable { coordinate, .. } => {
                assert_eq!(coordinate, "org.example:lib");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn soft_constraint_resolves_to_itself() {
        let constraint = VersionConstraint::parse("1.2.3").unwrap();
        let selected = constraint.select("org.example:lib", &[]).unwrap();
        assert_eq!(selected.as_str(), "1.2.3");
    }
}
