//! Version parsing, comparison, and range resolution.
//!
//! Artifact versions are free-form strings (`4.0.0`, `1.0-alpha-2`,
//! `2.1-SNAPSHOT`), not semver, so this module implements tokenized ordering:
//! versions are split into numeric and qualifier items on `.`, `-` and
//! letter/digit boundaries, and items are compared by rank. Known qualifiers
//! sort `alpha < beta < milestone < rc < snapshot < (release) < sp`; unknown
//! qualifiers sort after `sp`, alphabetically; numbers sort after everything
//! else, numerically. Trailing "null" items (`0`, empty, `final`, `ga`) are
//! trimmed so that `1.0` equals `1.0.0` and `1-final` equals `1`.
//!
//! [`range`] provides range expressions (`[1.0,2.0)`, `(,1.0]`, `[1.0]`) and
//! selection of the best available version for a constraint.

pub mod range;

pub use range::{VersionConstraint, VersionRange};

use std::cmp::Ordering;
use std::fmt;

/// A parsed version with total ordering.
///
/// The original string is retained for display; equality and ordering are
/// defined on the normalized token sequence, so `1.0` == `1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    items: Vec<Item>,
}

/// A single version token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Number(u64),
    Qualifier(String),
}

/// Comparison rank of an item. Numbers outrank all qualifiers; the empty
/// qualifier ranks as a release.
fn rank(item: &Item) -> u8 {
    match item {
        Item::Number(n) if *n > 0 => 9,
        Item::Number(_) => 6, // zero is a "null" item, equal to a release
        Item::Qualifier(q) => match q.as_str() {
            "alpha" | "a" => 1,
            "beta" | "b" => 2,
            "milestone" | "m" => 3,
            "rc" | "cr" => 4,
            "snapshot" => 5,
            "" | "final" | "ga" | "release" => 6,
            "sp" => 7,
            _ => 8,
        },
    }
}

fn is_null_item(item: &Item) -> bool {
    rank(item) == 6
}

fn compare_items(a: &Item, b: &Item) -> Ordering {
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Item::Number(x), Item::Number(y)) => x.cmp(y),
        // Only unknown qualifiers compare alphabetically; aliases with the
        // same known rank (alpha/a, final/ga) are equal.
        (Item::Qualifier(x), Item::Qualifier(y)) if ra == 8 => x.cmp(y),
        _ => Ordering::Equal,
    }
}

impl Version {
    /// Parse a version string. Parsing never fails; any string is a valid
    /// version, possibly consisting of a single qualifier item.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        let mut items = Vec::new();
        let mut buf = String::new();
        let mut buf_is_digit = false;

        let flush = |buf: &mut String, is_digit: bool, items: &mut Vec<Item>| {
            if buf.is_empty() {
                return;
            }
            if is_digit {
                // Extremely long numeric runs saturate rather than panic.
                items.push(Item::Number(buf.parse::<u64>().unwrap_or(u64::MAX)));
            } else {
                items.push(Item::Qualifier(std::mem::take(buf)));
                return;
            }
            buf.clear();
        };

        for ch in lower.chars() {
            if ch == '.' || ch == '-' || ch == '_' {
                flush(&mut buf, buf_is_digit, &mut items);
            } else {
                let is_digit = ch.is_ascii_digit();
                if !buf.is_empty() && is_digit != buf_is_digit {
                    // Letter/digit transition acts as an implicit separator.
                    flush(&mut buf, buf_is_digit, &mut items);
                }
                buf.push(ch);
                buf_is_digit = is_digit;
            }
        }
        flush(&mut buf, buf_is_digit, &mut items);

        // Trim trailing null items so 1.0.0 == 1.0 == 1.
        while items.len() > 1 && items.last().is_some_and(is_null_item) {
            items.pop();
        }

        Self { raw: raw.trim().to_string(), items }
    }

    /// The original (trimmed) version string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version is a snapshot, either literal (`1.0-SNAPSHOT`) or
    /// a timestamped snapshot deployment (`1.0-20240101.120000-1`).
    pub fn is_snapshot(&self) -> bool {
        self.raw.to_ascii_uppercase().ends_with("-SNAPSHOT")
            || timestamped_snapshot_base(&self.raw).is_some()
    }

    /// The base version: identical to the version itself except for
    /// timestamped snapshots, which map back to their `-SNAPSHOT` base.
    pub fn base_version(&self) -> String {
        base_version_of(&self.raw)
    }
}

/// Base version of a raw version string; see [`Version::base_version`].
pub fn base_version_of(version: &str) -> String {
    timestamped_snapshot_base(version).unwrap_or_else(|| version.to_string())
}

/// If `version` looks like `prefix-yyyyMMdd.HHmmss-buildNumber`, return
/// `prefix-SNAPSHOT`.
fn timestamped_snapshot_base(version: &str) -> Option<String> {
    let (rest, build) = version.rsplit_once('-')?;
    if build.is_empty() || !build.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (prefix, stamp) = rest.rsplit_once('-')?;
    let (date, time) = stamp.split_once('.')?;
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if date.len() == 8 && time.len() == 6 && all_digits(date) && all_digits(time) {
        Some(format!("{prefix}-SNAPSHOT"))
    } else {
        None
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let null = Item::Number(0);
        let len = self.items.len().max(other.items.len());
        for i in 0..len {
            let a = self.items.get(i).unwrap_or(&null);
            let b = other.items.get(i).unwrap_or(&null);
            let ord = compare_items(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash the normalized items so that equal versions hash equally.
        for item in &self.items {
            match item {
                Item::Number(n) => {
                    0u8.hash(state);
                    n.hash(state);
                }
                Item::Qualifier(q) => {
                    1u8.hash(state);
                    q.hash(state);
                }
            }
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
    fn numeric_ordering() {
        assert!(v("1.0") < v("1.1"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0.1") > v("2.0"));
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.0-final"), v("1.0"));
        assert_eq!(v("1.0-ga"), v("1.0"));
    }

    #[test]
    fn qualifier_ordering() {
        assert!(v("1.0-alpha") < v("1.0-beta"));
        assert!(v("1.0-beta") < v("1.0-milestone"));
        assert!(v("1.0-milestone") < v("1.0-rc"));
        assert!(v("1.0-rc") < v("1.0-SNAPSHOT"));
        assert!(v("1.0-SNAPSHOT") < v("1.0"));
        assert!(v("1.0") < v("1.0-sp"));
    }

    #[test]
    fn unknown_qualifiers_sort_after_sp_alphabetically() {
        assert!(v("1.0-sp") < v("1.0-xyz"));
        assert!(v("1.0-abc") < v("1.0-xyz"));
    }

    #[test]
    fn qualifier_aliases_are_equal() {
        assert_eq!(v("1.0-alpha-1"), v("1.0-a-1"));
        assert_eq!(v("1.0-rc-1"), v("1.0-cr-1"));
    }

    #[test]
    fn embedded_qualifier_numbering() {
        assert!(v("1.0-alpha-1") < v("1.0-alpha-2"));
        assert!(v("1.0-alpha-9") < v("1.0-alpha-10"));
        assert!(v("1.0alpha1") < v("1.0-alpha-2"));
    }

    #[test]
    fn snapshot_detection_and_base_version() {
        assert!(v("1.0-SNAPSHOT").is_snapshot());
        assert!(v("1.0-20240101.120000-1").is_snapshot());
        assert!(!v("1.0").is_snapshot());
        assert_eq!(v("1.0-20240101.120000-1").base_version(), "1.0-SNAPSHOT");
        assert_eq!(v("1.0-SNAPSHOT").base_version(), "1.0-SNAPSHOT");
        assert_eq!(v("4.0.0").base_version(), "4.0.0");
    }

    #[test]
    fn base_version_rejects_near_misses() {
        assert_eq!(base_version_of("1.0-2024010.120000-1"), "1.0-2024010.120000-1");
        assert_eq!(base_version_of("1.0-20240101.120000-x"), "1.0-20240101.120000-x");
    }
}
