//! Core types shared across the build system.
//!
//! This module hosts the error type used throughout Mason ([`MasonError`]) and
//! the scope model for dependencies ([`Scope`]). Everything else lives in the
//! domain modules: [`crate::artifact`] for coordinates and types,
//! [`crate::graph`] for dependency graphs, [`crate::lifecycle`] for build
//! plans and [`crate::executor`] for the scheduler.

pub mod error;

pub use error::{MasonError, display_error};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dependency scope, controlling which build paths an artifact lands on and
/// how far the graph builder descends.
///
/// Scopes are ordered by *width*: `compile` is visible everywhere, `runtime`
/// only at run time, `provided` only at compile time, `test` only to tests.
/// `system` is special: it is pinned to a local file and its scope is never
/// rewritten by graph transformations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Needed to compile and run; the default and widest scope.
    Compile,
    /// Needed at run time only.
    Runtime,
    /// Provided by the runtime environment; compile-time only.
    Provided,
    /// Visible to test code only; the narrowest scope.
    Test,
    /// Pinned to an explicit local path; exempt from scope resolution.
    System,
}

impl Scope {
    /// Width rank used by scope resolution: a higher rank means the scope is
    /// visible in more contexts. `system` has no rank; it is never widened or
    /// narrowed.
    pub fn width(self) -> u8 {
        match self {
            Scope::Compile => 4,
            Scope::Runtime => 3,
            Scope::Provided => 2,
            Scope::Test => 1,
            // System never participates in narrowing; rank is unused.
            Scope::System => 0,
        }
    }

    /// Returns the narrower of two scopes. `system` on either side wins
    /// unchanged for `self` (the declared scope is kept).
    pub fn narrower_of(self, other: Scope) -> Scope {
        if self == Scope::System {
            return Scope::System;
        }
        if other == Scope::System {
            return self;
        }
        if self.width() <= other.width() { self } else { other }
    }

    /// The canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::System => "system",
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Compile
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "compile" => Ok(Scope::Compile),
            "runtime" => Ok(Scope::Runtime),
            "provided" => Ok(Scope::Provided),
            "test" => Ok(Scope::Test),
            "system" => Ok(Scope::System),
            other => Err(format!("unknown scope '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrower_of_picks_the_narrower_scope() {
        assert_eq!(Scope::Compile.narrower_of(Scope::Test), Scope::Test);
        assert_eq!(Scope::Test.narrower_of(Scope::Compile), Scope::Test);
        assert_eq!(Scope::Runtime.narrower_of(Scope::Runtime), Scope::Runtime);
    }

    #[test]
    fn system_is_never_rewritten() {
        assert_eq!(Scope::System.narrower_of(Scope::Test), Scope::System);
        assert_eq!(Scope::Compile.narrower_of(Scope::System), Scope::Compile);
    }

    #[test]
    fn scope_round_trips_through_str() {
        for scope in
            [Scope::Compile, Scope::Runtime, Scope::Provided, Scope::Test, Scope::System]
        {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
    }
}
