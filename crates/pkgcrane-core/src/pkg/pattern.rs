//! Version pattern and cleanup matcher parsing.
//!
//! A version pattern is `Major.Minor.Patch.Build` where any trailing
//! components may be the `LATEST` wildcard (or omitted entirely):
//! - `1.4.2.7` pins one exact build
//! - `1.4.2.LATEST` / `1.4.2-LATEST` / `1.4.2` takes the newest build of 1.4.2
//! - `1.LATEST` takes the newest 1.x
//!
//! A cleanup matcher is exactly `Major.Minor.Patch`.

use super::error::PkgError;
use regex_lite::Regex;
use std::fmt;
use std::sync::OnceLock;

const LATEST: &str = "LATEST";

/// A parsed version pattern. `None` components are unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPattern {
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub build: Option<u32>,
}

impl VersionPattern {
    /// Parse a version pattern.
    ///
    /// # Errors
    /// Returns `PKG_INVALID_SPECIFIER` if the major component is missing, a
    /// component is not a number, a pinned component follows a wildcard, or
    /// there are more than four components.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let normalized = input.trim().to_uppercase().replace("-LATEST", ".LATEST");

        let parts: Vec<&str> = normalized.split('.').collect();
        if parts.len() > 4 {
            return Err(PkgError::invalid_specifier(format!(
                "Version number '{input}' has more than four components"
            )));
        }

        let mut components: [Option<u32>; 4] = [None; 4];
        let mut wildcard_seen = false;

        for (i, part) in parts.iter().enumerate() {
            if *part == LATEST {
                wildcard_seen = true;
                continue;
            }
            if wildcard_seen {
                return Err(PkgError::invalid_specifier(format!(
                    "Version number '{input}' pins a component after LATEST"
                )));
            }
            let value = part.parse::<u32>().map_err(|_| {
                PkgError::invalid_specifier(format!(
                    "Version number '{input}' has a non-numeric component '{part}'"
                ))
            })?;
            components[i] = Some(value);
        }

        let Some(major) = components[0] else {
            return Err(PkgError::invalid_specifier(format!(
                "Version number '{input}' must pin the major version"
            )));
        };

        Ok(Self {
            major,
            minor: components[1],
            patch: components[2],
            build: components[3],
        })
    }

    /// Whether every component is pinned.
    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.minor.is_some() && self.patch.is_some() && self.build.is_some()
    }
}

impl fmt::Display for VersionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)?;
        for component in [self.minor, self.patch, self.build] {
            match component {
                Some(n) => write!(f, ".{n}")?,
                None => write!(f, ".{LATEST}")?,
            }
        }
        Ok(())
    }
}

fn matcher_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("matcher regex is valid"))
}

/// A `Major.Minor.Patch` matcher used to select versions for cleanup.
///
/// Components are wider than version numbers, so a well-formed matcher
/// beyond the `u32` range parses and simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemverMatcher {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemverMatcher {
    /// Parse a matcher.
    ///
    /// # Errors
    /// Returns `PKG_MATCHER_FORMAT` unless the input is exactly three
    /// dot-separated non-negative integers.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        if !matcher_regex().is_match(input) {
            return Err(PkgError::matcher_format(input));
        }

        let mut parts = input
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|_| PkgError::matcher_format(input)));

        // The regex guarantees exactly three parts.
        let (Some(major), Some(minor), Some(patch)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PkgError::matcher_format(input));
        };

        Ok(Self {
            major: major?,
            minor: minor?,
            patch: patch?,
        })
    }

    /// Whether the given version triple matches.
    #[must_use]
    pub fn matches(&self, major: u32, minor: u32, patch: u32) -> bool {
        self.major == u64::from(major)
            && self.minor == u64::from(minor)
            && self.patch == u64::from(patch)
    }
}

impl fmt::Display for SemverMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
