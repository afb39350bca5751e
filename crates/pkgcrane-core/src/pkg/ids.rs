//! Package and package version identifiers.
//!
//! Identifiers are opaque service tokens; the only structure we rely on is
//! the three-character key prefix that tells a package family (`0Ho`) apart
//! from one exact, immutable version (`04t`).

use std::collections::HashMap;

/// Key prefix of a registry package identifier.
pub const PACKAGE_ID_PREFIX: &str = "0Ho";

/// Key prefix of an immutable package version identifier.
pub const PACKAGE_VERSION_ID_PREFIX: &str = "04t";

/// Whether `input` is a registry package identifier.
#[must_use]
pub fn is_package_id(input: &str) -> bool {
    input.starts_with(PACKAGE_ID_PREFIX)
}

/// Whether `input` is an immutable package version identifier.
#[must_use]
pub fn is_version_id(input: &str) -> bool {
    input.starts_with(PACKAGE_VERSION_ID_PREFIX)
}

/// Project-scoped alias table (alias -> package id or version id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    /// Create an empty alias table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an alias, returning the previous target if any.
    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) -> Option<String> {
        self.entries.insert(alias.into(), target.into())
    }

    /// Look up an alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// Substitute `reference` through the table, returning it unchanged when
    /// it is not an alias.
    #[must_use]
    pub fn substitute<'a>(&'a self, reference: &'a str) -> &'a str {
        self.get(reference).unwrap_or(reference)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_classification() {
        assert!(is_package_id("0Ho000000000001"));
        assert!(!is_package_id("04t000000000001"));
        assert!(is_version_id("04t000000000001"));
        assert!(!is_version_id("0Ho000000000001"));
        assert!(!is_version_id(""));
        assert!(!is_package_id("my-alias"));
    }

    #[test]
    fn test_alias_substitution() {
        let aliases: AliasTable = [("core@1.2.0-1", "04tCORE")].into_iter().collect();
        assert_eq!(aliases.substitute("core@1.2.0-1"), "04tCORE");
        assert_eq!(aliases.substitute("04tOTHER"), "04tOTHER");
        assert_eq!(aliases.len(), 1);
    }
}
