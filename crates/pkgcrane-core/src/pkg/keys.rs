//! Installation key table.
//!
//! Keys are passed as `id:key` pairs, several per argument separated by
//! commas (`04tA:secret,core:other`). Ids may be aliases.

use super::error::PkgError;
use super::ids::AliasTable;
use regex_lite::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

fn key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\w+:\w+(,\s*\w+:\w+)*$").expect("installation key regex is valid")
    })
}

/// Installation keys by resolved package version id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallationKeys {
    keys: HashMap<String, String>,
}

impl InstallationKeys {
    /// Parse installation key arguments.
    ///
    /// Every argument is validated before anything is stored, so a single
    /// malformed argument yields no table at all. Later pairs for the same
    /// resolved id overwrite earlier ones.
    ///
    /// # Errors
    /// Returns `PKG_KEY_FORMAT` for the first malformed argument.
    pub fn parse<S: AsRef<str>>(inputs: &[S], aliases: &AliasTable) -> Result<Self, PkgError> {
        let trimmed: Vec<&str> = inputs.iter().map(|s| s.as_ref().trim()).collect();

        if let Some(bad) = trimmed.iter().find(|s| !key_regex().is_match(s)) {
            return Err(PkgError::key_format(bad));
        }

        let mut keys = HashMap::new();
        for pair in trimmed.iter().flat_map(|s| s.split(',')) {
            let Some((id, key)) = pair.trim().split_once(':') else {
                return Err(PkgError::key_format(pair));
            };
            keys.insert(aliases.substitute(id).to_string(), key.to_string());
        }

        Ok(Self { keys })
    }

    /// Key for a package version id.
    #[must_use]
    pub fn get(&self, version_id: &str) -> Option<&str> {
        self.keys.get(version_id).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
