//! Org connection configuration.
//!
//! Connections live in `orgs.json` (see [`crate::paths::orgs_file_path`]),
//! keyed by alias or username:
//!
//! ```json
//! {
//!   "my-devhub": {
//!     "instanceUrl": "https://example.my.site.com",
//!     "accessToken": "00D...",
//!     "apiVersion": "59.0"
//!   }
//! }
//! ```
//!
//! An org missing from the file falls back to `PKGCRANE_INSTANCE_URL` and
//! `PKGCRANE_ACCESS_TOKEN` when both are set.

use crate::error::Error;
use crate::paths::orgs_file_path;
use crate::pkg::{PkgError, ToolingClient};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Fallback instance URL.
pub const INSTANCE_URL_ENV: &str = "PKGCRANE_INSTANCE_URL";

/// Fallback access token.
pub const ACCESS_TOKEN_ENV: &str = "PKGCRANE_ACCESS_TOKEN";

/// Fallback API version.
pub const API_VERSION_ENV: &str = "PKGCRANE_API_VERSION";

/// API version used when none is configured.
pub const DEFAULT_API_VERSION: u32 = 59;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrg {
    instance_url: String,
    access_token: String,
    #[serde(default)]
    api_version: Option<String>,
}

/// A configured org connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgConnection {
    pub name: String,
    pub instance_url: String,
    pub access_token: String,
    /// Major API version (`59` for `59.0`).
    pub api_version: u32,
}

impl OrgConnection {
    /// Build a tooling client for this org.
    ///
    /// # Errors
    /// Returns an error if the instance URL is invalid.
    pub fn client(&self) -> Result<ToolingClient, PkgError> {
        ToolingClient::new(&self.instance_url, &self.access_token, self.api_version)
    }
}

/// Parse `"59.0"` (or `"59"`) into its major number.
pub fn parse_api_version(org: &str, value: &str) -> Result<u32, Error> {
    let value = value.trim();
    let major = value.split('.').next().unwrap_or_default();
    major.parse().map_err(|_| Error::ApiVersion {
        org: org.to_string(),
        value: value.to_string(),
    })
}

/// All configured org connections.
#[derive(Debug, Clone, Default)]
pub struct OrgRegistry {
    orgs: HashMap<String, OrgConnection>,
}

impl OrgRegistry {
    /// Load from the default location. A missing file yields an empty registry.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(&orgs_file_path())
    }

    /// Load from `path`. A missing file yields an empty registry.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: HashMap<String, RawOrg> =
            serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut orgs = HashMap::with_capacity(raw.len());
        for (name, org) in raw {
            let api_version = match org.api_version.as_deref() {
                Some(v) => parse_api_version(&name, v)?,
                None => DEFAULT_API_VERSION,
            };
            orgs.insert(
                name.clone(),
                OrgConnection {
                    name,
                    instance_url: org.instance_url,
                    access_token: org.access_token,
                    api_version,
                },
            );
        }

        Ok(Self { orgs })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OrgConnection> {
        self.orgs.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.orgs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orgs.is_empty()
    }

    /// Connection for `name`, falling back to the environment.
    ///
    /// # Errors
    /// Returns `PKG_ORG_NOT_FOUND` if neither source provides a connection.
    pub fn resolve(&self, name: &str) -> Result<OrgConnection, PkgError> {
        if let Some(org) = self.get(name) {
            return Ok(org.clone());
        }

        let instance_url = std::env::var(INSTANCE_URL_ENV).ok().filter(|v| !v.is_empty());
        let access_token = std::env::var(ACCESS_TOKEN_ENV).ok().filter(|v| !v.is_empty());
        let (Some(instance_url), Some(access_token)) = (instance_url, access_token) else {
            return Err(PkgError::org_not_found(name));
        };

        let api_version = match std::env::var(API_VERSION_ENV) {
            Ok(v) if !v.is_empty() => parse_api_version(name, &v)
                .map_err(|e| PkgError::invalid_specifier(e.to_string()))?,
            _ => DEFAULT_API_VERSION,
        };

        Ok(OrgConnection {
            name: name.to_string(),
            instance_url,
            access_token,
            api_version,
        })
    }
}
