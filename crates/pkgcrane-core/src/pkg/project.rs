//! Project file loading.
//!
//! Reads the package directories, their declared dependencies and the
//! package alias table from `sfdx-project.json`.

use super::error::PkgError;
use super::ids::AliasTable;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Project file name.
pub const PROJECT_FILE: &str = "sfdx-project.json";

/// One declared dependency.
///
/// Either a bare version id / alias (`package` only), or a package id /
/// alias plus a version number to be resolved by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredDependency {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub version_number: Option<String>,
}

impl DeclaredDependency {
    /// A dependency declared by version id or alias.
    pub fn pinned(package: impl Into<String>) -> Self {
        Self {
            package: Some(package.into()),
            version_number: None,
        }
    }

    /// A dependency declared by package id/alias and version number.
    pub fn versioned(package: impl Into<String>, version_number: impl Into<String>) -> Self {
        Self {
            package: Some(package.into()),
            version_number: Some(version_number.into()),
        }
    }
}

/// A package directory entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDirectory {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DeclaredDependency>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    #[serde(default)]
    package_directories: Vec<PackageDirectory>,
    #[serde(default)]
    package_aliases: HashMap<String, String>,
}

/// A loaded project.
#[derive(Debug, Clone, Default)]
pub struct Project {
    /// Directory containing the project file.
    pub root: PathBuf,
    pub package_directories: Vec<PackageDirectory>,
    pub aliases: AliasTable,
}

impl Project {
    /// Every declared dependency across package directories, in file order.
    pub fn dependencies(&self) -> impl Iterator<Item = &DeclaredDependency> {
        self.package_directories
            .iter()
            .flat_map(|dir| dir.dependencies.iter())
    }
}

/// Find the project root by walking up from `cwd` looking for the project file.
#[must_use]
pub fn find_project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(PROJECT_FILE).is_file() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Parse project file contents.
///
/// # Errors
/// Returns `PKG_PROJECT_INVALID` if the content is not a valid project file.
pub fn parse_project(content: &str, root: &Path) -> Result<Project, PkgError> {
    let raw: RawProject = serde_json::from_str(content)
        .map_err(|e| PkgError::project_invalid(format!("Invalid {PROJECT_FILE}: {e}")))?;

    Ok(Project {
        root: root.to_path_buf(),
        package_directories: raw.package_directories,
        aliases: raw.package_aliases.into_iter().collect(),
    })
}

/// Load the project enclosing `cwd`.
///
/// # Errors
/// Returns `PKG_PROJECT_NOT_FOUND` if no project file is found, or
/// `PKG_PROJECT_INVALID` if it cannot be read or parsed.
pub fn load_project(cwd: &Path) -> Result<Project, PkgError> {
    let root = find_project_root(cwd).ok_or_else(|| PkgError::project_not_found(cwd))?;
    let path = root.join(PROJECT_FILE);
    let content = fs::read_to_string(&path)
        .map_err(|e| PkgError::project_invalid(format!("Failed to read {}: {e}", path.display())))?;
    parse_project(&content, &root)
}
