//! Dependency collection and deduplication.
//!
//! Walks declared dependencies in order and produces the list of exact
//! package versions to install. Entries that name a package id plus a version
//! number are resolved through the registry; everything else must already be
//! (or alias to) a package version id.

use super::error::PkgError;
use super::ids::{is_package_id, is_version_id, AliasTable};
use super::pattern::VersionPattern;
use super::project::DeclaredDependency;
use super::resolve::resolve_version_id;
use super::service::RegistryQuery;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// One package version selected for installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageToInstall {
    /// Name as declared (alias, id, or `package@version`).
    pub name: String,
    pub version_id: String,
}

impl PackageToInstall {
    pub fn new(name: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_id: version_id.into(),
        }
    }
}

/// Outcome of classifying one declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Planned {
    Ready(PackageToInstall),
    Deferred {
        name: String,
        package: String,
        version_number: String,
    },
}

/// Classify declared dependencies without touching the network.
fn plan(
    dependencies: &[DeclaredDependency],
    aliases: &AliasTable,
) -> Result<Vec<Planned>, PkgError> {
    let mut planned = Vec::with_capacity(dependencies.len());

    for dep in dependencies {
        let Some(package) = dep.package.as_deref().filter(|p| !p.is_empty()) else {
            debug!(?dep, "skipping dependency without a package reference");
            continue;
        };

        let target = aliases.substitute(package);

        match dep.version_number.as_deref().filter(|v| !v.is_empty()) {
            Some(version_number) => {
                // Version ids pass through resolution untouched.
                if !is_version_id(target) {
                    if !is_package_id(target) {
                        return Err(PkgError::invalid_specifier(format!(
                            "'{package}' is not a valid package id (0Ho...)"
                        )));
                    }
                    VersionPattern::parse(version_number)?;
                }
                planned.push(Planned::Deferred {
                    name: format!("{package}@{version_number}"),
                    package: target.to_string(),
                    version_number: version_number.to_string(),
                });
            }
            None => {
                if !is_version_id(target) {
                    return Err(PkgError::no_version_id(package));
                }
                planned.push(Planned::Ready(PackageToInstall::new(package, target)));
            }
        }
    }

    Ok(planned)
}

/// Collect the package versions to install, in declaration order.
///
/// Every declared reference is validated before any registry query; registry
/// resolution uses `branch` and requires `registry` to be present.
///
/// # Errors
/// - `PKG_NO_VERSION_ID` for a bare reference that is not a version id
/// - `PKG_INVALID_SPECIFIER` for a versioned reference that is not a package
///   id or whose version number does not parse
/// - `PKG_DEV_HUB_MISSING` if resolution is needed but `registry` is `None`
/// - any resolution error from [`resolve_version_id`]
pub async fn collect_packages<R: RegistryQuery>(
    dependencies: &[DeclaredDependency],
    aliases: &AliasTable,
    branch: Option<&str>,
    registry: Option<&R>,
) -> Result<Vec<PackageToInstall>, PkgError> {
    let planned = plan(dependencies, aliases)?;

    let deferred = planned
        .iter()
        .filter(|p| matches!(p, Planned::Deferred { .. }))
        .count();

    let registry = match (deferred, registry) {
        (0, _) => None,
        (_, Some(registry)) => Some(registry),
        (_, None) => return Err(PkgError::dev_hub_missing()),
    };

    if deferred > 0 {
        info!(count = deferred, "resolving package versions from dev hub");
    }

    let mut packages = Vec::with_capacity(planned.len());
    for entry in planned {
        match entry {
            Planned::Ready(pkg) => packages.push(pkg),
            Planned::Deferred {
                name,
                package,
                version_number,
            } => {
                // `registry` is Some whenever anything was deferred.
                let Some(registry) = registry else {
                    return Err(PkgError::dev_hub_missing());
                };
                let version_id =
                    resolve_version_id(&package, &version_number, branch, registry).await?;
                debug!(%name, %version_id, "resolved");
                packages.push(PackageToInstall::new(name, version_id));
            }
        }
    }

    Ok(dedupe(packages))
}

/// Drop later duplicates by version id, keeping first occurrences in order.
#[must_use]
pub fn dedupe(packages: Vec<PackageToInstall>) -> Vec<PackageToInstall> {
    let mut seen = HashSet::new();
    packages
        .into_iter()
        .filter(|pkg| seen.insert(pkg.version_id.clone()))
        .collect()
}
