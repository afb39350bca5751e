//! Version specifier resolution.
//!
//! Turns a `(package, versionNumber, branch)` triple into one immutable
//! package version id:
//! - a version id is returned unchanged, without touching the registry
//! - a registry package id is resolved by querying for its newest
//!   non-deprecated version matching the pattern on the requested branch

use super::error::PkgError;
use super::ids::{is_package_id, is_version_id};
use super::pattern::VersionPattern;
use super::service::{RegistryQuery, VersionQuery};
use tracing::debug;

/// Resolve a version specifier to an immutable package version id.
///
/// # Errors
/// - `PKG_INVALID_SPECIFIER` if `package` is neither a version id nor a
///   package id, or the version number cannot be parsed
/// - `PKG_VERSION_NOT_FOUND` if no version matches
/// - registry errors are propagated unchanged
pub async fn resolve_version_id<R: RegistryQuery>(
    package: &str,
    version_number: &str,
    branch: Option<&str>,
    registry: &R,
) -> Result<String, PkgError> {
    if is_version_id(package) {
        return Ok(package.to_string());
    }

    if !is_package_id(package) {
        return Err(PkgError::invalid_specifier(format!(
            "'{package}' is not a valid package id (0Ho...)"
        )));
    }

    let pattern = VersionPattern::parse(version_number)?;
    let query = VersionQuery::for_pattern(package, &pattern, branch);
    debug!(package, pattern = %pattern, branch = ?query.branch, "querying registry");

    let candidates = registry.query_versions(&query).await?;

    // Absent components are unconstrained, so the highest accepted tuple is
    // the LATEST the pattern asks for.
    candidates
        .into_iter()
        .filter(|record| query.accepts(record))
        .max_by_key(super::service::PackageVersionRecord::version_tuple)
        .map(|record| record.subscriber_package_version_id)
        .ok_or_else(|| PkgError::version_not_found(package, version_number))
}
