//! Bulk deletion of unreleased package versions.

use super::error::PkgError;
use super::ids::{is_package_id, AliasTable};
use super::pattern::SemverMatcher;
use super::service::{DeleteService, PackageVersionRecord, RegistryQuery};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of deleting one matched version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOutcome {
    /// Subscriber package version id (`04t...`) of the deleted version.
    pub version_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resolve the `--package` argument to a registry package id.
///
/// # Errors
/// Returns `PKG_INVALID_SPECIFIER` if the argument (after alias
/// substitution) is not a package id.
pub fn resolve_package_id(package: &str, aliases: &AliasTable) -> Result<String, PkgError> {
    let id = aliases.substitute(package);
    if !is_package_id(id) {
        return Err(PkgError::invalid_specifier(format!(
            "'{package}' is not a package id (0Ho...) or an alias of one"
        )));
    }
    Ok(id.to_string())
}

/// Unreleased versions whose `major.minor.patch` equals the matcher, in list order.
#[must_use]
pub fn select_targets(
    versions: Vec<PackageVersionRecord>,
    matcher: &SemverMatcher,
) -> Vec<PackageVersionRecord> {
    versions
        .into_iter()
        .filter(|v| {
            !v.is_released
                && !v.is_deprecated
                && matcher.matches(v.major_version, v.minor_version, v.patch_version)
        })
        .collect()
}

/// Delete every unreleased version of `package_id` matching `matcher`.
///
/// Deletes run concurrently and settle independently; one outcome per
/// matched version, in list order.
///
/// # Errors
/// Returns `PKG_MATCHER_FORMAT` before any remote call if the matcher is
/// malformed, or the listing error if versions cannot be listed. Individual
/// delete failures are reported in their outcome, never as an error.
pub async fn cleanup_versions<R, D>(
    registry: &R,
    deleter: &D,
    package_id: &str,
    matcher: &str,
) -> Result<Vec<CleanupOutcome>, PkgError>
where
    R: RegistryQuery,
    D: DeleteService,
{
    let matcher = SemverMatcher::parse(matcher)?;
    debug!(%matcher, package = %package_id, "cleanup matcher");

    let versions = registry.list_versions(package_id).await?;
    let targets = select_targets(versions, &matcher);
    info!(count = targets.len(), %matcher, "deleting package versions");

    let deletes = targets.iter().map(|t| deleter.delete_version(&t.id));
    let results = join_all(deletes).await;

    let outcomes = targets
        .iter()
        .zip(results)
        .map(|(target, result)| {
            let version_id = target.subscriber_package_version_id.clone();
            match result {
                Ok(saved) if saved.success => CleanupOutcome {
                    version_id,
                    success: true,
                    error: None,
                },
                Ok(saved) => {
                    let error = saved.errors.join("; ");
                    warn!(version = %version_id, %error, "delete rejected");
                    CleanupOutcome {
                        version_id,
                        success: false,
                        error: (!error.is_empty()).then_some(error),
                    }
                }
                Err(e) => {
                    warn!(version = %version_id, error = %e, "delete failed");
                    CleanupOutcome {
                        version_id,
                        success: false,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    Ok(outcomes)
}
