//! Package dependency engine.
//!
//! Provides:
//! - Version specifier resolution (`0Ho` package id + `1.2.LATEST` pattern)
//! - Dependency collection and deduplication from the project file
//! - Installation key parsing
//! - Delta installs against the target's installed packages
//! - Install orchestration with publish/install polling
//! - Bulk cleanup of unreleased package versions
//! - A tooling API client implementing the service traits

pub mod cleanup;
pub mod collect;
pub mod delta;
pub mod error;
pub mod http;
pub mod ids;
pub mod install;
pub mod keys;
pub mod pattern;
pub mod poll;
pub mod project;
pub mod resolve;
pub mod service;

#[cfg(test)]
mod testing;

pub use cleanup::{cleanup_versions, resolve_package_id, select_targets, CleanupOutcome};
pub use collect::{collect_packages, dedupe, PackageToInstall};
pub use delta::{should_skip, InstallType, InstalledSnapshot};
pub use error::{codes as pkg_codes, PkgError};
pub use http::ToolingClient;
pub use ids::{is_package_id, is_version_id, AliasTable, PACKAGE_ID_PREFIX, PACKAGE_VERSION_ID_PREFIX};
pub use install::{
    install_dependencies, install_package, reduce_install_errors, InstallHandle, InstallOptions,
    InstallPhase, InstallReport, Outcome, PackageOutcome, PendingPolicy, MIN_API_VERSION,
    NO_PACKAGES_MESSAGE,
};
pub use keys::InstallationKeys;
pub use pattern::{SemverMatcher, VersionPattern};
pub use poll::{PollState, INSTALL_POLL_INTERVAL, PUBLISH_POLL_INTERVAL};
pub use project::{find_project_root, load_project, DeclaredDependency, Project, PROJECT_FILE};
pub use resolve::resolve_version_id;
pub use service::{
    ApexCompile, DeleteService, InstallRequest, InstallRequestRecord, InstallService,
    InstallStatus, PackageType, PackageVersionRecord, Prompter, RegistryQuery, SaveResult,
    SecurityType, SubmitError, SubscriberVersionInfo, UpgradeType, VersionQuery,
};
