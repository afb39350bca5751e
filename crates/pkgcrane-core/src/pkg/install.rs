//! Dependency install orchestration.
//!
//! Collects the project's declared dependencies, then installs them one at a
//! time into the target environment:
//!
//! ```text
//! CREATED -> (PUBLISH_WAITING) -> SUBMITTED -> (IN_PROGRESS)* -> SUCCESS | ERROR | TIMED_OUT
//! ```
//!
//! Every package reaches a terminal outcome before the next one starts. A
//! failed or canceled install stops the run.

use super::collect::{collect_packages, PackageToInstall};
use super::delta::{should_skip, InstallType, InstalledSnapshot};
use super::error::PkgError;
use super::keys::InstallationKeys;
use super::poll::{
    minutes, poll_install_status, poll_publish_status, PollState, INSTALL_POLL_INTERVAL,
    PUBLISH_POLL_INTERVAL,
};
use super::project::{DeclaredDependency, Project};
use super::service::{
    ApexCompile, InstallRequest, InstallRequestRecord, InstallService, InstallStatus, PackageType,
    Prompter, RegistryQuery, SecurityType, SubmitError, UpgradeType, NO_ERRORS_DETECTED,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Oldest API version that supports package install requests.
pub const MIN_API_VERSION: u32 = 36;

/// Reported when nothing is declared.
pub const NO_PACKAGES_MESSAGE: &str = "No packages were found to install";

/// What to do with an install still pending when its wait budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPolicy {
    /// Report the package as pending and move on.
    #[default]
    Continue,
    /// Stop the run with `PKG_INSTALL_TIMEOUT`.
    Fail,
}

impl FromStr for PendingPolicy {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "fail" => Ok(Self::Fail),
            other => Err(PkgError::invalid_option("pending policy", other)),
        }
    }
}

impl fmt::Display for PendingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Continue => "continue",
            Self::Fail => "fail",
        })
    }
}

/// Install run options.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub install_type: InstallType,
    pub security_type: SecurityType,
    pub upgrade_type: UpgradeType,
    pub apex_compile: Option<ApexCompile>,
    pub skip_handlers: Vec<String>,
    /// Raw `id:key[,id:key]` arguments.
    pub installation_keys: Vec<String>,
    /// Branch used to resolve versioned dependencies.
    pub branch: Option<String>,
    pub publish_wait: Duration,
    pub wait: Duration,
    pub no_prompt: bool,
    pub on_pending: PendingPolicy,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            install_type: InstallType::Delta,
            security_type: SecurityType::AdminsOnly,
            upgrade_type: UpgradeType::Mixed,
            apex_compile: None,
            skip_handlers: Vec::new(),
            installation_keys: Vec::new(),
            branch: None,
            publish_wait: Duration::ZERO,
            wait: Duration::ZERO,
            no_prompt: false,
            on_pending: PendingPolicy::Continue,
        }
    }
}

/// Lifecycle of one package install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    Created,
    PublishWaiting,
    Submitted,
    InProgress,
    Success,
    Error,
    TimedOut,
}

/// One package's install, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct InstallHandle {
    pub package: PackageToInstall,
    pub installation_key: Option<String>,
    pub request_id: Option<String>,
    phase: InstallPhase,
}

impl InstallHandle {
    #[must_use]
    pub fn new(package: PackageToInstall, installation_key: Option<String>) -> Self {
        Self {
            package,
            installation_key,
            request_id: None,
            phase: InstallPhase::Created,
        }
    }

    #[must_use]
    pub fn phase(&self) -> InstallPhase {
        self.phase
    }

    fn advance(&mut self, phase: InstallPhase) {
        debug!(package = %self.package.name, from = ?self.phase, to = ?phase, "install phase");
        self.phase = phase;
    }
}

/// Terminal outcome kind of one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Installed,
    /// Still in progress on the service; not a failure.
    Pending,
    /// Already installed (delta mode).
    Skipped,
}

/// Reported result for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutcome {
    pub name: String,
    pub version_id: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<InstallStatus>,
    /// The wait budget ran out before the install finished.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl PackageOutcome {
    fn skipped(package: &PackageToInstall) -> Self {
        Self {
            name: package.name.clone(),
            version_id: package.version_id.clone(),
            outcome: Outcome::Skipped,
            request_id: None,
            status: None,
            timed_out: false,
        }
    }
}

/// Result of an install run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub packages: Vec<PackageOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InstallReport {
    /// Outcomes of the given kind.
    pub fn with_outcome(&self, outcome: Outcome) -> impl Iterator<Item = &PackageOutcome> {
        self.packages.iter().filter(move |p| p.outcome == outcome)
    }
}

/// Format the errors attached to an install request.
#[must_use]
pub fn reduce_install_errors(record: &InstallRequestRecord) -> String {
    let messages = record
        .errors
        .as_ref()
        .map(|e| e.errors.as_slice())
        .unwrap_or_default();

    if messages.is_empty() {
        return "<empty>".to_string();
    }

    let mut out = String::from("Installation errors: ");
    for (i, error) in messages.iter().enumerate() {
        out.push_str(&format!("\n{}) {}", i + 1, error.message));
    }
    out
}

/// Install every dependency declared by `project` into `target`.
///
/// Versioned dependencies are resolved through `registry` (the dev hub).
/// Confirmations go through `prompter` unless `options.no_prompt` is set.
///
/// # Errors
/// Stops at the first error: format and resolution errors, a canceled or
/// failed install, an exhausted publish wait, or (with
/// [`PendingPolicy::Fail`]) an install still pending after its wait budget.
pub async fn install_dependencies<R, S, P>(
    project: &Project,
    registry: Option<&R>,
    target: &S,
    prompter: &P,
    options: &InstallOptions,
) -> Result<InstallReport, PkgError>
where
    R: RegistryQuery,
    S: InstallService,
    P: Prompter,
{
    let api = target.api_version();
    if api < MIN_API_VERSION {
        return Err(PkgError::api_version_too_low(api, MIN_API_VERSION));
    }

    let keys = InstallationKeys::parse(&options.installation_keys, &project.aliases)?;

    let dependencies: Vec<DeclaredDependency> = project.dependencies().cloned().collect();
    let packages = collect_packages(
        &dependencies,
        &project.aliases,
        options.branch.as_deref(),
        registry,
    )
    .await?;

    if packages.is_empty() {
        info!("{NO_PACKAGES_MESSAGE}");
        return Ok(InstallReport {
            packages: Vec::new(),
            message: Some(NO_PACKAGES_MESSAGE.to_string()),
        });
    }

    let snapshot = match options.install_type {
        InstallType::Delta => InstalledSnapshot::fetch(target).await?,
        InstallType::All => InstalledSnapshot::default(),
    };

    info!(count = packages.len(), mode = %options.install_type, "installing packages");

    let mut report = InstallReport::default();
    for package in packages {
        if should_skip(options.install_type, &snapshot, &package) {
            info!(package = %package.name, version = %package.version_id, "already installed, skipping");
            report.packages.push(PackageOutcome::skipped(&package));
            continue;
        }

        let key = keys.get(&package.version_id).map(String::from);
        let mut handle = InstallHandle::new(package, key);
        let outcome = install_package(target, prompter, options, &mut handle).await?;
        report.packages.push(outcome);
    }

    Ok(report)
}

/// Drive one package from `Created` to a terminal outcome.
///
/// # Errors
/// See [`install_dependencies`].
pub async fn install_package<S: InstallService, P: Prompter>(
    target: &S,
    prompter: &P,
    options: &InstallOptions,
    handle: &mut InstallHandle,
) -> Result<PackageOutcome, PkgError> {
    let version_id = handle.package.version_id.clone();
    info!(package = %handle.package.name, version = %version_id, "installing");

    if !options.publish_wait.is_zero() {
        handle.advance(InstallPhase::PublishWaiting);
        wait_for_publish(target, handle, options.publish_wait).await?;
    }

    let info = target
        .subscriber_version(&version_id, handle.installation_key.as_deref())
        .await?;

    if options.upgrade_type == UpgradeType::Delete
        && info.package_type == Some(PackageType::Unlocked)
        && !options.no_prompt
    {
        let confirmed = prompter.confirm(
            "Upgrade type Delete removes metadata from the target that the new package \
             version no longer contains, including data in removed custom objects and \
             fields. Continue?",
        )?;
        if !confirmed {
            return Err(PkgError::install_canceled());
        }
    }

    let enable_rss = if info.external_sites.is_empty() {
        None
    } else if options.no_prompt {
        Some(true)
    } else {
        let message = format!(
            "This package makes callouts to the following websites:\n{}\nGrant access to these sites?",
            info.external_sites.join("\n")
        );
        Some(prompter.confirm(&message)?)
    };

    let request = InstallRequest {
        subscriber_package_version_key: version_id.clone(),
        password: handle.installation_key.clone(),
        apex_compile_type: options.apex_compile,
        security_type: options.security_type,
        skip_handlers: (!options.skip_handlers.is_empty())
            .then(|| options.skip_handlers.join(",")),
        upgrade_type: options.upgrade_type,
        enable_rss,
    };

    let record = match target.submit_install(&request).await {
        Ok(record) => record,
        Err(SubmitError::Partial { record, message }) => {
            warn!(package = %handle.package.name, request = %record.id, %message, "install polling timed out");
            handle.request_id = Some(record.id.clone());
            return classify(handle, record, true, options.on_pending);
        }
        Err(SubmitError::Fatal(e)) => return Err(e),
    };
    handle.request_id = Some(record.id.clone());
    handle.advance(InstallPhase::Submitted);

    let (record, timed_out) = wait_for_install(target, handle, record, options.wait).await?;
    classify(handle, record, timed_out, options.on_pending)
}

async fn wait_for_publish<S: InstallService>(
    target: &S,
    handle: &InstallHandle,
    budget: Duration,
) -> Result<(), PkgError> {
    let version_id = &handle.package.version_id;
    let mut state = PollState::start(budget);
    info!(version = %version_id, minutes = minutes(budget), "waiting for package version to become available");

    loop {
        let (status, remaining) = poll_publish_status(
            target,
            version_id,
            handle.installation_key.as_deref(),
            &mut state,
        )
        .await?;

        if status == NO_ERRORS_DETECTED {
            debug!(version = %version_id, "package version available");
            return Ok(());
        }

        debug!(version = %version_id, %status, remaining_minutes = minutes(remaining), "not yet available");
        match state.next_delay(PUBLISH_POLL_INTERVAL) {
            Some(delay) => tokio::time::sleep(delay).await,
            None => return Err(PkgError::publish_timeout(version_id)),
        }
    }
}

/// Poll until the request leaves the pending states or the budget runs out.
/// Returns the latest record and whether the budget ran out.
async fn wait_for_install<S: InstallService>(
    target: &S,
    handle: &mut InstallHandle,
    mut record: InstallRequestRecord,
    budget: Duration,
) -> Result<(InstallRequestRecord, bool), PkgError> {
    if !record.status.is_pending() {
        return Ok((record, false));
    }
    if budget.is_zero() {
        return Ok((record, false));
    }

    handle.advance(InstallPhase::InProgress);
    let mut state = PollState::start(budget);

    while record.status.is_pending() {
        let Some(delay) = state.next_delay(INSTALL_POLL_INTERVAL) else {
            return Ok((record, true));
        };
        tokio::time::sleep(delay).await;

        let (latest, remaining) = poll_install_status(target, &record.id, &mut state).await?;
        info!(
            package = %handle.package.name,
            status = %latest.status,
            remaining_minutes = minutes(remaining),
            "waiting for install"
        );
        record = latest;
    }

    Ok((record, false))
}

fn classify(
    handle: &mut InstallHandle,
    record: InstallRequestRecord,
    timed_out: bool,
    policy: PendingPolicy,
) -> Result<PackageOutcome, PkgError> {
    let mut outcome = PackageOutcome {
        name: handle.package.name.clone(),
        version_id: handle.package.version_id.clone(),
        outcome: Outcome::Installed,
        request_id: Some(record.id.clone()),
        status: Some(record.status),
        timed_out,
    };

    match record.status {
        InstallStatus::Success => {
            handle.advance(InstallPhase::Success);
            info!(package = %outcome.name, "successfully installed");
            Ok(outcome)
        }
        status if status.is_pending() => {
            // Without a wait budget nothing timed out; the request was only
            // submitted, so the strict policy does not apply.
            if timed_out {
                handle.advance(InstallPhase::TimedOut);
                if policy == PendingPolicy::Fail {
                    return Err(PkgError::install_timeout(&record.id, status.as_str()));
                }
            }
            warn!(
                package = %outcome.name,
                request = %record.id,
                %status,
                "install still in progress; check the request later"
            );
            outcome.outcome = Outcome::Pending;
            Ok(outcome)
        }
        _ => {
            handle.advance(InstallPhase::Error);
            Err(PkgError::install_failed(reduce_install_errors(&record)))
        }
    }
}
