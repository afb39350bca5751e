//! Remote collaborator interfaces and the records they exchange.
//!
//! The engine never talks to the network directly. Resolution and cleanup go
//! through [`RegistryQuery`], installs through [`InstallService`], deletions
//! through [`DeleteService`], and confirmations through [`Prompter`].
//! Field names on the wire follow the service's own schema (PascalCase).

use super::error::PkgError;
use super::pattern::VersionPattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One package version as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageVersionRecord {
    /// Registry record id of this version.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub package2_id: String,
    pub subscriber_package_version_id: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub patch_version: u32,
    pub build_number: u32,
    #[serde(default)]
    pub is_released: bool,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub branch: Option<String>,
}

impl PackageVersionRecord {
    /// Version tuple used for ordering.
    #[must_use]
    pub fn version_tuple(&self) -> (u32, u32, u32, u32) {
        (
            self.major_version,
            self.minor_version,
            self.patch_version,
            self.build_number,
        )
    }

    /// Branch, with an empty string treated as unset.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| !b.is_empty())
    }
}

/// Structured registry filter for version resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    pub package_id: String,
    pub major: u32,
    pub minor: Option<u32>,
    pub patch: Option<u32>,
    pub build: Option<u32>,
    /// Required branch; `None` requires the branch to be unset.
    pub branch: Option<String>,
    pub include_deprecated: bool,
}

impl VersionQuery {
    /// Build the query for a version pattern. Absent components stay
    /// unconstrained so the newest matching version sorts first.
    #[must_use]
    pub fn for_pattern(package_id: &str, pattern: &VersionPattern, branch: Option<&str>) -> Self {
        Self {
            package_id: package_id.to_string(),
            major: pattern.major,
            minor: pattern.minor,
            patch: pattern.patch,
            build: pattern.build,
            branch: branch.map(str::trim).filter(|b| !b.is_empty()).map(String::from),
            include_deprecated: false,
        }
    }

    /// Whether a record satisfies every predicate of this query.
    #[must_use]
    pub fn accepts(&self, record: &PackageVersionRecord) -> bool {
        fn pinned(want: Option<u32>, actual: u32) -> bool {
            want.map_or(true, |w| w == actual)
        }

        (self.include_deprecated || !record.is_deprecated)
            && record.major_version == self.major
            && pinned(self.minor, record.minor_version)
            && pinned(self.patch, record.patch_version)
            && pinned(self.build, record.build_number)
            && record.branch() == self.branch.as_deref()
    }
}

/// Container kind of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    Managed,
    Unlocked,
    #[serde(other)]
    Unknown,
}

/// Install-time facts about one package version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubscriberVersionInfo {
    pub id: String,
    /// Publish/validation status, `NO_ERRORS_DETECTED` once installable.
    pub install_validation_status: String,
    pub package_type: Option<PackageType>,
    /// Remote site and CSP trusted site URLs the package declares.
    pub external_sites: Vec<String>,
}

/// Validation status reported once a version is installable.
pub const NO_ERRORS_DETECTED: &str = "NO_ERRORS_DETECTED";

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => ($flag:literal, $wire:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Value accepted on the command line.
            #[must_use]
            pub fn as_flag(&self) -> &'static str {
                match self {
                    $(Self::$variant => $flag,)+
                }
            }

            /// Value sent to the service.
            #[must_use]
            pub fn as_wire(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = PkgError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($flag => Ok(Self::$variant),)+
                    other => Err(PkgError::invalid_option(stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_flag())
            }
        }
    };
}

wire_enum! {
    /// Who gets access to the installed package.
    SecurityType {
        AllUsers => ("AllUsers", "full"),
        AdminsOnly => ("AdminsOnly", "none"),
    }
}

wire_enum! {
    /// How removed metadata is handled on upgrade.
    UpgradeType {
        DeprecateOnly => ("DeprecateOnly", "deprecate-only"),
        Mixed => ("Mixed", "mixed-mode"),
        Delete => ("Delete", "delete-only"),
    }
}

wire_enum! {
    /// Apex compile scope after install.
    ApexCompile {
        All => ("all", "all"),
        Package => ("package", "package"),
    }
}

/// Install submission payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallRequest {
    pub subscriber_package_version_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apex_compile_type: Option<ApexCompile>,
    pub security_type: SecurityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_handlers: Option<String>,
    pub upgrade_type: UpgradeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_rss: Option<bool>,
}

/// Status of an install request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallStatus {
    Success,
    Error,
    InProgress,
    Unknown,
    #[serde(other)]
    Unrecognized,
}

impl InstallStatus {
    /// Whether the request may still complete.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::InProgress | Self::Unknown)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::InProgress => "IN_PROGRESS",
            Self::Unknown => "UNKNOWN",
            Self::Unrecognized => "UNRECOGNIZED",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error reported on an install request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallErrorMessage {
    pub message: String,
}

/// Structured error list on an install request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallErrors {
    #[serde(default)]
    pub errors: Vec<InstallErrorMessage>,
}

/// Install request record as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstallRequestRecord {
    pub id: String,
    pub status: InstallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_package_version_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<InstallErrors>,
}

/// Install submission failure.
#[derive(Debug, Clone)]
pub enum SubmitError {
    /// The service gave up waiting but returned the request as it stands.
    Partial {
        record: InstallRequestRecord,
        message: String,
    },
    /// Anything else; halts the run.
    Fatal(PkgError),
}

impl From<PkgError> for SubmitError {
    fn from(e: PkgError) -> Self {
        Self::Fatal(e)
    }
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partial { record, message } => {
                write!(f, "install request {} incomplete: {message}", record.id)
            }
            Self::Fatal(e) => e.fmt(f),
        }
    }
}

/// Result of a delete call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveResult {
    pub id: Option<String>,
    pub success: bool,
    pub errors: Vec<String>,
}

/// Registry query interface used for resolution and cleanup.
#[allow(async_fn_in_trait)]
pub trait RegistryQuery {
    /// Versions matching `query`, newest first.
    async fn query_versions(&self, query: &VersionQuery)
        -> Result<Vec<PackageVersionRecord>, PkgError>;

    /// Every non-deleted version of a package, released or not, oldest first.
    async fn list_versions(&self, package_id: &str) -> Result<Vec<PackageVersionRecord>, PkgError>;
}

/// Install/publish interface of the target environment.
#[allow(async_fn_in_trait)]
pub trait InstallService {
    /// API version of the connection (major number).
    fn api_version(&self) -> u32;

    /// Version ids already installed in the target.
    async fn installed_versions(&self) -> Result<Vec<String>, PkgError>;

    /// Install-time facts about a version.
    async fn subscriber_version(
        &self,
        version_id: &str,
        installation_key: Option<&str>,
    ) -> Result<SubscriberVersionInfo, PkgError>;

    /// Submit an install request.
    async fn submit_install(
        &self,
        request: &InstallRequest,
    ) -> Result<InstallRequestRecord, SubmitError>;

    /// Current state of an install request.
    async fn install_status(&self, request_id: &str) -> Result<InstallRequestRecord, PkgError>;
}

/// Version delete interface.
#[allow(async_fn_in_trait)]
pub trait DeleteService {
    async fn delete_version(&self, version_record_id: &str) -> Result<SaveResult, PkgError>;
}

/// Confirmation boundary; the engine never prompts directly.
pub trait Prompter {
    fn confirm(&self, message: &str) -> Result<bool, PkgError>;
}
