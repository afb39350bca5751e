//! Delta install gate.

use super::collect::PackageToInstall;
use super::error::PkgError;
use super::service::InstallService;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which declared packages to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallType {
    /// Install everything, even versions already present.
    All,
    /// Install only versions not already present.
    #[default]
    Delta,
}

impl FromStr for InstallType {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "All" => Ok(Self::All),
            "Delta" => Ok(Self::Delta),
            other => Err(PkgError::invalid_option("install type", other)),
        }
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::All => "All",
            Self::Delta => "Delta",
        })
    }
}

/// Version ids installed in the target at the start of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledSnapshot {
    versions: HashSet<String>,
}

impl InstalledSnapshot {
    /// Fetch the snapshot once from the target.
    pub async fn fetch<S: InstallService>(service: &S) -> Result<Self, PkgError> {
        Ok(service.installed_versions().await?.into_iter().collect())
    }

    #[must_use]
    pub fn contains(&self, version_id: &str) -> bool {
        self.versions.contains(version_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for InstalledSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Whether `target` is already installed and should be skipped.
#[must_use]
pub fn should_skip(mode: InstallType, snapshot: &InstalledSnapshot, target: &PackageToInstall) -> bool {
    mode == InstallType::Delta && snapshot.contains(&target.version_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::testing::MockService;

    #[test]
    fn test_delta_skips_installed_only() {
        let snapshot: InstalledSnapshot = ["04tV1"].into_iter().collect();
        let targets = [
            PackageToInstall::new("v1", "04tV1"),
            PackageToInstall::new("v2", "04tV2"),
        ];

        let remaining: Vec<&str> = targets
            .iter()
            .filter(|t| !should_skip(InstallType::Delta, &snapshot, t))
            .map(|t| t.version_id.as_str())
            .collect();
        assert_eq!(remaining, ["04tV2"]);
    }

    #[test]
    fn test_all_never_skips() {
        let snapshot: InstalledSnapshot = ["04tV1"].into_iter().collect();
        let target = PackageToInstall::new("v1", "04tV1");
        assert!(!should_skip(InstallType::All, &snapshot, &target));
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let mut svc = MockService::new();
        svc.installed = vec!["04tA".into(), "04tB".into(), "04tA".into()];
        let snapshot = InstalledSnapshot::fetch(&svc).await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("04tB"));
    }

    #[test]
    fn test_install_type_parse() {
        assert_eq!("All".parse::<InstallType>().unwrap(), InstallType::All);
        assert_eq!(InstallType::default(), InstallType::Delta);
        let err = "delta".parse::<InstallType>().unwrap_err();
        assert_eq!(err.code(), crate::pkg::error::codes::PKG_INVALID_OPTION);
    }
}
