//! In-memory service used by the engine's unit tests.

use super::error::PkgError;
use super::service::{
    DeleteService, InstallErrorMessage, InstallErrors, InstallRequest, InstallRequestRecord,
    InstallService, InstallStatus, PackageType, PackageVersionRecord, Prompter, RegistryQuery,
    SaveResult, SubmitError, SubscriberVersionInfo, VersionQuery, NO_ERRORS_DETECTED,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};

pub fn version(
    subscriber_id: &str,
    (major, minor, patch, build): (u32, u32, u32, u32),
    released: bool,
) -> PackageVersionRecord {
    PackageVersionRecord {
        id: format!("05i{}", &subscriber_id[3..]),
        package2_id: "0HoPKG".into(),
        subscriber_package_version_id: subscriber_id.into(),
        major_version: major,
        minor_version: minor,
        patch_version: patch,
        build_number: build,
        is_released: released,
        is_deprecated: false,
        branch: None,
    }
}

#[derive(Default)]
pub struct MockService {
    pub versions: Vec<PackageVersionRecord>,
    pub installed: Vec<String>,
    pub api: u32,
    pub package_types: HashMap<String, PackageType>,
    pub external_sites: HashMap<String, Vec<String>>,
    /// Validation statuses handed out in order; once drained, installable.
    pub publish_statuses: RefCell<VecDeque<String>>,
    /// Status sequence per version id: first on submit, then one per poll.
    /// The last status repeats.
    pub install_scripts: HashMap<String, Vec<InstallStatus>>,
    pub submit_errors: HashMap<String, SubmitError>,
    pub failing_deletes: HashSet<String>,
    pub rejected_deletes: HashSet<String>,

    pub registry_calls: Cell<usize>,
    pub subscriber_calls: Cell<usize>,
    pub submitted: RefCell<Vec<InstallRequest>>,
    pub polls: RefCell<HashMap<String, usize>>,
    pub deleted: RefCell<Vec<String>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            api: 59,
            ..Self::default()
        }
    }

    fn scripted_status(&self, version_id: &str, step: usize) -> InstallStatus {
        match self.install_scripts.get(version_id) {
            Some(script) if !script.is_empty() => script[step.min(script.len() - 1)],
            _ => InstallStatus::Success,
        }
    }

    fn record_for(&self, version_id: &str, status: InstallStatus) -> InstallRequestRecord {
        InstallRequestRecord {
            id: format!("0Hf{version_id}"),
            status,
            subscriber_package_version_key: Some(version_id.to_string()),
            errors: (status == InstallStatus::Error).then(|| InstallErrors {
                errors: vec![
                    InstallErrorMessage {
                        message: format!("{version_id} failed validation"),
                    },
                    InstallErrorMessage {
                        message: "missing dependency".into(),
                    },
                ],
            }),
        }
    }
}

impl RegistryQuery for MockService {
    async fn query_versions(
        &self,
        query: &VersionQuery,
    ) -> Result<Vec<PackageVersionRecord>, PkgError> {
        self.registry_calls.set(self.registry_calls.get() + 1);
        let mut matches: Vec<PackageVersionRecord> = self
            .versions
            .iter()
            .filter(|v| v.package2_id == query.package_id && query.accepts(v))
            .cloned()
            .collect();
        matches.sort_by_key(|v| std::cmp::Reverse(v.version_tuple()));
        Ok(matches)
    }

    async fn list_versions(&self, package_id: &str) -> Result<Vec<PackageVersionRecord>, PkgError> {
        self.registry_calls.set(self.registry_calls.get() + 1);
        Ok(self
            .versions
            .iter()
            .filter(|v| v.package2_id == package_id)
            .cloned()
            .collect())
    }
}

impl InstallService for MockService {
    fn api_version(&self) -> u32 {
        self.api
    }

    async fn installed_versions(&self) -> Result<Vec<String>, PkgError> {
        Ok(self.installed.clone())
    }

    async fn subscriber_version(
        &self,
        version_id: &str,
        _installation_key: Option<&str>,
    ) -> Result<SubscriberVersionInfo, PkgError> {
        self.subscriber_calls.set(self.subscriber_calls.get() + 1);
        let status = self
            .publish_statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| NO_ERRORS_DETECTED.to_string());
        Ok(SubscriberVersionInfo {
            id: version_id.to_string(),
            install_validation_status: status,
            package_type: self.package_types.get(version_id).copied(),
            external_sites: self
                .external_sites
                .get(version_id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn submit_install(
        &self,
        request: &InstallRequest,
    ) -> Result<InstallRequestRecord, SubmitError> {
        let version_id = request.subscriber_package_version_key.clone();
        self.submitted.borrow_mut().push(request.clone());
        if let Some(err) = self.submit_errors.get(&version_id) {
            return Err(err.clone());
        }
        self.polls.borrow_mut().insert(version_id.clone(), 0);
        Ok(self.record_for(&version_id, self.scripted_status(&version_id, 0)))
    }

    async fn install_status(&self, request_id: &str) -> Result<InstallRequestRecord, PkgError> {
        let version_id = request_id.trim_start_matches("0Hf").to_string();
        let step = {
            let mut polls = self.polls.borrow_mut();
            let count = polls.entry(version_id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        Ok(self.record_for(&version_id, self.scripted_status(&version_id, step)))
    }
}

impl DeleteService for MockService {
    async fn delete_version(&self, version_record_id: &str) -> Result<SaveResult, PkgError> {
        // Yield so sibling deletes interleave.
        tokio::task::yield_now().await;
        if self.failing_deletes.contains(version_record_id) {
            return Err(PkgError::registry(format!(
                "delete of {version_record_id} rejected"
            )));
        }
        if self.rejected_deletes.contains(version_record_id) {
            return Ok(SaveResult {
                id: Some(version_record_id.to_string()),
                success: false,
                errors: vec!["version is a dependency".into(), "locked".into()],
            });
        }
        self.deleted.borrow_mut().push(version_record_id.to_string());
        Ok(SaveResult {
            id: Some(version_record_id.to_string()),
            success: true,
            errors: Vec::new(),
        })
    }
}

/// Prompter with a fixed answer that records every message.
pub struct ScriptedPrompter {
    pub answer: bool,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> Result<bool, PkgError> {
        self.asked.borrow_mut().push(message.to_string());
        Ok(self.answer)
    }
}
