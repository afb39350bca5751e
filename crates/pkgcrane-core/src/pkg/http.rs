//! Tooling API client.
//!
//! Implements [`RegistryQuery`], [`InstallService`] and [`DeleteService`]
//! over the service's REST tooling endpoints with a bearer token.

use super::error::PkgError;
use super::service::{
    DeleteService, InstallRequest, InstallRequestRecord, InstallService, InstallStatus,
    PackageType, PackageVersionRecord, RegistryQuery, SaveResult, SubmitError,
    SubscriberVersionInfo, VersionQuery,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const VERSION_FIELDS: &str = "Id, Package2Id, SubscriberPackageVersionId, MajorVersion, \
     MinorVersion, PatchVersion, BuildNumber, IsReleased, IsDeprecated, Branch";

/// Client for one org connection.
#[derive(Debug, Clone)]
pub struct ToolingClient {
    instance_url: Url,
    access_token: String,
    api_version: u32,
    http: Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage<T> {
    #[serde(default = "Vec::new")]
    records: Vec<T>,
    #[serde(default)]
    next_records_url: Option<String>,
}

#[derive(Deserialize)]
struct CreateResult {
    id: String,
}

/// Update body for a soft delete; deleted versions are deprecated in place.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeprecateVersion {
    is_deprecated: bool,
}

#[derive(Deserialize)]
struct ServiceError {
    message: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstalledPackageRow {
    subscriber_package_version: Option<IdRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct IdRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SubscriberVersionRow {
    id: String,
    #[serde(default)]
    install_validation_status: Option<String>,
    #[serde(default)]
    package2_container_options: Option<PackageType>,
    #[serde(default)]
    remote_site_settings: Option<SiteSettings>,
    #[serde(default)]
    csp_trusted_sites: Option<SiteSettings>,
}

#[derive(Deserialize, Default)]
struct SiteSettings {
    #[serde(default)]
    settings: Vec<SiteSetting>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SiteSetting {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    endpoint_url: Option<String>,
}

impl ToolingClient {
    /// Create a client for an instance.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be created.
    pub fn new(instance_url: &str, access_token: &str, api_version: u32) -> Result<Self, PkgError> {
        let mut instance_url = Url::parse(instance_url).map_err(|e| {
            PkgError::registry(format!("Invalid instance URL '{instance_url}': {e}"))
        })?;
        if !instance_url.path().ends_with('/') {
            let path = format!("{}/", instance_url.path());
            instance_url.set_path(&path);
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("pkgcrane/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PkgError::registry(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            instance_url,
            access_token: access_token.to_string(),
            api_version,
            http,
        })
    }

    #[must_use]
    pub fn instance_url(&self) -> &Url {
        &self.instance_url
    }

    /// URL of a tooling resource, e.g. `sobjects/PackageInstallRequest/`.
    ///
    /// # Errors
    /// Returns an error if the path cannot be joined onto the instance URL.
    pub fn tooling_url(&self, path: &str) -> Result<Url, PkgError> {
        let full = format!("services/data/v{}.0/tooling/{path}", self.api_version);
        self.instance_url
            .join(&full)
            .map_err(|e| PkgError::registry(format!("Failed to build URL for '{path}': {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    /// Run a tooling query, following `nextRecordsUrl` until exhausted.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status, or an
    /// unparseable body.
    pub async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<Vec<T>, PkgError> {
        debug!(%soql, "tooling query");
        let mut url = self.tooling_url("query/")?;
        url.query_pairs_mut().append_pair("q", soql);

        let mut records = Vec::new();
        loop {
            let response = self.request(Method::GET, url).send().await?;
            let page: QueryPage<T> = check(response).await?.json().await?;
            records.extend(page.records);

            let Some(next) = page.next_records_url else {
                break;
            };
            url = self.instance_url.join(&next).map_err(|e| {
                PkgError::registry(format!("Invalid nextRecordsUrl '{next}': {e}"))
            })?;
        }

        Ok(records)
    }

    async fn fetch_install_request(&self, request_id: &str) -> Result<InstallRequestRecord, PkgError> {
        let url = self.tooling_url(&format!("sobjects/PackageInstallRequest/{request_id}"))?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Quote a string for a SOQL literal.
#[must_use]
pub fn soql_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// SOQL for a version resolution query, newest first.
#[must_use]
pub fn version_query_soql(query: &VersionQuery) -> String {
    let mut soql = format!(
        "SELECT {VERSION_FIELDS} FROM Package2Version WHERE Package2Id = {} AND MajorVersion = {}",
        soql_literal(&query.package_id),
        query.major
    );
    for (field, value) in [
        ("MinorVersion", query.minor),
        ("PatchVersion", query.patch),
        ("BuildNumber", query.build),
    ] {
        if let Some(value) = value {
            soql.push_str(&format!(" AND {field} = {value}"));
        }
    }
    if !query.include_deprecated {
        soql.push_str(" AND IsDeprecated = false");
    }
    match &query.branch {
        Some(branch) => soql.push_str(&format!(" AND Branch = {}", soql_literal(branch))),
        None => soql.push_str(" AND Branch = NULL"),
    }
    soql.push_str(" ORDER BY MajorVersion DESC, MinorVersion DESC, PatchVersion DESC, BuildNumber DESC");
    soql
}

/// SOQL listing every version of a package, oldest first.
#[must_use]
pub fn list_versions_soql(package_id: &str) -> String {
    format!(
        "SELECT {VERSION_FIELDS} FROM Package2Version WHERE Package2Id = {} \
         ORDER BY MajorVersion, MinorVersion, PatchVersion, BuildNumber",
        soql_literal(package_id)
    )
}

fn subscriber_version_soql(version_id: &str, installation_key: Option<&str>) -> String {
    let mut soql = format!(
        "SELECT Id, InstallValidationStatus, Package2ContainerOptions, RemoteSiteSettings, \
         CspTrustedSites FROM SubscriberPackageVersion WHERE Id = {}",
        soql_literal(version_id)
    );
    if let Some(key) = installation_key {
        soql.push_str(&format!(" AND InstallationKey = {}", soql_literal(key)));
    }
    soql
}

/// Format service error bodies (`[{message, errorCode}]`).
fn error_messages(body: &str) -> Vec<String> {
    serde_json::from_str::<Vec<ServiceError>>(body)
        .map(|errors| {
            errors
                .into_iter()
                .map(|e| match e.error_code {
                    Some(code) => format!("{code}: {}", e.message),
                    None => e.message,
                })
                .collect()
        })
        .unwrap_or_default()
}

async fn check(response: Response) -> Result<Response, PkgError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let messages = error_messages(&body);
    let detail = if messages.is_empty() {
        body
    } else {
        messages.join("; ")
    };
    Err(PkgError::registry(format!(
        "Service returned status {status} for {}: {detail}",
        url.path()
    )))
}

impl RegistryQuery for ToolingClient {
    async fn query_versions(
        &self,
        query: &VersionQuery,
    ) -> Result<Vec<PackageVersionRecord>, PkgError> {
        self.query(&version_query_soql(query)).await
    }

    async fn list_versions(&self, package_id: &str) -> Result<Vec<PackageVersionRecord>, PkgError> {
        self.query(&list_versions_soql(package_id)).await
    }
}

impl InstallService for ToolingClient {
    fn api_version(&self) -> u32 {
        self.api_version
    }

    async fn installed_versions(&self) -> Result<Vec<String>, PkgError> {
        let rows: Vec<InstalledPackageRow> = self
            .query("SELECT Id, SubscriberPackageVersion.Id FROM InstalledSubscriberPackage")
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.subscriber_package_version.map(|v| v.id))
            .collect())
    }

    async fn subscriber_version(
        &self,
        version_id: &str,
        installation_key: Option<&str>,
    ) -> Result<SubscriberVersionInfo, PkgError> {
        let rows: Vec<SubscriberVersionRow> = self
            .query(&subscriber_version_soql(version_id, installation_key))
            .await?;
        let row = rows.into_iter().next().ok_or_else(|| {
            PkgError::registry(format!(
                "Package version {version_id} was not found or the installation key is wrong"
            ))
        })?;

        let remote = row.remote_site_settings.unwrap_or_default().settings;
        let csp = row.csp_trusted_sites.unwrap_or_default().settings;
        let external_sites = remote
            .into_iter()
            .filter_map(|s| s.url)
            .chain(csp.into_iter().filter_map(|s| s.endpoint_url))
            .collect();

        Ok(SubscriberVersionInfo {
            id: row.id,
            install_validation_status: row.install_validation_status.unwrap_or_default(),
            package_type: row.package2_container_options,
            external_sites,
        })
    }

    async fn submit_install(
        &self,
        request: &InstallRequest,
    ) -> Result<InstallRequestRecord, SubmitError> {
        let url = self.tooling_url("sobjects/PackageInstallRequest/")?;
        let response = self
            .request(Method::POST, url)
            .json(request)
            .send()
            .await
            .map_err(PkgError::from)?;
        let created: CreateResult = check(response)
            .await?
            .json()
            .await
            .map_err(PkgError::from)?;
        debug!(request = %created.id, "install request created");

        // The request exists from here on; a failed read reports it as it stands.
        self.fetch_install_request(&created.id)
            .await
            .map_err(|e| SubmitError::Partial {
                record: InstallRequestRecord {
                    id: created.id.clone(),
                    status: InstallStatus::Unknown,
                    subscriber_package_version_key: Some(
                        request.subscriber_package_version_key.clone(),
                    ),
                    errors: None,
                },
                message: e.to_string(),
            })
    }

    async fn install_status(&self, request_id: &str) -> Result<InstallRequestRecord, PkgError> {
        self.fetch_install_request(request_id).await
    }
}

impl DeleteService for ToolingClient {
    async fn delete_version(&self, version_record_id: &str) -> Result<SaveResult, PkgError> {
        let url = self.tooling_url(&format!("sobjects/Package2Version/{version_record_id}"))?;
        debug!(version = %version_record_id, "deprecating package version");
        let response = self
            .request(Method::PATCH, url)
            .json(&DeprecateVersion {
                is_deprecated: true,
            })
            .send()
            .await?;
        let status = response.status();

        if status.is_success() {
            return Ok(SaveResult {
                id: Some(version_record_id.to_string()),
                success: true,
                errors: Vec::new(),
            });
        }

        if status == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            let errors = error_messages(&body);
            if !errors.is_empty() {
                return Ok(SaveResult {
                    id: Some(version_record_id.to_string()),
                    success: false,
                    errors,
                });
            }
            return Err(PkgError::registry(format!(
                "Service returned status {status} deleting {version_record_id}: {body}"
            )));
        }

        check(response).await.map(|_| SaveResult::default())
    }
}
