//! Integration tests for `pkgcrane install`.
//!
//! These tests run against a mock tooling API to avoid network calls.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::process::Command;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Global port counter for unique mock server ports.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(19800);

/// Version the mock reports as installed in the target.
const INSTALLED: &str = "04tINSTALLED";

/// Version whose install never leaves IN_PROGRESS.
const SLOW: &str = "04tSLOW";

/// Version whose install fails.
const BROKEN: &str = "04tBROKEN";

/// Version whose install request is created but can never be read back.
const STALLED: &str = "04tSTALLED";

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "pkgcrane-cli", "--bin", "pkgcrane", "--"]);
    cmd
}

#[derive(Clone, Default)]
struct MockState {
    installs: Arc<Mutex<Vec<Value>>>,
}

async fn handle_query(Query(params): Query<HashMap<String, String>>) -> Response {
    let soql = params.get("q").cloned().unwrap_or_default();

    let records = if soql.contains("FROM InstalledSubscriberPackage") {
        vec![json!({ "Id": "0A3INSTALLED", "SubscriberPackageVersion": { "Id": INSTALLED } })]
    } else if soql.contains("FROM SubscriberPackageVersion") {
        vec![json!({
            "Id": "04tANY",
            "InstallValidationStatus": "NO_ERRORS_DETECTED",
            "Package2ContainerOptions": "Managed",
            "RemoteSiteSettings": { "settings": [] },
            "CspTrustedSites": { "settings": [] }
        })]
    } else if soql.contains("FROM Package2Version") && soql.contains("'0HoCORE'") {
        vec![json!({
            "Id": "05iCORE3",
            "Package2Id": "0HoCORE",
            "SubscriberPackageVersionId": "04tCORE3",
            "MajorVersion": 1,
            "MinorVersion": 4,
            "PatchVersion": 0,
            "BuildNumber": 3,
            "IsReleased": true,
            "IsDeprecated": false,
            "Branch": null
        })]
    } else {
        Vec::new()
    };

    Json(json!({ "totalSize": records.len(), "done": true, "records": records })).into_response()
}

async fn handle_submit(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    let version = body["SubscriberPackageVersionKey"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.installs.lock().unwrap().push(body);
    (
        StatusCode::CREATED,
        Json(json!({ "id": format!("0Hf{version}"), "success": true, "errors": [] })),
    )
        .into_response()
}

async fn handle_status(Path(id): Path<String>) -> Response {
    let version = id.trim_start_matches("0Hf");
    if version == STALLED {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let (status, errors) = match version {
        SLOW => ("IN_PROGRESS", None),
        BROKEN => (
            "ERROR",
            Some(json!({ "errors": [{ "message": "Missing dependency: core" }] })),
        ),
        _ => ("SUCCESS", None),
    };
    Json(json!({
        "Id": id,
        "Status": status,
        "SubscriberPackageVersionKey": version,
        "Errors": errors
    }))
    .into_response()
}

/// Start the mock tooling API in a background thread.
/// Returns the base URL and the shared request log.
fn start_mock_service() -> (String, MockState) {
    let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let base_url = format!("http://127.0.0.1:{port}");
    let state = MockState::default();
    let server_state = state.clone();

    thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let app = Router::new()
                .route("/services/data/v59.0/tooling/query/", get(handle_query))
                .route(
                    "/services/data/v59.0/tooling/sobjects/PackageInstallRequest/",
                    post(handle_submit),
                )
                .route(
                    "/services/data/v59.0/tooling/sobjects/PackageInstallRequest/:id",
                    get(handle_status),
                )
                .with_state(server_state);
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    // Give the server time to start
    thread::sleep(Duration::from_millis(100));

    (base_url, state)
}

/// Project declaring `dependencies` (a JSON array) plus an orgs file with
/// `target` and `devhub` connections to `base_url`.
fn setup(base_url: &str, dependencies: Value) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("sfdx-project.json"),
        json!({
            "packageDirectories": [{ "path": "force-app", "dependencies": dependencies }],
            "packageAliases": { "core": "0HoCORE", "new@1.0.0-1": "04tNEW" }
        })
        .to_string(),
    )
    .unwrap();
    let org = json!({ "instanceUrl": base_url, "accessToken": "test-token", "apiVersion": "59.0" });
    std::fs::write(
        dir.path().join("orgs.json"),
        json!({ "target": org, "devhub": org }).to_string(),
    )
    .unwrap();
    dir
}

fn install_cmd(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin();
    cmd.env("PKGCRANE_ORGS_FILE", dir.path().join("orgs.json"))
        .env_remove("PKGCRANE_INSTANCE_URL")
        .env_remove("PKGCRANE_ACCESS_TOKEN")
        .arg("--cwd")
        .arg(dir.path());
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"))
}

fn error_of(json: &Value) -> &str {
    json["error"].as_str().unwrap_or_default()
}

#[test]
fn test_install_help_shows_options() {
    let output = cargo_bin()
        .args(["install", "--help"])
        .output()
        .expect("Failed to run pkgcrane install --help");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--target-org",
        "--target-dev-hub",
        "--installation-key",
        "--install-type",
        "--publish-wait",
        "--upgrade-type",
        "--on-pending",
    ] {
        assert!(stdout.contains(flag), "Help should show {flag}: {stdout}");
    }
    assert!(
        !stdout.contains("--skip-handlers"),
        "--skip-handlers is hidden"
    );
}

#[test]
fn test_install_delta_skips_installed() {
    let (base_url, state) = start_mock_service();
    let dir = setup(
        &base_url,
        json!([{ "package": INSTALLED }, { "package": "new@1.0.0-1" }]),
    );

    let output = install_cmd(&dir)
        .args(["--json", "install", "--target-org", "target"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true, "unexpected output: {json}");

    let packages = json["install"]["packages"].as_array().unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(packages[0]["versionId"], INSTALLED);
    assert_eq!(packages[0]["outcome"], "skipped");
    assert_eq!(packages[1]["name"], "new@1.0.0-1");
    assert_eq!(packages[1]["outcome"], "installed");
    assert_eq!(packages[1]["requestId"], "0Hf04tNEW");

    let installs = state.installs.lock().unwrap();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0]["SubscriberPackageVersionKey"], "04tNEW");
    assert_eq!(installs[0]["SecurityType"], "none");
    assert_eq!(installs[0]["UpgradeType"], "mixed-mode");
}

#[test]
fn test_install_all_with_options() {
    let (base_url, state) = start_mock_service();
    let dir = setup(&base_url, json!([{ "package": INSTALLED }]));

    let output = install_cmd(&dir)
        .args([
            "--json", "install", "-n", "target", "-i", "All", "-s", "AllUsers", "-t",
            "DeprecateOnly", "-a", "package", "-k", "04tINSTALLED:secret",
        ])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true, "unexpected output: {json}");

    let installs = state.installs.lock().unwrap();
    assert_eq!(installs.len(), 1);
    assert_eq!(installs[0]["Password"], "secret");
    assert_eq!(installs[0]["SecurityType"], "full");
    assert_eq!(installs[0]["UpgradeType"], "deprecate-only");
    assert_eq!(installs[0]["ApexCompileType"], "package");
}

#[test]
fn test_install_resolves_versioned_dependency_through_dev_hub() {
    let (base_url, state) = start_mock_service();
    let dir = setup(
        &base_url,
        json!([{ "package": "core", "versionNumber": "1.4.LATEST" }]),
    );

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target", "--target-dev-hub", "devhub"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true, "unexpected output: {json}");
    assert_eq!(json["install"]["packages"][0]["name"], "core@1.4.LATEST");
    assert_eq!(json["install"]["packages"][0]["versionId"], "04tCORE3");
    assert_eq!(state.installs.lock().unwrap().len(), 1);
}

#[test]
fn test_install_versioned_dependency_needs_dev_hub() {
    let (base_url, state) = start_mock_service();
    let dir = setup(
        &base_url,
        json!([{ "package": "core", "versionNumber": "1.4.LATEST" }]),
    );

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target"])
        .output()
        .expect("Failed to run pkgcrane install");

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert!(error_of(&json).starts_with("PKG_DEV_HUB_MISSING"));
    assert!(state.installs.lock().unwrap().is_empty());
}

#[test]
fn test_install_rejects_malformed_key() {
    let (base_url, state) = start_mock_service();
    let dir = setup(&base_url, json!([{ "package": "new@1.0.0-1" }]));

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target", "-k", "04t1:abcd,badformat"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert!(error_of(&json).starts_with("PKG_KEY_FORMAT"));
    assert!(state.installs.lock().unwrap().is_empty());
}

#[test]
fn test_install_pending_policies() {
    let (base_url, state) = start_mock_service();
    let dir = setup(
        &base_url,
        json!([{ "package": SLOW }, { "package": "new@1.0.0-1" }]),
    );

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target", "--on-pending", "continue"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true, "unexpected output: {json}");
    let packages = json["install"]["packages"].as_array().unwrap();
    assert_eq!(packages[0]["outcome"], "pending");
    assert_eq!(packages[0]["status"], "IN_PROGRESS");
    assert_eq!(packages[1]["outcome"], "installed");
    assert_eq!(state.installs.lock().unwrap().len(), 2);

    // Nothing waited, so nothing timed out: fail still reports pending.
    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target", "--on-pending", "fail"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true, "unexpected output: {json}");
    let packages = json["install"]["packages"].as_array().unwrap();
    assert_eq!(packages[0]["outcome"], "pending");
    assert_eq!(packages[1]["outcome"], "installed");
    assert_eq!(state.installs.lock().unwrap().len(), 4);

    // A request that cannot be read back counts as timed out.
    let dir = setup(
        &base_url,
        json!([{ "package": STALLED }, { "package": "new@1.0.0-1" }]),
    );
    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target", "--on-pending", "fail", "--wait", "1"])
        .output()
        .expect("Failed to run pkgcrane install");

    assert!(!output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    let error = error_of(&json);
    assert!(error.starts_with("PKG_INSTALL_TIMEOUT"), "error: {error}");
    assert!(error.contains("0Hf04tSTALLED"));
    // The second package is never submitted after the failure.
    assert_eq!(state.installs.lock().unwrap().len(), 5);
}

#[test]
fn test_install_failure_lists_errors() {
    let (base_url, _state) = start_mock_service();
    let dir = setup(&base_url, json!([{ "package": BROKEN }]));

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    let error = error_of(&json);
    assert!(error.starts_with("PKG_INSTALL_FAILED"), "error: {error}");
    assert!(error.contains("Installation errors: \n1) Missing dependency: core"));
}

#[test]
fn test_install_without_packages() {
    let (base_url, _state) = start_mock_service();
    let dir = setup(&base_url, json!([]));

    let output = install_cmd(&dir)
        .args(["install", "-n", "target"])
        .output()
        .expect("Failed to run pkgcrane install");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No packages were found to install"));
}

#[test]
fn test_install_outside_project() {
    let dir = TempDir::new().unwrap();

    let output = install_cmd(&dir)
        .args(["--json", "install", "-n", "target"])
        .output()
        .expect("Failed to run pkgcrane install");

    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert!(error_of(&json).starts_with("PKG_PROJECT_NOT_FOUND"));
}
