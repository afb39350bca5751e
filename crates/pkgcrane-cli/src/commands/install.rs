use super::{format_error, load_orgs, print_json, runtime, EXIT_FAILURE};
use miette::Result;
use pkgcrane_core::pkg::{
    install_dependencies, load_project, pkg_codes, ApexCompile, InstallOptions, InstallReport,
    InstallType, Outcome, PendingPolicy, PkgError, Prompter, SecurityType, UpgradeType,
};
use pkgcrane_core::OrgRegistry;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;
use tracing::info;

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Org (alias or username) to install the dependencies into
    #[arg(long, short = 'n', value_name = "ORG")]
    pub target_org: String,

    /// Dev hub used to resolve dependencies declared with a version number
    #[arg(long, value_name = "ORG")]
    pub target_dev_hub: Option<String>,

    /// Branch used to resolve versioned dependencies
    #[arg(long, short = 'z')]
    pub branch: Option<String>,

    /// Which dependencies to install: All or Delta
    #[arg(long, short = 'i', default_value = "Delta")]
    pub install_type: InstallType,

    /// Installation key as id:key[,id:key...]; ids may be aliases
    #[arg(long = "installation-key", short = 'k', value_name = "ID:KEY")]
    pub installation_keys: Vec<String>,

    /// Never prompt; accept external sites and Delete upgrades
    #[arg(long, short = 'r')]
    pub no_prompt: bool,

    /// Minutes to wait for each version to become available
    #[arg(long, short = 'b', default_value_t = 0, value_name = "MINUTES")]
    pub publish_wait: u32,

    /// Who gets access to the package: AllUsers or AdminsOnly
    #[arg(long, short = 's', default_value = "AdminsOnly")]
    pub security_type: SecurityType,

    /// Install handlers to skip
    #[arg(long, short = 'l', hide = true, value_parser = ["FeatureEnforcement"])]
    pub skip_handlers: Vec<String>,

    /// Upgrade type: DeprecateOnly, Mixed or Delete
    #[arg(long, short = 't', default_value = "Mixed")]
    pub upgrade_type: UpgradeType,

    /// Apex compile scope: all or package
    #[arg(long, short = 'a')]
    pub apex_compile: Option<ApexCompile>,

    /// Minutes to wait for each install to finish
    #[arg(long, short = 'w', default_value_t = 0, value_name = "MINUTES")]
    pub wait: u32,

    /// Installs still running when the wait ends: continue or fail
    #[arg(long, default_value = "continue")]
    pub on_pending: PendingPolicy,
}

impl InstallArgs {
    fn options(&self) -> InstallOptions {
        InstallOptions {
            install_type: self.install_type,
            security_type: self.security_type,
            upgrade_type: self.upgrade_type,
            apex_compile: self.apex_compile,
            skip_handlers: self.skip_handlers.clone(),
            installation_keys: self.installation_keys.clone(),
            branch: self.branch.clone(),
            publish_wait: minutes(self.publish_wait),
            wait: minutes(self.wait),
            no_prompt: self.no_prompt,
            on_pending: self.on_pending,
        }
    }
}

fn minutes(n: u32) -> Duration {
    Duration::from_secs(u64::from(n) * 60)
}

#[derive(Serialize)]
struct InstallResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    install: Option<InstallReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Terminal confirmation prompt.
struct StdinPrompter;

impl Prompter for StdinPrompter {
    fn confirm(&self, message: &str) -> Result<bool, PkgError> {
        let read_error = |e: io::Error| {
            PkgError::new(
                pkg_codes::PKG_INSTALL_CANCELED,
                format!("Failed to read confirmation: {e}"),
            )
        };

        print!("{message} (y/n): ");
        io::stdout().flush().map_err(read_error)?;

        let mut input = String::new();
        let read = io::stdin().lock().read_line(&mut input).map_err(read_error)?;
        if read == 0 {
            return Ok(false);
        }

        Ok(matches!(
            input.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

pub fn run(cwd: &Path, args: InstallArgs, json: bool) -> Result<()> {
    let orgs = load_orgs()?;
    let runtime = runtime()?;
    let result = runtime.block_on(execute(cwd, &args, &orgs));

    match result {
        Ok(report) => {
            if json {
                print_json(&InstallResult {
                    ok: true,
                    install: Some(report),
                    error: None,
                });
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                print_json(&InstallResult {
                    ok: false,
                    install: None,
                    error: Some(format_error(&e)),
                });
                std::process::exit(EXIT_FAILURE);
            }
            Err(miette::miette!("{}", format_error(&e)))
        }
    }
}

async fn execute(
    cwd: &Path,
    args: &InstallArgs,
    orgs: &OrgRegistry,
) -> Result<InstallReport, PkgError> {
    let project = load_project(cwd)?;
    info!(root = %project.root.display(), "loaded project");

    let target = orgs.resolve(&args.target_org)?.client()?;
    let dev_hub = match &args.target_dev_hub {
        Some(name) => Some(orgs.resolve(name)?.client()?),
        None => None,
    };

    install_dependencies(
        &project,
        dev_hub.as_ref(),
        &target,
        &StdinPrompter,
        &args.options(),
    )
    .await
}

fn print_report(report: &InstallReport) {
    if let Some(message) = &report.message {
        println!("{message}");
        return;
    }

    for package in &report.packages {
        match package.outcome {
            Outcome::Installed => {
                println!("Successfully installed package [{}]", package.name);
            }
            Outcome::Skipped => {
                println!(
                    "Package {} ({}) is already installed and will be skipped",
                    package.name, package.version_id
                );
            }
            Outcome::Pending => {
                let request = package.request_id.as_deref().unwrap_or("<unknown>");
                println!(
                    "Installation of {} is still in progress (request {request}); check the request later or rerun with a longer --wait",
                    package.name
                );
            }
        }
    }

    let installed = report.with_outcome(Outcome::Installed).count();
    let pending = report.with_outcome(Outcome::Pending).count();
    let skipped = report.with_outcome(Outcome::Skipped).count();
    println!("\n{installed} installed, {pending} pending, {skipped} skipped");
}
