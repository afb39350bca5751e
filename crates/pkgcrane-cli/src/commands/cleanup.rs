use super::{format_error, load_orgs, print_json, runtime, EXIT_FAILURE};
use miette::Result;
use pkgcrane_core::pkg::{
    cleanup_versions, find_project_root, load_project, resolve_package_id, AliasTable,
    CleanupOutcome, PkgError, SemverMatcher,
};
use pkgcrane_core::OrgRegistry;
use serde::Serialize;
use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct CleanupArgs {
    /// Major.Minor.Patch of the unreleased versions to delete
    #[arg(long, short = 's')]
    pub matcher: String,

    /// Package id (0Ho...) or alias
    #[arg(long, short = 'p')]
    pub package: String,

    /// Dev hub that owns the package
    #[arg(long, short = 'n', value_name = "ORG")]
    pub target_dev_hub: String,
}

#[derive(Serialize)]
struct CleanupResult {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cleanup: Option<Vec<CleanupOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(cwd: &Path, args: CleanupArgs, json: bool) -> Result<()> {
    let orgs = load_orgs()?;
    let runtime = runtime()?;
    let result = runtime.block_on(execute(cwd, &args, &orgs));

    match result {
        Ok(outcomes) => {
            if json {
                print_json(&CleanupResult {
                    ok: true,
                    cleanup: Some(outcomes),
                    error: None,
                });
            } else {
                print_table(&outcomes);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                print_json(&CleanupResult {
                    ok: false,
                    cleanup: None,
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
    args: &CleanupArgs,
    orgs: &OrgRegistry,
) -> Result<Vec<CleanupOutcome>, PkgError> {
    // Fail on a bad matcher before anything else.
    SemverMatcher::parse(&args.matcher)?;

    // Aliases are optional here; outside a project only raw ids work.
    let aliases = match find_project_root(cwd) {
        Some(root) => load_project(&root)?.aliases,
        None => AliasTable::new(),
    };
    let package_id = resolve_package_id(&args.package, &aliases)?;

    let client = orgs.resolve(&args.target_dev_hub)?.client()?;
    cleanup_versions(&client, &client, &package_id, &args.matcher).await
}

fn print_table(outcomes: &[CleanupOutcome]) {
    const HEADERS: [&str; 3] = ["PACKAGE VERSION ID", "SUCCESS", "ERROR"];

    println!("=== Package Version Cleanup Results");
    if outcomes.is_empty() {
        println!("No matching unreleased package versions found");
        return;
    }

    let rows: Vec<[String; 3]> = outcomes
        .iter()
        .map(|o| {
            [
                o.version_id.clone(),
                o.success.to_string(),
                o.error.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 3]| {
        format!(
            "{:<w0$}  {:<w1$}  {}",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1]
        )
    };

    println!("{}", line(HEADERS).trim_end());
    println!(
        "{}",
        line(["-".repeat(widths[0]).as_str(), "-".repeat(widths[1]).as_str(), "-".repeat(widths[2]).as_str()])
    );
    for row in &rows {
        println!("{}", line([row[0].as_str(), row[1].as_str(), row[2].as_str()]).trim_end());
    }
}
