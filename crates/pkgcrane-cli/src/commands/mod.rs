pub mod cleanup;
pub mod install;
pub mod version;

use miette::Result;
use pkgcrane_core::pkg::PkgError;
use pkgcrane_core::OrgRegistry;
use serde::Serialize;

/// Exit code for command failures reported as JSON.
pub const EXIT_FAILURE: i32 = 2;

/// Print a JSON result to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}

/// Render an engine error the way both output modes expect.
pub fn format_error(e: &PkgError) -> String {
    format!("{}: {}", e.code(), e.message())
}

/// Load org connections, converting config errors to diagnostics.
pub fn load_orgs() -> Result<OrgRegistry> {
    OrgRegistry::load().map_err(|e| miette::miette!("{e}"))
}

/// Build a current-thread runtime for one command.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| miette::miette!("Failed to start runtime: {e}"))
}
