use std::path::PathBuf;

/// Environment variable overriding the org connections file.
pub const ORGS_FILE_ENV: &str = "PKGCRANE_ORGS_FILE";

/// File name of the org connections file.
pub const ORGS_FILE_NAME: &str = "orgs.json";

/// Get the config directory for pkgcrane.
///
/// - Linux: `$XDG_CONFIG_HOME/pkgcrane` or `~/.config/pkgcrane`
/// - macOS: `~/Library/Application Support/pkgcrane`
/// - Windows: `%APPDATA%\pkgcrane`
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs_next::config_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".pkgcrane"),
                |p| p.join(".config").join("pkgcrane"),
            )
        },
        |p| p.join("pkgcrane"),
    )
}

/// Path of the org connections file, honouring `PKGCRANE_ORGS_FILE`.
#[must_use]
pub fn orgs_file_path() -> PathBuf {
    match std::env::var_os(ORGS_FILE_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_dir().join(ORGS_FILE_NAME),
    }
}
