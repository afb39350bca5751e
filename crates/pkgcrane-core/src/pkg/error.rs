//! Package engine error types.

use std::fmt;

/// Package engine error codes.
pub mod codes {
    pub const PKG_INVALID_SPECIFIER: &str = "PKG_INVALID_SPECIFIER";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_NO_VERSION_ID: &str = "PKG_NO_VERSION_ID";
    pub const PKG_KEY_FORMAT: &str = "PKG_KEY_FORMAT";
    pub const PKG_MATCHER_FORMAT: &str = "PKG_MATCHER_FORMAT";
    pub const PKG_INSTALL_CANCELED: &str = "PKG_INSTALL_CANCELED";
    pub const PKG_INSTALL_FAILED: &str = "PKG_INSTALL_FAILED";
    pub const PKG_INSTALL_TIMEOUT: &str = "PKG_INSTALL_TIMEOUT";
    pub const PKG_PUBLISH_TIMEOUT: &str = "PKG_PUBLISH_TIMEOUT";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_API_VERSION_TOO_LOW: &str = "PKG_API_VERSION_TOO_LOW";
    pub const PKG_DEV_HUB_MISSING: &str = "PKG_DEV_HUB_MISSING";
    pub const PKG_INVALID_OPTION: &str = "PKG_INVALID_OPTION";

    // Project file / org config
    pub const PKG_PROJECT_NOT_FOUND: &str = "PKG_PROJECT_NOT_FOUND";
    pub const PKG_PROJECT_INVALID: &str = "PKG_PROJECT_INVALID";
    pub const PKG_ORG_NOT_FOUND: &str = "PKG_ORG_NOT_FOUND";
}

/// Package engine error.
#[derive(Debug, Clone)]
pub struct PkgError {
    code: &'static str,
    message: String,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create an invalid specifier error.
    pub fn invalid_specifier(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_INVALID_SPECIFIER, msg)
    }

    /// Create an error for an unrecognised option value.
    pub fn invalid_option(option: &str, value: &str) -> Self {
        Self::new(
            codes::PKG_INVALID_OPTION,
            format!("Invalid {option} '{value}'"),
        )
    }

    /// Create a version not found error.
    #[must_use]
    pub fn version_not_found(package_id: &str, pattern: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_NOT_FOUND,
            format!("Unable to find a version of {package_id} matching {pattern}"),
        )
    }

    /// Create a missing version identifier error.
    #[must_use]
    pub fn no_version_id(reference: &str) -> Self {
        Self::new(
            codes::PKG_NO_VERSION_ID,
            format!("Dependency '{reference}' does not resolve to a package version id (04t...)"),
        )
    }

    /// Create an installation key format error.
    #[must_use]
    pub fn key_format(input: &str) -> Self {
        Self::new(
            codes::PKG_KEY_FORMAT,
            format!("Installation key '{input}' must be formatted as id:key[,id:key...]"),
        )
    }

    /// Create a matcher format error.
    #[must_use]
    pub fn matcher_format(input: &str) -> Self {
        Self::new(
            codes::PKG_MATCHER_FORMAT,
            format!("Matcher '{input}' must be formatted as Major.Minor.Patch"),
        )
    }

    /// Create an install canceled error.
    #[must_use]
    pub fn install_canceled() -> Self {
        Self::new(codes::PKG_INSTALL_CANCELED, "Package installation canceled")
    }

    /// Create an install failed error carrying the aggregated service errors.
    pub fn install_failed(details: impl Into<String>) -> Self {
        Self::new(
            codes::PKG_INSTALL_FAILED,
            format!("Encountered errors installing the package! {}", details.into()),
        )
    }

    /// Create an install timeout error.
    #[must_use]
    pub fn install_timeout(request_id: &str, status: &str) -> Self {
        Self::new(
            codes::PKG_INSTALL_TIMEOUT,
            format!("Install request {request_id} still {status} after the wait budget"),
        )
    }

    /// Create a publish timeout error.
    #[must_use]
    pub fn publish_timeout(version_id: &str) -> Self {
        Self::new(
            codes::PKG_PUBLISH_TIMEOUT,
            format!("Package version {version_id} was not available for installation in time"),
        )
    }

    /// Create a registry/transport error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Create an API version too low error.
    #[must_use]
    pub fn api_version_too_low(actual: u32, minimum: u32) -> Self {
        Self::new(
            codes::PKG_API_VERSION_TOO_LOW,
            format!("API version {actual} is not supported, {minimum}.0 or later is required"),
        )
    }

    /// Create a missing dev hub error.
    #[must_use]
    pub fn dev_hub_missing() -> Self {
        Self::new(
            codes::PKG_DEV_HUB_MISSING,
            "Dependencies with a version number must be resolved by a dev hub; pass --target-dev-hub",
        )
    }

    /// Create a project file not found error.
    #[must_use]
    pub fn project_not_found(start: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_PROJECT_NOT_FOUND,
            format!("No project file found from {}", start.display()),
        )
    }

    /// Create a project file invalid error.
    pub fn project_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_PROJECT_INVALID, msg)
    }

    /// Create an org not found error.
    #[must_use]
    pub fn org_not_found(name: &str) -> Self {
        Self::new(
            codes::PKG_ORG_NOT_FOUND,
            format!("No connection configured for org '{name}'"),
        )
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::registry(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::registry(format!("Connection failed: {e}"))
        } else {
            Self::registry(e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::registry(format!("Invalid JSON: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        let err = PkgError::matcher_format("1.2");
        assert_eq!(err.code(), codes::PKG_MATCHER_FORMAT);
        assert!(err.to_string().starts_with("PKG_MATCHER_FORMAT: "));
        assert!(err.message().contains("1.2"));
    }

    #[test]
    fn test_install_failed_keeps_details() {
        let err = PkgError::install_failed("Installation errors: \n1) boom");
        assert_eq!(err.code(), codes::PKG_INSTALL_FAILED);
        assert!(err.message().ends_with("Installation errors: \n1) boom"));
    }

    #[test]
    fn test_error_codes_uppercase() {
        let all_codes = [
            codes::PKG_INVALID_SPECIFIER,
            codes::PKG_INVALID_OPTION,
            codes::PKG_VERSION_NOT_FOUND,
            codes::PKG_NO_VERSION_ID,
            codes::PKG_KEY_FORMAT,
            codes::PKG_MATCHER_FORMAT,
            codes::PKG_INSTALL_CANCELED,
            codes::PKG_INSTALL_FAILED,
            codes::PKG_INSTALL_TIMEOUT,
            codes::PKG_PUBLISH_TIMEOUT,
            codes::PKG_REGISTRY_ERROR,
            codes::PKG_API_VERSION_TOO_LOW,
            codes::PKG_DEV_HUB_MISSING,
            codes::PKG_PROJECT_NOT_FOUND,
            codes::PKG_PROJECT_INVALID,
            codes::PKG_ORG_NOT_FOUND,
        ];

        for code in all_codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Error code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
