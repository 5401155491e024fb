//! Package fetch error types.

use std::fmt;
use std::io;

/// Package fetch error codes.
pub mod codes {
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_NOT_FOUND: &str = "PKG_NOT_FOUND";
    pub const PKG_VERSION_NOT_FOUND: &str = "PKG_VERSION_NOT_FOUND";
    pub const PKG_REGISTRY_ERROR: &str = "PKG_REGISTRY_ERROR";
    pub const PKG_METADATA_INVALID: &str = "PKG_METADATA_INVALID";
    pub const PKG_DOWNLOAD_FAILED: &str = "PKG_DOWNLOAD_FAILED";
    pub const PKG_EXTRACT_FAILED: &str = "PKG_EXTRACT_FAILED";
    pub const PKG_IO_ERROR: &str = "PKG_IO_ERROR";
    pub const PKG_CONFIG_INVALID: &str = "PKG_CONFIG_INVALID";
}

/// Package fetch error.
#[derive(Debug)]
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

    /// Create a spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a package not found error.
    #[must_use]
    pub fn not_found(name: &str) -> Self {
        Self::new(codes::PKG_NOT_FOUND, format!("Package not found: {name}"))
    }

    /// Create a version not found error.
    pub fn version_not_found(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_VERSION_NOT_FOUND, msg)
    }

    /// Create a registry error.
    pub fn registry(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_REGISTRY_ERROR, msg)
    }

    /// Create a metadata invalid error.
    pub fn metadata_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_METADATA_INVALID, msg)
    }

    /// Create a download failed error.
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_DOWNLOAD_FAILED, msg)
    }

    /// Create an extraction failed error.
    pub fn extract_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_EXTRACT_FAILED, msg)
    }

    /// Create a filesystem error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_IO_ERROR, msg)
    }

    /// Create a configuration error.
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CONFIG_INVALID, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_IO_ERROR, e.to_string())
    }
}

impl From<reqwest::Error> for PkgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Request timed out: {e}"))
        } else if e.is_connect() {
            Self::new(codes::PKG_REGISTRY_ERROR, format!("Connection failed: {e}"))
        } else {
            Self::new(codes::PKG_REGISTRY_ERROR, e.to_string())
        }
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_METADATA_INVALID, format!("Invalid JSON: {e}"))
    }
}

impl From<crate::error::ConfigError> for PkgError {
    fn from(e: crate::error::ConfigError) -> Self {
        Self::new(codes::PKG_CONFIG_INVALID, e.to_string())
    }
}
