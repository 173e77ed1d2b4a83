//! Package manager error types.

use super::lockfile::LockfileError;
use std::fmt;
use std::io;

/// Package manager error codes.
pub mod codes {
    pub const PKG_INVALID_ARGUMENT: &str = "PKG_INVALID_ARGUMENT";
    pub const PKG_VERSION_INVALID: &str = "PKG_VERSION_INVALID";
    pub const PKG_IO_ERROR: &str = "PKG_IO_ERROR";

    // Project spec files
    pub const PKG_SPEC_NOT_FOUND: &str = "PKG_SPEC_NOT_FOUND";
    pub const PKG_SPEC_INVALID: &str = "PKG_SPEC_INVALID";
    pub const PKG_SPEC_WRITE_FAILED: &str = "PKG_SPEC_WRITE_FAILED";

    // Restore
    pub const PKG_PROJECT_REFERENCES_FAILED: &str = "PKG_PROJECT_REFERENCES_FAILED";
    pub const PKG_RESTORE_FAILED: &str = "PKG_RESTORE_FAILED";
    pub const PKG_COMMIT_FAILED: &str = "PKG_COMMIT_FAILED";
    pub const PKG_LOCK_FILE_ERROR: &str = "PKG_LOCK_FILE_ERROR";
}

/// Package manager error.
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

    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(name: &str, reason: &str) -> Self {
        Self::new(
            codes::PKG_INVALID_ARGUMENT,
            format!("Invalid argument '{name}': {reason}"),
        )
    }

    /// Create a version invalid error.
    #[must_use]
    pub fn version_invalid(version: &str, reason: &str) -> Self {
        Self::new(
            codes::PKG_VERSION_INVALID,
            format!("Invalid version '{version}': {reason}"),
        )
    }

    /// Create a project spec not found error.
    #[must_use]
    pub fn spec_not_found(path: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_SPEC_NOT_FOUND,
            format!("Project spec not found: {}", path.display()),
        )
    }

    /// Create a project spec invalid error.
    pub fn spec_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_INVALID, msg)
    }

    /// Create a project spec write failed error.
    pub fn spec_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_SPEC_WRITE_FAILED, msg)
    }

    /// Create a project reference closure error.
    pub fn project_references_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_PROJECT_REFERENCES_FAILED, msg)
    }

    /// Create a restore failed error.
    pub fn restore_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_RESTORE_FAILED, msg)
    }

    /// Create a commit failed error.
    pub fn commit_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_COMMIT_FAILED, msg)
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

impl From<LockfileError> for PkgError {
    fn from(e: LockfileError) -> Self {
        Self::new(codes::PKG_LOCK_FILE_ERROR, e.to_string())
    }
}
