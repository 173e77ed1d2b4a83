//! Lock file types.
//!
//! The lock file is the persisted snapshot of a project's fully resolved
//! dependency closure, one list of libraries per target framework.
//!
//! ## Schema Version
//!
//! - Schema version 1: Initial lock file format
//!
//! ## File Format
//!
//! The lock file is a JSON file named `lockstep.lock.json`, written next to
//! the project spec:
//!
//! ```json
//! {
//!   "version": 1,
//!   "targets": [
//!     {
//!       "framework": "net8.0",
//!       "libraries": [
//!         { "name": "Y", "version": "1.0.0", "dependencies": [{ "id": "X", "range": "[1.0.0, )" }] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use super::identity::{PackageDependency, PackageDependencyInfo, PackageIdentity, PackageVersion};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Schema version for the lock file format.
pub const LOCK_FILE_SCHEMA_VERSION: u32 = 1;

/// Lock file filename.
pub const LOCK_FILE_NAME: &str = "lockstep.lock.json";

/// Lock file error codes.
pub mod codes {
    /// Lock file not found at the expected path.
    pub const PKG_LOCK_NOT_FOUND: &str = "PKG_LOCK_NOT_FOUND";
    /// Lock file has invalid JSON.
    pub const PKG_LOCK_INVALID_JSON: &str = "PKG_LOCK_INVALID_JSON";
    /// Lock file schema version mismatch.
    pub const PKG_LOCK_VERSION_MISMATCH: &str = "PKG_LOCK_VERSION_MISMATCH";
    /// Lock file write failed.
    pub const PKG_LOCK_WRITE_FAILED: &str = "PKG_LOCK_WRITE_FAILED";
}

/// Get the lock file path for a project spec file.
///
/// The lock file is always a sibling of the spec.
#[must_use]
pub fn lock_file_path(spec_path: &Path) -> PathBuf {
    spec_path
        .parent()
        .unwrap_or(Path::new("."))
        .join(LOCK_FILE_NAME)
}

/// One resolved library within a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFileLibrary {
    /// Package id.
    pub name: String,
    /// Resolved version.
    pub version: PackageVersion,
    /// Declared dependencies, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageDependency>,
}

impl LockFileLibrary {
    /// Create a library with no dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency edge.
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>, range: impl Into<String>) -> Self {
        self.dependencies.push(PackageDependency::new(id, range));
        self
    }

    /// The identity of this library.
    #[must_use]
    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.name.clone(), self.version.clone())
    }

    /// This library as a graph node.
    #[must_use]
    pub fn to_dependency_info(&self) -> PackageDependencyInfo {
        PackageDependencyInfo::new(self.identity(), self.dependencies.clone())
    }
}

/// The libraries resolved for one target framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFileTarget {
    /// Target framework moniker.
    pub framework: String,
    /// Resolved libraries.
    #[serde(default)]
    pub libraries: Vec<LockFileLibrary>,
}

impl LockFileTarget {
    /// Create an empty target.
    #[must_use]
    pub fn new(framework: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            libraries: Vec::new(),
        }
    }

    /// Add a library.
    #[must_use]
    pub fn with_library(mut self, library: LockFileLibrary) -> Self {
        self.libraries.push(library);
        self
    }
}

/// The complete lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockFile {
    /// Schema version for the lock file format.
    pub version: u32,
    /// Targets in declaration order.
    #[serde(default)]
    pub targets: Vec<LockFileTarget>,
}

impl Default for LockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LockFile {
    /// Create an empty lock file.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: LOCK_FILE_SCHEMA_VERSION,
            targets: Vec::new(),
        }
    }

    /// Add a target.
    #[must_use]
    pub fn with_target(mut self, target: LockFileTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Find a target by framework name.
    #[must_use]
    pub fn target(&self, framework: &str) -> Option<&LockFileTarget> {
        self.targets.iter().find(|t| t.framework == framework)
    }

    /// Iterate over every library of every target, in file order.
    pub fn libraries(&self) -> impl Iterator<Item = &LockFileLibrary> {
        self.targets.iter().flat_map(|t| t.libraries.iter())
    }

    /// Read a lock file from a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn read_from(path: &Path) -> Result<Self, LockfileError> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                LockfileError::new(
                    codes::PKG_LOCK_NOT_FOUND,
                    format!("Lock file not found: {}", path.display()),
                )
            } else {
                LockfileError::new(
                    codes::PKG_LOCK_INVALID_JSON,
                    format!("Failed to read lock file: {e}"),
                )
            }
        })?;

        let lock_file = Self::from_json(&content)?;

        if lock_file.version != LOCK_FILE_SCHEMA_VERSION {
            return Err(LockfileError::new(
                codes::PKG_LOCK_VERSION_MISMATCH,
                format!(
                    "Lock file version {} not supported (expected {})",
                    lock_file.version, LOCK_FILE_SCHEMA_VERSION
                ),
            ));
        }

        Ok(lock_file)
    }

    /// Read a lock file if one exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_if_exists(path: &Path) -> Result<Option<Self>, LockfileError> {
        match Self::read_from(path) {
            Ok(lock_file) => Ok(Some(lock_file)),
            Err(e) if e.code() == codes::PKG_LOCK_NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the lock file to a path atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), LockfileError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_WRITE_FAILED,
                format!("Failed to serialize lock file: {e}"),
            )
        })?;

        lockstep_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_WRITE_FAILED,
                format!("Failed to write lock file: {e}"),
            )
        })
    }

    /// Deserialize from JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self, LockfileError> {
        serde_json::from_str(json).map_err(|e| {
            LockfileError::new(
                codes::PKG_LOCK_INVALID_JSON,
                format!("Invalid lock file JSON: {e}"),
            )
        })
    }

    /// Compute a deterministic hash of the lock file's content.
    ///
    /// Two lock files with the same targets and libraries in the same order
    /// hash identically.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let json = serde_json::to_string(self).expect("Lock file serialization should not fail");
        lockstep_util::hash::blake3_bytes(json.as_bytes())
    }
}

/// Lock file error.
#[derive(Debug)]
pub struct LockfileError {
    code: &'static str,
    message: String,
}

impl LockfileError {
    /// Create a new error.
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
}

impl fmt::Display for LockfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for LockfileError {}
