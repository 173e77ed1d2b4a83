//! Lock file differencing.
//!
//! Compares two lock file snapshots by package identity across the union of
//! all their targets. Removal is defined as addition with the arguments
//! swapped, so the two directions can never disagree.

use super::identity::PackageIdentity;
use super::lockfile::LockFile;
use serde::Serialize;
use std::collections::HashSet;

/// Packages added and removed between two lock files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockFileDiff {
    pub added: Vec<PackageIdentity>,
    pub removed: Vec<PackageIdentity>,
}

impl LockFileDiff {
    /// Whether nothing was added or removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Find all packages in `updated` that are not in `original`.
///
/// Results are de-duplicated and keep the order of first occurrence in
/// `updated`.
#[must_use]
pub fn added_packages(original: &LockFile, updated: &LockFile) -> Vec<PackageIdentity> {
    let existing: HashSet<PackageIdentity> =
        original.libraries().map(|lib| lib.identity()).collect();

    let mut seen = HashSet::new();
    updated
        .libraries()
        .map(|lib| lib.identity())
        .filter(|identity| !existing.contains(identity))
        .filter(|identity| seen.insert(identity.clone()))
        .collect()
}

/// Find all packages in `original` that are no longer in `updated`.
#[must_use]
pub fn removed_packages(original: &LockFile, updated: &LockFile) -> Vec<PackageIdentity> {
    added_packages(updated, original)
}

/// Compute both directions of the difference.
#[must_use]
pub fn diff_lock_files(original: &LockFile, updated: &LockFile) -> LockFileDiff {
    LockFileDiff {
        added: added_packages(original, updated),
        removed: removed_packages(original, updated),
    }
}
