//! Deferred deletion of package directories.
//!
//! When an uninstall cannot fully remove a package directory (typically
//! because a file inside it is locked), an empty `<directory>.deleteme`
//! marker is left next to it in the packages folder. Markers are swept on
//! the next load.
//!
//! Ordering guarantees crash safety: the marker is created before the
//! directory delete is attempted and removed only after the directory is
//! confirmed gone. A crash in between leaves an orphan marker, which the
//! next scan deletes; it never leaves an unrecorded directory behind.
//!
//! Every step is idempotent, so concurrent sweeps of the same folder are safe.

use super::context::{MessageLevel, ProjectContext};
use super::identity::PackageIdentity;
use crate::config::Settings;
use crate::error::Error;
use lockstep_util::fs::{create_empty_file, remove_dir_all_if_exists, remove_file_if_exists};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Suffix of the marker file placed next to a partially deleted directory.
pub const DELETION_MARKER_SUFFIX: &str = ".deleteme";

/// Get the marker path for a package directory.
#[must_use]
pub fn marker_path(package_dir: &Path) -> PathBuf {
    let mut name: OsString = package_dir
        .file_name()
        .map_or_else(|| package_dir.as_os_str().to_os_string(), ToOwned::to_owned);
    name.push(DELETION_MARKER_SUFFIX);
    package_dir.with_file_name(name)
}

/// Notification that marked package directories were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagesMarkedForDeletion {
    directories: Vec<PathBuf>,
}

impl PackagesMarkedForDeletion {
    /// The marked directories, sorted.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

/// Result of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Directories removed together with their markers.
    pub deleted: Vec<PathBuf>,
    /// Directories that are still present; their markers are kept.
    pub failed: Vec<PathBuf>,
}

/// Tracks and cleans up package directories marked for deletion under one packages folder.
#[derive(Debug)]
pub struct DeleteOnRestartManager {
    packages_folder: PathBuf,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PackagesMarkedForDeletion>>>,
}

impl DeleteOnRestartManager {
    /// Create a manager for `packages_folder`.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if the path is empty.
    pub fn new(packages_folder: impl Into<PathBuf>) -> Result<Self, Error> {
        let packages_folder = packages_folder.into();
        if packages_folder.as_os_str().is_empty() {
            return Err(Error::invalid_argument(
                "packages_folder",
                "must not be empty",
            ));
        }

        Ok(Self {
            packages_folder,
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Create a manager for the solution packages folder configured in `settings`.
    pub fn from_settings(settings: &Settings, solution_dir: &Path) -> Result<Self, Error> {
        Self::new(settings.packages_folder(solution_dir))
    }

    /// The packages folder this manager scans.
    #[must_use]
    pub fn packages_folder(&self) -> &Path {
        &self.packages_folder
    }

    /// Register for marked-directory notifications.
    ///
    /// Each check that finds marked directories sends one message. Dropping
    /// the receiver unregisters it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PackagesMarkedForDeletion> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// List package directories that are marked for deletion and still exist.
    ///
    /// Markers whose directory is already gone are deleted on the way.
    #[must_use]
    pub fn package_directories_marked_for_deletion(&self) -> Vec<PathBuf> {
        self.scan_markers()
            .into_iter()
            .map(|marked| marked.directory)
            .collect()
    }

    fn scan_markers(&self) -> Vec<MarkedDirectory> {
        let entries = match fs::read_dir(&self.packages_folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(
                    path = %self.packages_folder.display(),
                    error = %e,
                    "Failed to read packages folder"
                );
                return Vec::new();
            }
        };

        let mut marked = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(
                        path = %self.packages_folder.display(),
                        error = %e,
                        "Skipping unreadable entry"
                    );
                    continue;
                }
            };
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }

            let file_name = entry.file_name();
            let lossy = file_name.to_string_lossy();
            let Some(dir_name) = strip_marker_suffix(&lossy) else {
                continue;
            };
            if file_name.to_str().is_none() {
                warn!(
                    marker = %entry.path().display(),
                    "Skipping deletion marker with a non UTF-8 name"
                );
                continue;
            }

            let marker = entry.path();
            let directory = self.packages_folder.join(dir_name);
            if directory.is_dir() {
                marked.push(MarkedDirectory { directory, marker });
            } else {
                debug!(marker = %marker.display(), "Removing orphan deletion marker");
                if let Err(e) = remove_file_if_exists(&marker) {
                    warn!(
                        marker = %marker.display(),
                        error = %e,
                        "Failed to remove orphan deletion marker"
                    );
                }
            }
        }

        marked.sort();
        marked
    }

    /// Scan for marked directories and notify subscribers if any are found.
    ///
    /// Returns the marked directories.
    pub fn check_and_raise_package_directories_marked_for_deletion(&self) -> Vec<PathBuf> {
        let directories = self.package_directories_marked_for_deletion();
        if directories.is_empty() {
            return directories;
        }

        let event = PackagesMarkedForDeletion {
            directories: directories.clone(),
        };
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());

        directories
    }

    /// Mark a package directory for deletion on the next sweep.
    ///
    /// A marker that cannot be created is logged as a warning. Returns
    /// whether the marker exists.
    pub fn mark_package_directory_for_deletion(
        &self,
        package: &PackageIdentity,
        package_root: &Path,
        ctx: &dyn ProjectContext,
    ) -> bool {
        let marker = marker_path(package_root);
        match create_empty_file(&marker) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    package = %package,
                    marker = %marker.display(),
                    error = %e,
                    "Failed to create deletion marker"
                );
                ctx.log(
                    MessageLevel::Warning,
                    &format!(
                        "Failed to mark package directory '{}' for deletion: {e}",
                        package_root.display()
                    ),
                );
                false
            }
        }
    }

    /// Remove a package directory during uninstall.
    ///
    /// The directory is marked first. If it cannot be fully removed the
    /// marker stays behind for a later sweep. Without a marker the directory
    /// is not touched. Returns whether the directory is gone.
    pub fn remove_package_directory(
        &self,
        package: &PackageIdentity,
        package_root: &Path,
        ctx: &dyn ProjectContext,
    ) -> bool {
        self.remove_package_directory_with(package, package_root, ctx, &remove_dir_all_if_exists)
    }

    fn remove_package_directory_with(
        &self,
        package: &PackageIdentity,
        package_root: &Path,
        ctx: &dyn ProjectContext,
        remove_dir: &dyn Fn(&Path) -> io::Result<()>,
    ) -> bool {
        if !self.mark_package_directory_for_deletion(package, package_root, ctx) {
            warn!(
                package = %package,
                path = %package_root.display(),
                "Not deleting unmarked package directory"
            );
            return false;
        }

        let marked = MarkedDirectory {
            directory: package_root.to_path_buf(),
            marker: marker_path(package_root),
        };
        self.delete_marked_directory(&marked, ctx, remove_dir)
    }

    /// Retry deletion of every marked package directory.
    ///
    /// Never fails: each directory is handled on its own and failures are
    /// logged as warnings.
    pub fn delete_marked_package_directories(&self, ctx: &dyn ProjectContext) -> SweepReport {
        self.delete_marked_package_directories_with(ctx, remove_dir_all_if_exists)
    }

    /// Sweep using a custom directory remover.
    pub fn delete_marked_package_directories_with<F>(
        &self,
        ctx: &dyn ProjectContext,
        remove_dir: F,
    ) -> SweepReport
    where
        F: Fn(&Path) -> io::Result<()>,
    {
        let mut report = SweepReport::default();
        for marked in self.scan_markers() {
            if self.delete_marked_directory(&marked, ctx, &remove_dir) {
                report.deleted.push(marked.directory);
            } else {
                report.failed.push(marked.directory);
            }
        }
        report
    }

    fn delete_marked_directory(
        &self,
        marked: &MarkedDirectory,
        ctx: &dyn ProjectContext,
        remove_dir: &dyn Fn(&Path) -> io::Result<()>,
    ) -> bool {
        let package_dir = &marked.directory;
        if let Err(e) = remove_dir(package_dir) {
            debug!(path = %package_dir.display(), error = %e, "Directory delete failed");
        }

        if package_dir.exists() {
            warn!(path = %package_dir.display(), "Failed to delete marked package directory");
            ctx.log(
                MessageLevel::Warning,
                &format!(
                    "Failed to delete marked package directory '{}'",
                    package_dir.display()
                ),
            );
            return false;
        }

        if let Err(e) = remove_file_if_exists(&marked.marker) {
            // Directory is gone; the orphan marker is cleaned up by the next scan
            warn!(
                marker = %marked.marker.display(),
                error = %e,
                "Failed to remove deletion marker"
            );
        }
        true
    }
}

/// A marked package directory and the marker file found for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MarkedDirectory {
    directory: PathBuf,
    marker: PathBuf,
}

fn strip_marker_suffix(name: &str) -> Option<&str> {
    let split = name.len().checked_sub(DELETION_MARKER_SUFFIX.len())?;
    if split == 0 || !name.is_char_boundary(split) {
        return None;
    }
    let (dir_name, suffix) = name.split_at(split);
    suffix
        .eq_ignore_ascii_case(DELETION_MARKER_SUFFIX)
        .then_some(dir_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::context::TracingContext;
    use tempfile::tempdir;

    #[test]
    fn test_marker_path_is_sibling() {
        assert_eq!(
            marker_path(Path::new("/packages/Foo.1.0.0")),
            Path::new("/packages/Foo.1.0.0.deleteme")
        );
        assert_eq!(
            marker_path(Path::new("/packages/Foo.1.0.0/")),
            Path::new("/packages/Foo.1.0.0.deleteme")
        );
    }

    #[test]
    fn test_strip_marker_suffix() {
        assert_eq!(strip_marker_suffix("Foo.1.0.0.deleteme"), Some("Foo.1.0.0"));
        assert_eq!(strip_marker_suffix("Foo.DELETEME"), Some("Foo"));
        assert_eq!(strip_marker_suffix(".deleteme"), None);
        assert_eq!(strip_marker_suffix("Foo.nupkg"), None);
        assert_eq!(strip_marker_suffix("x"), None);
    }

    #[test]
    fn test_empty_packages_folder_rejected() {
        let err = DeleteOnRestartManager::new("").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_missing_packages_folder_scans_empty() {
        let dir = tempdir().unwrap();
        let manager = DeleteOnRestartManager::new(dir.path().join("packages")).unwrap();
        assert!(manager.package_directories_marked_for_deletion().is_empty());
        assert_eq!(
            manager.delete_marked_package_directories(&TracingContext),
            SweepReport::default()
        );
    }

    #[test]
    fn test_from_settings_uses_repository_path() {
        let dir = tempdir().unwrap();
        let manager =
            DeleteOnRestartManager::from_settings(&Settings::default(), dir.path()).unwrap();
        assert_eq!(manager.packages_folder(), dir.path().join("packages"));
    }

    #[test]
    fn test_scan_ignores_unmarked_and_directory_markers() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("A.1.0.0")).unwrap();
        fs::create_dir(dir.path().join("B.1.0.0")).unwrap();
        // A directory named like a marker is not a marker
        fs::create_dir(dir.path().join("B.1.0.0.deleteme")).unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        assert!(manager.package_directories_marked_for_deletion().is_empty());
    }

    #[test]
    fn test_remove_package_directory_success_leaves_no_marker() {
        let dir = tempdir().unwrap();
        let package_dir = dir.path().join("A.1.0.0");
        fs::create_dir_all(package_dir.join("lib")).unwrap();
        fs::write(package_dir.join("lib").join("a.dll"), b"x").unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let identity = PackageIdentity::parse("A", "1.0.0").unwrap();

        assert!(manager.remove_package_directory(&identity, &package_dir, &TracingContext));
        assert!(!package_dir.exists());
        assert!(!marker_path(&package_dir).exists());
    }

    #[derive(Default)]
    struct RecordingContext {
        messages: Mutex<Vec<(MessageLevel, String)>>,
    }

    impl ProjectContext for RecordingContext {
        fn log(&self, level: MessageLevel, message: &str) {
            self.messages.lock().unwrap().push((level, message.to_string()));
        }
    }

    fn package_with_marker(root: &Path, name: &str) -> PathBuf {
        let package_dir = root.join(name);
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(package_dir.join("content.txt"), b"x").unwrap();
        fs::write(marker_path(&package_dir), b"").unwrap();
        package_dir
    }

    #[test]
    fn test_scan_removes_orphan_markers() {
        let dir = tempdir().unwrap();
        let kept = package_with_marker(dir.path(), "A.1.0.0");
        let orphan = marker_path(&dir.path().join("B.1.0.0"));
        fs::write(&orphan, b"").unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        assert_eq!(manager.package_directories_marked_for_deletion(), vec![kept.clone()]);
        assert!(!orphan.exists());
        assert!(marker_path(&kept).exists());
    }

    #[test]
    fn test_crash_after_delete_before_unmark() {
        let dir = tempdir().unwrap();
        let package_dir = package_with_marker(dir.path(), "A.1.0.0");
        // Simulate a crash between the directory delete and the marker removal
        fs::remove_dir_all(&package_dir).unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        assert!(manager.package_directories_marked_for_deletion().is_empty());
        assert!(!marker_path(&package_dir).exists());
    }

    #[test]
    fn test_sweep_deletes_directory_and_marker() {
        let dir = tempdir().unwrap();
        let package_dir = package_with_marker(dir.path(), "A.1.0.0");

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let report = manager.delete_marked_package_directories(&TracingContext);

        assert_eq!(report.deleted, vec![package_dir.clone()]);
        assert!(report.failed.is_empty());
        assert!(!package_dir.exists());
        assert!(!marker_path(&package_dir).exists());

        // Second sweep has nothing to do
        assert_eq!(
            manager.delete_marked_package_directories(&TracingContext),
            SweepReport::default()
        );
    }

    #[test]
    fn test_sweep_failure_is_isolated() {
        let dir = tempdir().unwrap();
        let a = package_with_marker(dir.path(), "A.1.0.0");
        let b = package_with_marker(dir.path(), "B.1.0.0");
        let c = package_with_marker(dir.path(), "C.1.0.0");

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let ctx = RecordingContext::default();
        let locked = b.clone();
        let report = manager.delete_marked_package_directories_with(&ctx, |path| {
            if path == locked {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "file in use"))
            } else {
                remove_dir_all_if_exists(path)
            }
        });

        assert_eq!(report.deleted, vec![a.clone(), c.clone()]);
        assert_eq!(report.failed, vec![b.clone()]);
        assert!(!a.exists() && !c.exists());
        assert!(b.exists());
        assert!(marker_path(&b).exists());
        assert!(!marker_path(&a).exists());

        let messages = ctx.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, MessageLevel::Warning);
        assert!(messages[0].1.contains("B.1.0.0"));
    }

    #[test]
    fn test_remove_package_directory_failure_keeps_marker() {
        let dir = tempdir().unwrap();
        let package_dir = dir.path().join("A.1.0.0");
        fs::create_dir(&package_dir).unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let identity = PackageIdentity::parse("A", "1.0.0").unwrap();
        let locked = |_: &Path| -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        };
        let removed = manager.remove_package_directory_with(
            &identity,
            &package_dir,
            &TracingContext,
            &locked,
        );

        assert!(!removed);
        assert!(package_dir.exists());
        assert!(marker_path(&package_dir).is_file());
        assert_eq!(manager.package_directories_marked_for_deletion(), vec![package_dir]);
    }

    #[test]
    fn test_remove_package_directory_without_marker_keeps_directory() {
        let dir = tempdir().unwrap();
        let package_dir = dir.path().join("A.1.0.0");
        fs::create_dir(&package_dir).unwrap();
        fs::write(package_dir.join("content.txt"), b"x").unwrap();
        // A directory in the marker's place makes marker creation fail
        fs::create_dir(marker_path(&package_dir)).unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let identity = PackageIdentity::parse("A", "1.0.0").unwrap();
        let ctx = RecordingContext::default();
        let attempted = Mutex::new(false);
        let remover = |path: &Path| -> io::Result<()> {
            *attempted.lock().unwrap() = true;
            remove_dir_all_if_exists(path)
        };

        assert!(!manager.remove_package_directory_with(&identity, &package_dir, &ctx, &remover));
        assert!(!*attempted.lock().unwrap());
        assert!(package_dir.join("content.txt").exists());

        let messages = ctx.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, MessageLevel::Warning);
    }

    #[test]
    fn test_sweep_removes_upper_case_marker() {
        let dir = tempdir().unwrap();
        let package_dir = dir.path().join("A.1.0.0");
        fs::create_dir(&package_dir).unwrap();
        let marker = dir.path().join("A.1.0.0.DELETEME");
        fs::write(&marker, b"").unwrap();

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let report = manager.delete_marked_package_directories(&TracingContext);

        assert_eq!(report.deleted, vec![package_dir.clone()]);
        assert!(!package_dir.exists());
        assert!(!marker.exists());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_unreadable_packages_folder_scans_empty() {
        let dir = tempdir().unwrap();
        // A file where the packages folder should be
        let packages = dir.path().join("packages");
        fs::write(&packages, b"").unwrap();

        let manager = DeleteOnRestartManager::new(packages).unwrap();
        assert!(manager.package_directories_marked_for_deletion().is_empty());
        assert_eq!(
            manager.delete_marked_package_directories(&TracingContext),
            SweepReport::default()
        );
    }

    #[test]
    fn test_mark_failure_is_a_warning() {
        let dir = tempdir().unwrap();
        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let identity = PackageIdentity::parse("A", "1.0.0").unwrap();
        let ctx = RecordingContext::default();

        // Parent of the marker does not exist
        let package_dir = dir.path().join("missing").join("A.1.0.0");
        assert!(!manager.mark_package_directory_for_deletion(&identity, &package_dir, &ctx));

        let messages = ctx.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, MessageLevel::Warning);
    }

    #[test]
    fn test_check_notifies_subscribers_once() {
        let dir = tempdir().unwrap();
        let package_dir = package_with_marker(dir.path(), "A.1.0.0");

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let mut first = manager.subscribe();
        let mut second = manager.subscribe();

        let found = manager.check_and_raise_package_directories_marked_for_deletion();
        assert_eq!(found, vec![package_dir.clone()]);

        let event = first.try_recv().unwrap();
        assert_eq!(event.directories(), &[package_dir.clone()]);
        assert_eq!(second.try_recv().unwrap(), event);
        assert!(first.try_recv().is_err());
    }

    #[test]
    fn test_check_without_markers_sends_nothing() {
        let dir = tempdir().unwrap();
        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let mut rx = manager.subscribe();

        assert!(manager
            .check_and_raise_package_directories_marked_for_deletion()
            .is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_skipped() {
        let dir = tempdir().unwrap();
        package_with_marker(dir.path(), "A.1.0.0");

        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();
        let dropped = manager.subscribe();
        let mut kept = manager.subscribe();
        drop(dropped);

        manager.check_and_raise_package_directories_marked_for_deletion();
        assert!(kept.try_recv().is_ok());
        assert_eq!(manager.subscriber_count(), 1);
    }

    #[test]
    fn test_subscriber_count_prunes_dropped_receivers() {
        let dir = tempdir().unwrap();
        let manager = DeleteOnRestartManager::new(dir.path()).unwrap();

        let kept = manager.subscribe();
        let dropped = manager.subscribe();
        assert_eq!(manager.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(manager.subscriber_count(), 1);
        drop(kept);
        assert_eq!(manager.subscriber_count(), 0);
    }
}
