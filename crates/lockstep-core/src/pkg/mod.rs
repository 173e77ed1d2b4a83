//! Package restore core.
//!
//! Provides:
//! - Package identities and lenient versions
//! - Lock file reading, writing and hashing
//! - Dependency graphs built from lock files
//! - Dependency-order sorting (dependencies before dependents)
//! - Lock file differencing
//! - Project specs and project references
//! - Restore orchestration with cancellation and atomic commit
//! - Deferred deletion of package directories (`.deleteme` markers)

pub mod context;
pub mod deletion;
pub mod diff;
pub mod error;
pub mod graph;
pub mod identity;
pub mod lockfile;
pub mod order;
pub mod project;
pub mod restore;

pub use context::{MessageLevel, ProjectContext, TracingContext};
pub use deletion::{
    marker_path, DeleteOnRestartManager, PackagesMarkedForDeletion, SweepReport,
    DELETION_MARKER_SUFFIX,
};
pub use diff::{added_packages, diff_lock_files, removed_packages, LockFileDiff};
pub use error::{codes as pkg_codes, PkgError};
pub use graph::{build_dependency_graph, DependencyGraph};
pub use identity::{
    compare_ids, ids_equal, PackageDependency, PackageDependencyInfo, PackageIdentity,
    PackageVersion,
};
pub use lockfile::{
    codes as lockfile_codes, lock_file_path, LockFile, LockFileLibrary, LockFileTarget,
    LockfileError, LOCK_FILE_NAME, LOCK_FILE_SCHEMA_VERSION,
};
pub use order::{ordered_project_dependencies, sort_packages_by_dependency_order};
pub use project::{
    ExternalProjectReference, ProjectReference, ProjectSpec, RestoreProject, SpecFileProject,
    PROJECT_SPEC_FILE_NAME,
};
pub use restore::{
    build_restore_request, restore, restore_all, restore_without_commit, BuildIntegrationFile,
    PackageSource, RestoreExecutor, RestoreOutcome, RestorePhase, RestoreRequest, RestoreResult,
    RestoreStatus,
};
