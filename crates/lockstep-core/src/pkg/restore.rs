//! Restore orchestration.
//!
//! Drives one restore for a project:
//!
//! 1. Requested: read the prior lock file (if any)
//! 2. Building: resolve the global packages folder, wrap sources, collect
//!    the project reference closure
//! 3. Executing: hand the request to the resolver
//! 4. Committing: write build files and the new lock file
//!
//! Cancellation is cooperative. The token is checked before the resolver
//! runs and again before committing; once the commit starts it always
//! finishes. A resolver that reports failure does not produce an `Err`: the
//! outcome carries `RestoreStatus::Failed` and the caller decides.

use super::context::{MessageLevel, ProjectContext};
use super::diff::{diff_lock_files, LockFileDiff};
use super::error::PkgError;
use super::lockfile::LockFile;
use super::project::{ExternalProjectReference, ProjectSpec, RestoreProject};
use crate::config::Settings;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A configured package source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSource {
    pub name: String,
    pub source: String,
}

impl PackageSource {
    /// Wrap a source string. The name defaults to the source itself.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            name: source.clone(),
            source,
        }
    }
}

/// Everything the resolver needs for one project.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub project_name: String,
    pub project: ProjectSpec,
    pub spec_path: PathBuf,
    pub lock_file_path: PathBuf,
    pub sources: Vec<PackageSource>,
    pub global_packages_folder: PathBuf,
    pub external_projects: Vec<ExternalProjectReference>,
    pub max_degree_of_concurrency: usize,
}

/// A generated file written alongside the lock file on commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildIntegrationFile {
    pub path: PathBuf,
    pub content: String,
}

/// What the resolver produced.
#[derive(Debug, Clone)]
pub struct RestoreResult {
    pub success: bool,
    pub lock_file: LockFile,
    pub lock_file_path: PathBuf,
    pub build_files: Vec<BuildIntegrationFile>,
    pub diagnostics: Vec<String>,
}

impl RestoreResult {
    /// Create a result with no build files or diagnostics.
    #[must_use]
    pub fn new(success: bool, lock_file: LockFile, lock_file_path: impl Into<PathBuf>) -> Self {
        Self {
            success,
            lock_file,
            lock_file_path: lock_file_path.into(),
            build_files: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Write build files, then the lock file.
    ///
    /// Every file is replaced atomically. The lock file goes last so that a
    /// failure part-way leaves the previous lock file in place.
    ///
    /// # Errors
    /// Returns `PKG_COMMIT_FAILED` if any file cannot be written.
    pub fn commit(&self, ctx: &dyn ProjectContext) -> Result<(), PkgError> {
        for file in &self.build_files {
            if let Some(parent) = file.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    PkgError::commit_failed(format!("Failed to create {}: {e}", parent.display()))
                })?;
            }
            ctx.log(
                MessageLevel::Debug,
                &format!("Generating build file {}", file.path.display()),
            );
            lockstep_util::fs::atomic_write(&file.path, file.content.as_bytes()).map_err(|e| {
                PkgError::commit_failed(format!("Failed to write {}: {e}", file.path.display()))
            })?;
        }

        ctx.log(
            MessageLevel::Debug,
            &format!("Writing lock file to disk. Path: {}", self.lock_file_path.display()),
        );
        self.lock_file
            .write_to(&self.lock_file_path)
            .map_err(|e| PkgError::commit_failed(e.to_string()))
    }
}

/// The resolution/build step that turns a request into a lock file.
#[async_trait]
pub trait RestoreExecutor: Send + Sync {
    async fn execute(
        &self,
        request: RestoreRequest,
        token: &CancellationToken,
    ) -> Result<RestoreResult, PkgError>;
}

/// Phases of one restore, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Requested,
    Building,
    Executing,
    Committing,
}

/// Terminal state of a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStatus {
    Succeeded,
    Failed,
    Canceled,
}

/// Result of a restore call.
#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub project_name: String,
    pub status: RestoreStatus,
    /// Present whenever the resolver ran.
    pub result: Option<RestoreResult>,
    /// Packages added/removed relative to the prior lock file.
    pub diff: LockFileDiff,
    /// Whether the committed lock file differs from the prior one.
    pub lock_file_changed: bool,
}

impl RestoreOutcome {
    fn canceled(project_name: &str, result: Option<RestoreResult>) -> Self {
        Self {
            project_name: project_name.to_string(),
            status: RestoreStatus::Canceled,
            result,
            diff: LockFileDiff::default(),
            lock_file_changed: false,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == RestoreStatus::Succeeded
    }
}

fn enter(project: &str, phase: RestorePhase) {
    debug!(project, ?phase, "restore phase");
}

/// Assemble the request for `project`.
///
/// # Errors
/// Returns `PKG_PROJECT_REFERENCES_FAILED` if the reference closure cannot be computed.
pub async fn build_restore_request(
    project: &dyn RestoreProject,
    sources: &[String],
    settings: &Settings,
) -> Result<RestoreRequest, PkgError> {
    let references = project.project_reference_closure().await.map_err(|e| {
        PkgError::project_references_failed(format!(
            "Failed to read project references for {}: {}",
            project.name(),
            e.message()
        ))
    })?;

    Ok(RestoreRequest {
        project_name: project.name().to_string(),
        project: project.spec().clone(),
        spec_path: project.spec_path().to_path_buf(),
        lock_file_path: project.lock_file_path(),
        sources: sources.iter().map(PackageSource::new).collect(),
        global_packages_folder: settings.global_packages_folder(),
        external_projects: references.iter().map(ExternalProjectReference::from).collect(),
        max_degree_of_concurrency: settings.max_degree_of_parallelism.max(1),
    })
}

/// Read the prior lock file. A corrupt file is treated as absent.
fn read_prior_lock_file(
    project: &dyn RestoreProject,
    ctx: &dyn ProjectContext,
) -> Option<LockFile> {
    let path = project.lock_file_path();
    match LockFile::read_if_exists(&path) {
        Ok(lock_file) => lock_file,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable lock file");
            ctx.log(
                MessageLevel::Warning,
                &format!("Ignoring unreadable lock file {}: {}", path.display(), e.message()),
            );
            None
        }
    }
}

/// Restore a project and report the outcome, without writing anything.
///
/// # Errors
/// Returns an error only if the request cannot be assembled.
pub async fn restore_without_commit(
    project: &dyn RestoreProject,
    ctx: &dyn ProjectContext,
    sources: &[String],
    settings: &Settings,
    executor: &dyn RestoreExecutor,
    token: &CancellationToken,
) -> Result<RestoreOutcome, PkgError> {
    let name = project.name();

    enter(name, RestorePhase::Requested);
    ctx.log(
        MessageLevel::Info,
        &format!("Restoring packages for {name}..."),
    );
    let prior = read_prior_lock_file(project, ctx).unwrap_or_default();

    enter(name, RestorePhase::Building);
    let request = build_restore_request(project, sources, settings).await?;

    if token.is_cancelled() {
        ctx.log(
            MessageLevel::Info,
            &format!("Package restore for {name} was canceled."),
        );
        return Ok(RestoreOutcome::canceled(name, None));
    }

    enter(name, RestorePhase::Executing);
    let result = match executor.execute(request, token).await {
        Ok(result) => result,
        Err(e) => {
            warn!(project = name, error = %e, "Resolver failed");
            RestoreResult {
                diagnostics: vec![e.to_string()],
                ..RestoreResult::new(false, LockFile::new(), project.lock_file_path())
            }
        }
    };

    let (status, diff) = if result.success {
        ctx.log(
            MessageLevel::Info,
            &format!("Package restore for {name} succeeded."),
        );
        (RestoreStatus::Succeeded, diff_lock_files(&prior, &result.lock_file))
    } else {
        ctx.log(
            MessageLevel::Warning,
            &format!("Package restore for {name} failed."),
        );
        for diagnostic in &result.diagnostics {
            ctx.log(MessageLevel::Warning, diagnostic);
        }
        (RestoreStatus::Failed, LockFileDiff::default())
    };

    let lock_file_changed =
        result.success && prior.content_hash() != result.lock_file.content_hash();

    Ok(RestoreOutcome {
        project_name: name.to_string(),
        status,
        result: Some(result),
        diff,
        lock_file_changed,
    })
}

/// Restore a project and commit the new lock file on success.
///
/// # Errors
/// Returns an error if the request cannot be assembled or the commit fails.
/// Resolver failures and cancellation are reported through the outcome.
pub async fn restore(
    project: &dyn RestoreProject,
    ctx: &dyn ProjectContext,
    sources: &[String],
    settings: &Settings,
    executor: &dyn RestoreExecutor,
    token: &CancellationToken,
) -> Result<RestoreOutcome, PkgError> {
    let outcome = restore_without_commit(project, ctx, sources, settings, executor, token).await?;

    if outcome.status != RestoreStatus::Succeeded {
        return Ok(outcome);
    }

    // Last point where cancellation is observed
    if token.is_cancelled() {
        ctx.log(
            MessageLevel::Info,
            &format!("Package restore for {} was canceled.", outcome.project_name),
        );
        return Ok(RestoreOutcome::canceled(&outcome.project_name, outcome.result));
    }

    enter(&outcome.project_name, RestorePhase::Committing);
    if let Some(result) = &outcome.result {
        result.commit(ctx)?;
    }

    Ok(outcome)
}

/// Restore several projects, at most `settings.max_degree_of_parallelism` at a time.
///
/// Outcomes are returned in input order. A project listed twice (same lock
/// file) is restored once; later entries get `PKG_INVALID_ARGUMENT`.
pub async fn restore_all(
    projects: &[&dyn RestoreProject],
    ctx: &dyn ProjectContext,
    settings: &Settings,
    executor: &dyn RestoreExecutor,
    token: &CancellationToken,
) -> Vec<Result<RestoreOutcome, PkgError>> {
    let mut seen = HashSet::new();
    let unique: Vec<bool> = projects
        .iter()
        .map(|p| seen.insert(p.lock_file_path()))
        .collect();

    let sources = &settings.package_sources;
    stream::iter(projects.iter().zip(unique))
        .map(|(project, unique)| async move {
            if !unique {
                return Err(PkgError::invalid_argument(
                    "projects",
                    &format!("{} is listed more than once", project.name()),
                ));
            }
            restore(*project, ctx, sources, settings, executor, token).await
        })
        .buffered(settings.max_degree_of_parallelism.max(1))
        .collect()
        .await
}
