//! `lockstep deleteme` command implementation.
//!
//! Inspects and sweeps package directories that an earlier uninstall could
//! not fully remove.

use super::{fail, resolve_path, root_dir};
use lockstep_core::pkg::{
    marker_path, DeleteOnRestartManager, PackageIdentity, PackageVersion, TracingContext,
};
use lockstep_core::Settings;
use miette::Result;
use std::path::{Path, PathBuf};

/// Deleteme command action.
#[derive(Debug, Clone)]
pub enum DeletemeAction {
    Scan {
        cwd: PathBuf,
        packages: Option<PathBuf>,
    },
    Sweep {
        cwd: PathBuf,
        packages: Option<PathBuf>,
    },
    Mark {
        cwd: PathBuf,
        dir: PathBuf,
    },
}

/// Run a deleteme action.
pub fn run(action: DeletemeAction, json: bool) -> Result<()> {
    match action {
        DeletemeAction::Scan { cwd, packages } => scan(&manager_for(&cwd, packages, json), json),
        DeletemeAction::Sweep { cwd, packages } => sweep(&manager_for(&cwd, packages, json), json),
        DeletemeAction::Mark { cwd, dir } => mark(&resolve_path(&cwd, &dir), json),
    }
}

fn manager_for(cwd: &Path, packages: Option<PathBuf>, json: bool) -> DeleteOnRestartManager {
    let folder = match packages {
        Some(packages) => resolve_path(cwd, &packages),
        None => {
            let root = root_dir(cwd);
            match Settings::load(&root) {
                Ok(settings) => settings.packages_folder(&root),
                Err(e) => fail(json, "SETTINGS_INVALID", &e.to_string()),
            }
        }
    };

    match DeleteOnRestartManager::new(folder) {
        Ok(manager) => manager,
        Err(e) => fail(json, "INVALID_ARGUMENT", &e.to_string()),
    }
}

fn scan(manager: &DeleteOnRestartManager, json: bool) -> Result<()> {
    let marked = manager.package_directories_marked_for_deletion();

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "packagesFolder": manager.packages_folder().to_string_lossy(),
                "marked": marked
            })
        );
    } else if marked.is_empty() {
        println!("No package directories marked for deletion.");
    } else {
        println!("Marked for deletion ({}):", marked.len());
        for dir in &marked {
            println!("  {}", dir.display());
        }
    }

    Ok(())
}

fn sweep(manager: &DeleteOnRestartManager, json: bool) -> Result<()> {
    let report = manager.delete_marked_package_directories(&TracingContext);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "packagesFolder": manager.packages_folder().to_string_lossy(),
                "deleted": report.deleted,
                "failed": report.failed
            })
        );
    } else if report.deleted.is_empty() && report.failed.is_empty() {
        println!("Nothing to sweep.");
    } else {
        for dir in &report.deleted {
            println!("  - {}", dir.display());
        }
        for dir in &report.failed {
            println!("  ! {} (still in use, kept for next sweep)", dir.display());
        }
        println!(
            "Deleted {} director{}, {} remaining.",
            report.deleted.len(),
            if report.deleted.len() == 1 { "y" } else { "ies" },
            report.failed.len()
        );
    }

    Ok(())
}

fn mark(dir: &Path, json: bool) -> Result<()> {
    if !dir.is_dir() {
        fail(
            json,
            "PACKAGE_DIR_NOT_FOUND",
            &format!("Not a directory: {}", dir.display()),
        );
    }

    let Some(identity) = dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(identity_from_dir_name)
    else {
        fail(
            json,
            "PACKAGE_DIR_INVALID",
            &format!("Expected a directory named <id>.<version>: {}", dir.display()),
        );
    };

    let folder = dir.parent().unwrap_or(Path::new("."));
    let manager = match DeleteOnRestartManager::new(folder) {
        Ok(manager) => manager,
        Err(e) => fail(json, "INVALID_ARGUMENT", &e.to_string()),
    };
    let marker = marker_path(dir);
    if !manager.mark_package_directory_for_deletion(&identity, dir, &TracingContext) {
        fail(
            json,
            "MARK_FAILED",
            &format!("Could not create {}", marker.display()),
        );
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "package": identity,
                "marker": marker.to_string_lossy()
            })
        );
    } else {
        println!("Marked {identity} for deletion ({})", marker.display());
    }

    Ok(())
}

/// Split a `<id>.<version>` directory name at the first dot that starts a valid version.
fn identity_from_dir_name(name: &str) -> Option<PackageIdentity> {
    name.match_indices('.').find_map(|(i, _)| {
        let (id, version) = (&name[..i], &name[i + 1..]);
        if id.is_empty() {
            return None;
        }
        PackageVersion::parse(version)
            .ok()
            .map(|version| PackageIdentity::new(id, version))
    })
}
