//! `lockstep order` command implementation.
//!
//! Prints the packages of a lock file in restore order: every package after
//! the packages it depends on.

use super::{fail, resolve_path, root_dir};
use lockstep_core::paths::package_install_path;
use lockstep_core::pkg::{lock_file_path, DependencyGraph, LockFile, PROJECT_SPEC_FILE_NAME};
use lockstep_core::Settings;
use miette::Result;
use std::path::Path;

/// Run the order command.
///
/// An explicit `--lock` path must exist. Without it the project's lock file
/// is used, and a project that has never been restored orders nothing.
/// JSON output also reports where each package lives in the global packages
/// folder.
pub fn run(cwd: &Path, lock: Option<&Path>, json: bool) -> Result<()> {
    let root = root_dir(cwd);
    let (path, lock_file) = match lock {
        Some(lock) => {
            let path = resolve_path(cwd, lock);
            match LockFile::read_from(&path) {
                Ok(lock_file) => (path, lock_file),
                Err(e) => fail(json, e.code(), e.message()),
            }
        }
        None => {
            let path = lock_file_path(&root.join(PROJECT_SPEC_FILE_NAME));
            match LockFile::read_if_exists(&path) {
                Ok(lock_file) => (path, lock_file.unwrap_or_default()),
                Err(e) => fail(json, e.code(), e.message()),
            }
        }
    };

    let ordered = DependencyGraph::from_lock_file(&lock_file).ordered();
    tracing::debug!(lock_file = %path.display(), packages = ordered.len(), "Ordered lock file");

    if json {
        let global_packages = match Settings::load(&root) {
            Ok(settings) => settings.global_packages_folder(),
            Err(e) => fail(json, "SETTINGS_INVALID", &e.to_string()),
        };
        let packages: Vec<_> = ordered
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.identity.id(),
                    "version": p.identity.version().to_string(),
                    "installPath": package_install_path(&global_packages, &p.identity)
                        .to_string_lossy(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "lockFile": path.to_string_lossy(),
                "packages": packages
            })
        );
    } else if ordered.is_empty() {
        println!("No packages in {}", path.display());
    } else {
        for package in &ordered {
            println!("{}", package.identity);
        }
    }

    Ok(())
}
