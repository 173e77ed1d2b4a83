//! `lockstep diff` command implementation.

use super::{fail, resolve_path};
use lockstep_core::pkg::{diff_lock_files, LockFile};
use miette::Result;
use std::path::Path;

fn read_or_empty(path: &Path, json: bool) -> LockFile {
    match LockFile::read_if_exists(path) {
        Ok(lock_file) => lock_file.unwrap_or_default(),
        Err(e) => fail(json, e.code(), e.message()),
    }
}

/// Run the diff command.
pub fn run(cwd: &Path, original: &Path, updated: &Path, json: bool) -> Result<()> {
    let original = read_or_empty(&resolve_path(cwd, original), json);
    let updated = read_or_empty(&resolve_path(cwd, updated), json);

    let diff = diff_lock_files(&original, &updated);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "added": diff.added,
                "removed": diff.removed
            })
        );
    } else if diff.is_empty() {
        println!("No package changes.");
    } else {
        for identity in &diff.added {
            println!("+ {identity}");
        }
        for identity in &diff.removed {
            println!("- {identity}");
        }
    }

    Ok(())
}
