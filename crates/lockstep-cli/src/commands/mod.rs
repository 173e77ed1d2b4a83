//! Subcommand implementations.
//!
//! Every command prints exactly one JSON object to stdout when `--json` is
//! set. Failures use `{"ok": false, "error": {"code", "message"}}` and exit 1.

pub mod deleteme;
pub mod diff;
pub mod order;
pub mod paths;
pub mod version;

use lockstep_core::paths::project_root;
use std::path::{Path, PathBuf};

/// Resolve a user-supplied path against the working directory.
pub fn resolve_path(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// The project root for `cwd`, or `cwd` itself outside a project.
pub fn root_dir(cwd: &Path) -> PathBuf {
    project_root(cwd).unwrap_or_else(|| cwd.to_path_buf())
}

/// Report an error and exit with status 1.
pub fn fail(json: bool, code: &str, message: &str) -> ! {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": code,
                    "message": message
                }
            })
        );
    } else {
        eprintln!("error: {code}: {message}");
    }
    std::process::exit(1);
}
