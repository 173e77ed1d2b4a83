use crate::pkg::identity::PackageIdentity;
use crate::pkg::project::PROJECT_SPEC_FILE_NAME;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the global packages folder.
pub const GLOBAL_PACKAGES_ENV: &str = "LOCKSTEP_PACKAGES";

/// Find the project root by walking up from `cwd` looking for a project spec or `.git`.
///
/// Returns the first directory containing either marker, or `None` if neither is found.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(PROJECT_SPEC_FILE_NAME).exists() || current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Get the global packages folder.
///
/// The `LOCKSTEP_PACKAGES` environment variable is read on every call and
/// wins over `configured`. Without either, the folder is
/// `~/.lockstep/packages`.
#[must_use]
pub fn global_packages_folder(configured: Option<&Path>) -> PathBuf {
    if let Ok(path) = std::env::var(GLOBAL_PACKAGES_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = configured {
        return path.to_path_buf();
    }

    dirs_next::home_dir()
        .map_or_else(|| PathBuf::from(".lockstep"), |p| p.join(".lockstep"))
        .join("packages")
}

/// Get the install directory for a package inside a version-folder layout.
///
/// Layout: `<root>/<lowercase id>/<normalized version>`.
#[must_use]
pub fn package_install_path(root: &Path, identity: &PackageIdentity) -> PathBuf {
    root.join(identity.id().to_ascii_lowercase())
        .join(identity.version().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_project_root_with_spec() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(PROJECT_SPEC_FILE_NAME), "{}").unwrap();

        let root = project_root(&nested);
        assert_eq!(root, Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_project_root_with_git() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let root = project_root(&nested);
        assert_eq!(root, Some(dir.path().to_path_buf()));
    }

    #[test]
    #[serial]
    fn test_global_packages_folder_env_override() {
        std::env::set_var(GLOBAL_PACKAGES_ENV, "/tmp/lockstep-test-packages");

        let folder = global_packages_folder(Some(Path::new("/configured")));
        assert_eq!(folder, PathBuf::from("/tmp/lockstep-test-packages"));

        std::env::remove_var(GLOBAL_PACKAGES_ENV);
    }

    #[test]
    #[serial]
    fn test_global_packages_folder_configured() {
        std::env::remove_var(GLOBAL_PACKAGES_ENV);

        let folder = global_packages_folder(Some(Path::new("/configured")));
        assert_eq!(folder, PathBuf::from("/configured"));
    }

    #[test]
    #[serial]
    fn test_global_packages_folder_default() {
        std::env::remove_var(GLOBAL_PACKAGES_ENV);

        let folder = global_packages_folder(None);
        assert!(folder.ends_with(Path::new(".lockstep").join("packages")));
    }

    #[test]
    #[serial]
    fn test_global_packages_folder_empty_env_ignored() {
        std::env::set_var(GLOBAL_PACKAGES_ENV, "");

        let folder = global_packages_folder(Some(Path::new("/configured")));
        assert_eq!(folder, PathBuf::from("/configured"));

        std::env::remove_var(GLOBAL_PACKAGES_ENV);
    }

    #[test]
    fn test_package_install_path_lowercases_id() {
        let identity = PackageIdentity::parse("Newtonsoft.Json", "9.0").unwrap();
        let path = package_install_path(Path::new("/root"), &identity);
        assert_eq!(path, Path::new("/root/newtonsoft.json/9.0.0"));
    }
}
