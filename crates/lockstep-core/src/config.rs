use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename looked up in the solution directory.
pub const SETTINGS_FILE_NAME: &str = "lockstep.json";

/// Default bound on concurrent restores across projects.
pub const DEFAULT_MAX_DEGREE_OF_PARALLELISM: usize = 16;

/// Default solution-relative packages folder.
pub const DEFAULT_REPOSITORY_PATH: &str = "packages";

/// Runtime configuration for the lockstep CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Package source and folder settings.
///
/// Computed once and passed by reference to the components that need a
/// packages folder or source list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Explicit global packages folder. The environment override still wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_packages_folder: Option<PathBuf>,

    /// Packages folder for the solution, relative to the solution directory
    /// unless absolute.
    #[serde(default = "default_repository_path")]
    pub repository_path: PathBuf,

    /// Configured package sources, in priority order.
    #[serde(default)]
    pub package_sources: Vec<String>,

    /// Maximum number of projects restored concurrently.
    #[serde(default = "default_max_degree_of_parallelism")]
    pub max_degree_of_parallelism: usize,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from(DEFAULT_REPOSITORY_PATH)
}

fn default_max_degree_of_parallelism() -> usize {
    DEFAULT_MAX_DEGREE_OF_PARALLELISM
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            global_packages_folder: None,
            repository_path: default_repository_path(),
            package_sources: Vec::new(),
            max_degree_of_parallelism: DEFAULT_MAX_DEGREE_OF_PARALLELISM,
        }
    }
}

impl Settings {
    /// Load settings from `lockstep.json` in `dir`, falling back to defaults
    /// when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        let path = dir.join(SETTINGS_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::read_from(&path)
    }

    /// Read settings from an explicit file path.
    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;

        if settings.max_degree_of_parallelism == 0 {
            return Err(Error::invalid_argument(
                "maxDegreeOfParallelism",
                "must be at least 1",
            ));
        }

        Ok(settings)
    }

    /// Resolve the global packages folder.
    ///
    /// Order: `LOCKSTEP_PACKAGES`, then the explicit setting, then the
    /// default under the user profile.
    #[must_use]
    pub fn global_packages_folder(&self) -> PathBuf {
        crate::paths::global_packages_folder(self.global_packages_folder.as_deref())
    }

    /// Resolve the solution packages folder (where deletion markers live).
    #[must_use]
    pub fn packages_folder(&self, solution_dir: &Path) -> PathBuf {
        if self.repository_path.is_absolute() {
            self.repository_path.clone()
        } else {
            solution_dir.join(&self.repository_path)
        }
    }

    /// Set the package sources.
    #[must_use]
    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Set the maximum restore parallelism (clamped to at least 1).
    #[must_use]
    pub fn with_max_degree_of_parallelism(mut self, max: usize) -> Self {
        self.max_degree_of_parallelism = max.max(1);
        self
    }

    /// Set an explicit global packages folder.
    #[must_use]
    pub fn with_global_packages_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_packages_folder = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_settings_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.max_degree_of_parallelism,
            DEFAULT_MAX_DEGREE_OF_PARALLELISM
        );
    }

    #[test]
    fn test_settings_load_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            r#"{
                "repositoryPath": "deps",
                "packageSources": ["https://a.example/v3/index.json", "/local/feed"],
                "maxDegreeOfParallelism": 4
            }"#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();
        assert_eq!(settings.package_sources.len(), 2);
        assert_eq!(settings.max_degree_of_parallelism, 4);
        assert_eq!(
            settings.packages_folder(dir.path()),
            dir.path().join("deps")
        );
    }

    #[test]
    fn test_settings_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE_NAME), "{ not json").unwrap();

        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_settings_zero_parallelism_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE_NAME),
            r#"{ "maxDegreeOfParallelism": 0 }"#,
        )
        .unwrap();

        let err = Settings::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_absolute_repository_path() {
        let dir = tempdir().unwrap();
        let settings = Settings {
            repository_path: dir.path().join("abs"),
            ..Settings::default()
        };
        assert_eq!(
            settings.packages_folder(Path::new("/elsewhere")),
            dir.path().join("abs")
        );
    }

    #[test]
    fn test_builder_clamps_parallelism() {
        let settings = Settings::default().with_max_degree_of_parallelism(0);
        assert_eq!(settings.max_degree_of_parallelism, 1);
    }
}
