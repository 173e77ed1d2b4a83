//! Project specs and project-to-project references.
//!
//! A project spec (`lockstep.project.json`) declares the direct package
//! dependencies and target frameworks of one project. Restore consumes the
//! spec as-is; resolving it into a closure is the resolver's job.

use super::error::PkgError;
use super::identity::{ids_equal, PackageDependency};
use super::lockfile::lock_file_path;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Project spec filename.
pub const PROJECT_SPEC_FILE_NAME: &str = "lockstep.project.json";

/// Declared dependencies of one project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Project name.
    pub name: String,
    /// Target frameworks.
    #[serde(default)]
    pub frameworks: Vec<String>,
    /// Direct dependencies, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

impl ProjectSpec {
    /// Create an empty spec.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read a spec from disk.
    ///
    /// # Errors
    /// Returns `PKG_SPEC_NOT_FOUND` or `PKG_SPEC_INVALID`.
    pub fn read_from(path: &Path) -> Result<Self, PkgError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                PkgError::spec_not_found(path)
            } else {
                PkgError::spec_invalid(format!("Failed to read {}: {e}", path.display()))
            }
        })?;

        serde_json::from_str(&content)
            .map_err(|e| PkgError::spec_invalid(format!("Invalid JSON in {}: {e}", path.display())))
    }

    /// Write the spec atomically.
    ///
    /// # Errors
    /// Returns `PKG_SPEC_WRITE_FAILED` if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), PkgError> {
        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| PkgError::spec_write_failed(format!("Failed to serialize spec: {e}")))?;
        content.push('\n');

        lockstep_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            PkgError::spec_write_failed(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Add a dependency, replacing any existing entry with the same id.
    pub fn add_dependency(&mut self, dependency: PackageDependency) {
        if let Some(existing) = self
            .dependencies
            .iter_mut()
            .find(|d| ids_equal(&d.id, &dependency.id))
        {
            *existing = dependency;
        } else {
            self.dependencies.push(dependency);
        }
    }

    /// Remove a dependency by id. Returns whether anything was removed.
    pub fn remove_dependency(&mut self, id: &str) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|d| !ids_equal(&d.id, id));
        self.dependencies.len() != before
    }
}

/// A project-to-project reference as reported by the project system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReference {
    pub name: String,
    pub spec_path: PathBuf,
    /// Names of the projects this project references.
    #[serde(default)]
    pub external_project_references: Vec<String>,
}

/// Flattened cross-project edge handed to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalProjectReference {
    pub name: String,
    pub spec_path: PathBuf,
    pub referenced_project_names: Vec<String>,
}

impl From<&ProjectReference> for ExternalProjectReference {
    fn from(reference: &ProjectReference) -> Self {
        Self {
            name: reference.name.clone(),
            spec_path: reference.spec_path.clone(),
            referenced_project_names: reference.external_project_references.clone(),
        }
    }
}

/// A project that can be restored.
#[async_trait]
pub trait RestoreProject: Send + Sync {
    /// Display name used in progress messages.
    fn name(&self) -> &str;

    /// Path of the project spec file.
    fn spec_path(&self) -> &Path;

    /// The declared dependencies.
    fn spec(&self) -> &ProjectSpec;

    /// Where this project's lock file lives.
    fn lock_file_path(&self) -> PathBuf {
        lock_file_path(self.spec_path())
    }

    /// The full transitive closure of project references, this project included.
    async fn project_reference_closure(&self) -> Result<Vec<ProjectReference>, PkgError>;
}

/// A project loaded from a spec file with a fixed reference closure.
#[derive(Debug, Clone)]
pub struct SpecFileProject {
    spec_path: PathBuf,
    spec: ProjectSpec,
    references: Vec<ProjectReference>,
}

impl SpecFileProject {
    /// Load a project from its spec file.
    ///
    /// The reference closure starts out as just this project.
    pub fn load(spec_path: impl Into<PathBuf>) -> Result<Self, PkgError> {
        let spec_path = spec_path.into();
        let spec = ProjectSpec::read_from(&spec_path)?;
        Ok(Self::new(spec_path, spec))
    }

    /// Create a project from an in-memory spec.
    #[must_use]
    pub fn new(spec_path: impl Into<PathBuf>, spec: ProjectSpec) -> Self {
        let spec_path = spec_path.into();
        let own = ProjectReference {
            name: spec.name.clone(),
            spec_path: spec_path.clone(),
            external_project_references: Vec::new(),
        };
        Self {
            spec_path,
            spec,
            references: vec![own],
        }
    }

    /// Replace the reference closure.
    #[must_use]
    pub fn with_references(mut self, references: Vec<ProjectReference>) -> Self {
        self.references = references;
        self
    }
}

#[async_trait]
impl RestoreProject for SpecFileProject {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn spec_path(&self) -> &Path {
        &self.spec_path
    }

    fn spec(&self) -> &ProjectSpec {
        &self.spec
    }

    async fn project_reference_closure(&self) -> Result<Vec<ProjectReference>, PkgError> {
        Ok(self.references.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use crate::pkg::lockfile::LOCK_FILE_NAME;
    use tempfile::tempdir;

    #[test]
    fn test_spec_roundtrip_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROJECT_SPEC_FILE_NAME);

        let mut spec = ProjectSpec::new("app");
        spec.frameworks.push("net8.0".to_string());
        spec.add_dependency(PackageDependency::new("X", "[1.0, )"));
        spec.write_to(&path).unwrap();

        assert_eq!(ProjectSpec::read_from(&path).unwrap(), spec);
    }

    #[test]
    fn test_spec_read_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROJECT_SPEC_FILE_NAME);

        let err = ProjectSpec::read_from(&path).unwrap_err();
        assert_eq!(err.code(), codes::PKG_SPEC_NOT_FOUND);

        std::fs::write(&path, "[").unwrap();
        let err = ProjectSpec::read_from(&path).unwrap_err();
        assert_eq!(err.code(), codes::PKG_SPEC_INVALID);
    }

    #[test]
    fn test_add_dependency_replaces_same_id() {
        let mut spec = ProjectSpec::new("app");
        spec.add_dependency(PackageDependency::new("X", "1.0"));
        spec.add_dependency(PackageDependency::new("Y", "1.0"));
        spec.add_dependency(PackageDependency::new("x", "2.0"));

        assert_eq!(spec.dependencies.len(), 2);
        assert_eq!(spec.dependencies[0], PackageDependency::new("x", "2.0"));
    }

    #[test]
    fn test_remove_dependency_is_case_insensitive() {
        let mut spec = ProjectSpec::new("app");
        spec.add_dependency(PackageDependency::new("Newtonsoft.Json", "9.0"));

        assert!(spec.remove_dependency("newtonsoft.json"));
        assert!(!spec.remove_dependency("newtonsoft.json"));
        assert!(spec.dependencies.is_empty());
    }

    #[test]
    fn test_external_reference_conversion() {
        let reference = ProjectReference {
            name: "lib".to_string(),
            spec_path: PathBuf::from("/src/lib/lockstep.project.json"),
            external_project_references: vec!["core".to_string()],
        };

        let external = ExternalProjectReference::from(&reference);
        assert_eq!(external.name, "lib");
        assert_eq!(external.spec_path, reference.spec_path);
        assert_eq!(external.referenced_project_names, vec!["core".to_string()]);
    }

    #[tokio::test]
    async fn test_spec_file_project_closure_includes_self() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PROJECT_SPEC_FILE_NAME);
        ProjectSpec::new("app").write_to(&path).unwrap();

        let project = SpecFileProject::load(&path).unwrap();
        assert_eq!(project.name(), "app");
        assert_eq!(project.lock_file_path(), dir.path().join(LOCK_FILE_NAME));

        let closure = project.project_reference_closure().await.unwrap();
        assert_eq!(closure.len(), 1);
        assert_eq!(closure[0].name, "app");
        assert_eq!(closure[0].spec_path, path);
    }
}
