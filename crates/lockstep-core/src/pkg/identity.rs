//! Package identity and dependency value types.
//!
//! Package ids compare case-insensitively everywhere: equality, hashing and
//! ordering all fold ASCII case, so a `PackageIdentity` can be used directly
//! as a map or set key. Versions compare by semantic precedence and ignore
//! build metadata.

use super::error::PkgError;
use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Compare two package ids with case-insensitive ordinal semantics.
///
/// Characters are folded to ASCII upper case before comparing code points.
#[must_use]
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(|c| c.to_ascii_uppercase())
        .cmp(b.chars().map(|c| c.to_ascii_uppercase()))
}

/// Check two package ids for case-insensitive equality.
#[must_use]
pub fn ids_equal(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// A resolved package version.
///
/// Accepts the short forms common in lock files (`1`, `1.0`) and normalizes
/// them to three components.
#[derive(Debug, Clone)]
pub struct PackageVersion(Version);

impl PackageVersion {
    /// Create a release version from its components.
    #[must_use]
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    /// Parse a version string.
    ///
    /// # Errors
    /// Returns `PKG_VERSION_INVALID` if the string is not a version.
    pub fn parse(input: &str) -> Result<Self, PkgError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(PkgError::version_invalid(input, "empty version"));
        }

        let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
        let (core, suffix) = trimmed.split_at(split);

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(PkgError::version_invalid(
                input,
                "expected at most three numeric components",
            ));
        }
        if parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(PkgError::version_invalid(
                input,
                "components must be numeric",
            ));
        }

        let mut normalized = parts.join(".");
        for _ in parts.len()..3 {
            normalized.push_str(".0");
        }
        normalized.push_str(suffix);

        Version::parse(&normalized)
            .map(Self)
            .map_err(|e| PkgError::version_invalid(input, &e.to_string()))
    }

    /// Access the underlying semver version.
    #[must_use]
    pub fn as_semver(&self) -> &Version {
        &self.0
    }

    /// Whether this is a pre-release version.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    fn precedence_key(&self) -> (u64, u64, u64, &semver::Prerelease) {
        (self.0.major, self.0.minor, self.0.patch, &self.0.pre)
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.precedence_key() == other.precedence_key()
    }
}

impl Eq for PackageVersion {}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.precedence_key().hash(state);
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence_key().cmp(&other.precedence_key())
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PackageVersion {
    type Err = PkgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(|e| serde::de::Error::custom(e.message().to_string()))
    }
}

/// A package id at an exact version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    id: String,
    version: PackageVersion,
}

impl PackageIdentity {
    /// Create a new identity.
    #[must_use]
    pub fn new(id: impl Into<String>, version: PackageVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Create an identity from an id and a version string.
    ///
    /// # Errors
    /// Returns `PKG_VERSION_INVALID` if the version does not parse.
    pub fn parse(id: impl Into<String>, version: &str) -> Result<Self, PkgError> {
        Ok(Self::new(id, PackageVersion::parse(version)?))
    }

    /// The package id, with its original casing.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The package version.
    #[must_use]
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        ids_equal(&self.id, &other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.id.chars() {
            c.to_ascii_uppercase().hash(state);
        }
        self.version.hash(state);
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_ids(&self.id, &other.id).then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// A declared dependency edge: a package id plus the range it was declared with.
///
/// The range is kept verbatim. Ranges have already been resolved by the time
/// a lock file exists, so only the id takes part in graph edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependency {
    pub id: String,
    #[serde(default)]
    pub range: String,
}

impl PackageDependency {
    /// Create a new dependency edge.
    #[must_use]
    pub fn new(id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            range: range.into(),
        }
    }
}

/// One resolved package together with its declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDependencyInfo {
    pub identity: PackageIdentity,
    pub dependencies: Vec<PackageDependency>,
}

impl PackageDependencyInfo {
    /// Create a new node.
    #[must_use]
    pub fn new(identity: PackageIdentity, dependencies: Vec<PackageDependency>) -> Self {
        Self {
            identity,
            dependencies,
        }
    }

    /// The package id of this node.
    #[must_use]
    pub fn id(&self) -> &str {
        self.identity.id()
    }

    /// Whether any declared dependency targets `id` (case-insensitive).
    #[must_use]
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| ids_equal(&d.id, id))
    }
}
