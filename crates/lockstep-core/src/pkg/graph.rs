//! Dependency graph construction from lock files.
//!
//! Builds an in-memory graph of resolved package nodes from an already
//! parsed lock file. This is a pure transformation: no disk or network I/O.

use super::identity::{ids_equal, PackageDependencyInfo, PackageIdentity};
use super::lockfile::LockFile;
use super::order::sort_packages_by_dependency_order;
use std::collections::HashMap;

/// The resolved dependency closure of a project.
///
/// Nodes keep first-occurrence order. Edges are id-level: a dependency on
/// `X` points at whichever node in the graph has id `X`.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<PackageDependencyInfo>,
    index: HashMap<PackageIdentity, usize>,
}

/// Build a graph from an optional lock file.
///
/// A missing lock file yields an empty graph.
#[must_use]
pub fn build_dependency_graph(lock_file: Option<&LockFile>) -> DependencyGraph {
    lock_file.map_or_else(DependencyGraph::empty, DependencyGraph::from_lock_file)
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a graph from every library of every target in `lock_file`.
    ///
    /// Libraries repeated across targets collapse into one node whose edges
    /// are the union of each occurrence's edges.
    #[must_use]
    pub fn from_lock_file(lock_file: &LockFile) -> Self {
        let mut graph = Self::empty();
        for library in lock_file.libraries() {
            graph.insert(library.to_dependency_info());
        }
        graph
    }

    /// Insert a node, merging edges into an existing node with the same identity.
    ///
    /// A merged edge is skipped when the node already declares that id.
    pub fn insert(&mut self, info: PackageDependencyInfo) {
        if let Some(&idx) = self.index.get(&info.identity) {
            let existing = &mut self.nodes[idx];
            for dep in info.dependencies {
                if !existing.depends_on(&dep.id) {
                    existing.dependencies.push(dep);
                }
            }
            return;
        }

        self.index.insert(info.identity.clone(), self.nodes.len());
        self.nodes.push(info);
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in first-occurrence order.
    #[must_use]
    pub fn nodes(&self) -> &[PackageDependencyInfo] {
        &self.nodes
    }

    /// All identities in first-occurrence order.
    pub fn identities(&self) -> impl Iterator<Item = &PackageIdentity> {
        self.nodes.iter().map(|n| &n.identity)
    }

    /// Whether the graph contains `identity`.
    #[must_use]
    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.index.contains_key(identity)
    }

    /// Look up a node by identity.
    #[must_use]
    pub fn get(&self, identity: &PackageIdentity) -> Option<&PackageDependencyInfo> {
        self.index.get(identity).map(|&idx| &self.nodes[idx])
    }

    /// Look up the first node with the given id (case-insensitive).
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&PackageDependencyInfo> {
        self.nodes.iter().find(|n| ids_equal(n.id(), id))
    }

    /// Identities of the nodes that `identity` depends on.
    ///
    /// Dependencies whose id has no node in the graph are skipped. The result
    /// follows declaration order and contains no duplicates.
    #[must_use]
    pub fn depends_on(&self, identity: &PackageIdentity) -> Vec<&PackageIdentity> {
        let Some(node) = self.get(identity) else {
            return Vec::new();
        };

        let mut targets: Vec<&PackageIdentity> = Vec::new();
        for dep in &node.dependencies {
            for candidate in self.nodes.iter().filter(|n| ids_equal(n.id(), &dep.id)) {
                if !targets.contains(&&candidate.identity) {
                    targets.push(&candidate.identity);
                }
            }
        }
        targets
    }

    /// Nodes in children-first order.
    #[must_use]
    pub fn ordered(&self) -> Vec<PackageDependencyInfo> {
        sort_packages_by_dependency_order(self.nodes.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::identity::PackageVersion;
    use crate::pkg::lockfile::{LockFileLibrary, LockFileTarget};

    fn lib(name: &str, version: &str) -> LockFileLibrary {
        LockFileLibrary::new(name, PackageVersion::parse(version).unwrap())
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::parse(id, version).unwrap()
    }

    #[test]
    fn test_absent_lock_file_builds_empty_graph() {
        let graph = build_dependency_graph(None);
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn test_build_from_single_target() {
        let lock = LockFile::new().with_target(
            LockFileTarget::new("net8.0")
                .with_library(lib("X", "1.0"))
                .with_library(lib("Y", "1.0").with_dependency("X", "[1.0, )")),
        );

        let graph = build_dependency_graph(Some(&lock));
        assert_eq!(graph.len(), 2);
        assert!(graph.contains(&identity("x", "1.0.0")));
        assert_eq!(
            graph.depends_on(&identity("Y", "1.0")),
            vec![&identity("X", "1.0")]
        );
        assert!(graph.depends_on(&identity("X", "1.0")).is_empty());
    }

    #[test]
    fn test_duplicate_identities_across_targets_merge_edges() {
        let lock = LockFile::new()
            .with_target(
                LockFileTarget::new("net8.0")
                    .with_library(lib("A", "1.0"))
                    .with_library(lib("B", "1.0"))
                    .with_library(lib("Y", "1.0").with_dependency("A", "1.0")),
            )
            .with_target(
                LockFileTarget::new("net6.0")
                    .with_library(lib("B", "1.0"))
                    .with_library(
                        lib("y", "1.0")
                            .with_dependency("a", "1.0")
                            .with_dependency("B", "1.0"),
                    ),
            );

        let graph = DependencyGraph::from_lock_file(&lock);
        assert_eq!(graph.len(), 3);

        let y = graph.get(&identity("Y", "1.0")).unwrap();
        let ids: Vec<&str> = y.dependencies.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_edges_to_missing_nodes_are_skipped() {
        let lock = LockFile::new().with_target(
            LockFileTarget::new("net8.0")
                .with_library(lib("Y", "1.0").with_dependency("NotInGraph", "1.0")),
        );

        let graph = DependencyGraph::from_lock_file(&lock);
        assert!(graph.depends_on(&identity("Y", "1.0")).is_empty());
        assert!(graph.find_by_id("notingraph").is_none());
        assert!(graph.find_by_id("y").is_some());
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let lock = LockFile::new().with_target(
            LockFileTarget::new("net8.0")
                .with_library(lib("C", "1.0"))
                .with_library(lib("A", "1.0"))
                .with_library(lib("B", "1.0").with_dependency("A", "1.0")),
        );

        let first: Vec<String> = DependencyGraph::from_lock_file(&lock)
            .identities()
            .map(ToString::to_string)
            .collect();
        let second: Vec<String> = DependencyGraph::from_lock_file(&lock)
            .identities()
            .map(ToString::to_string)
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["C@1.0.0", "A@1.0.0", "B@1.0.0"]);
    }
}
