//! Dependency-order sorting.
//!
//! Orders packages children-first: every package comes after the packages it
//! depends on. The sort repeatedly takes the remaining package with the
//! fewest remaining parents (ties broken by case-insensitive id, then
//! version), collects those parents-first, and reverses the result.
//!
//! Cycles are not detected or rejected. Each pass removes exactly one
//! package, so the sort always terminates; inside a cycle the tie-break
//! decides the order.

use super::graph::DependencyGraph;
use super::identity::{compare_ids, PackageDependencyInfo, PackageIdentity};
use super::lockfile::{lock_file_path, LockFile, LockfileError};
use std::path::Path;

/// Sort packages so dependencies come before their dependents.
///
/// Duplicate identities in the input collapse into one package. The output
/// depends only on the set of packages, not on input order.
#[must_use]
pub fn sort_packages_by_dependency_order<I>(packages: I) -> Vec<PackageDependencyInfo>
where
    I: IntoIterator<Item = PackageDependencyInfo>,
{
    let mut distinct = DependencyGraph::empty();
    for package in packages {
        distinct.insert(package);
    }
    let mut to_sort: Vec<PackageDependencyInfo> = distinct.nodes().to_vec();
    let mut sorted = Vec::with_capacity(to_sort.len());

    while !to_sort.is_empty() {
        let parent_counts: Vec<usize> = to_sort
            .iter()
            .map(|package| parent_count(&to_sort, package))
            .collect();

        let next = (0..to_sort.len()).min_by(|&a, &b| {
            parent_counts[a]
                .cmp(&parent_counts[b])
                .then_with(|| compare_ids(to_sort[a].id(), to_sort[b].id()))
                .then_with(|| to_sort[a].identity.version().cmp(to_sort[b].identity.version()))
        });

        let Some(next) = next else {
            break;
        };
        sorted.push(to_sort.remove(next));
    }

    // Collected parents first; dependencies must run first
    sorted.reverse();
    sorted
}

/// Count the other remaining packages that declare a dependency on `package`'s id.
fn parent_count(remaining: &[PackageDependencyInfo], package: &PackageDependencyInfo) -> usize {
    remaining
        .iter()
        .filter(|other| other.identity != package.identity && other.depends_on(package.id()))
        .count()
}

/// Read a project's lock file and return its packages in children-first order.
///
/// A project without a lock file has no ordered dependencies.
///
/// # Errors
/// Returns an error if the lock file exists but cannot be read.
pub fn ordered_project_dependencies(
    spec_path: &Path,
) -> Result<Vec<PackageIdentity>, LockfileError> {
    let lock_path = lock_file_path(spec_path);
    let Some(lock_file) = LockFile::read_if_exists(&lock_path)? else {
        return Ok(Vec::new());
    };

    Ok(DependencyGraph::from_lock_file(&lock_file)
        .ordered()
        .into_iter()
        .map(|info| info.identity)
        .collect())
}
