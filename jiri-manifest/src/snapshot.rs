//! Pinned manifests and the structured source-manifest (`spec.md` §4.9).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::loader::ResolvedUniverse;
use crate::manifest::{Hooks, Imports, Manifest, Overrides, Packages, Projects};

/// Produces a snapshot manifest: every resolved project with its
/// `revision` set to a concrete commit (`spec.md` §4.9, "Create snapshot").
///
/// `current_revisions` supplies the commit read from each project's git
/// working tree; this crate has no git dependency, so callers (the `jiri`
/// binary) are responsible for gathering it.
pub fn build_snapshot(
    universe: &ResolvedUniverse,
    current_revisions: &IndexMap<crate::project::ProjectKey, String>,
) -> Manifest {
    let mut projects = Vec::new();
    for (key, project) in &universe.projects {
        let mut pinned = project.clone();
        if let Some(revision) = current_revisions.get(key) {
            pinned.revision = revision.clone();
        }
        projects.push(pinned);
    }

    Manifest {
        imports: Imports::default(),
        overrides: Overrides::default(),
        projects: Projects { project: projects },
        hooks: Hooks {
            hook: universe.hooks.values().cloned().collect(),
        },
        packages: Packages {
            package: universe.packages.values().cloned().collect(),
        },
    }
}

/// One directory's worth of checkout state in the source-manifest
/// (`spec.md` §6, "Source-manifest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCheckout {
    pub repo_url: String,
    pub revision: String,
    pub fetch_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceManifestEntry {
    pub git_checkout: GitCheckout,
}

/// A structured description of a checkout's exact state per directory
/// (`spec.md` §3, "Source-manifest reference" / glossary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceManifest {
    pub directories: IndexMap<String, SourceManifestEntry>,
}

pub fn build_source_manifest(
    universe: &ResolvedUniverse,
    current_revisions: &IndexMap<crate::project::ProjectKey, String>,
) -> SourceManifest {
    let mut directories = IndexMap::new();
    for (key, project) in &universe.projects {
        let revision = current_revisions
            .get(key)
            .cloned()
            .unwrap_or_else(|| project.revision.clone());
        directories.insert(
            project.path.clone(),
            SourceManifestEntry {
                git_checkout: GitCheckout {
                    repo_url: project.remote.clone(),
                    revision,
                    fetch_ref: format!("refs/heads/{}", project.remote_branch),
                },
            },
        );
    }
    SourceManifest { directories }
}

/// Computes the diff between two snapshot manifests by project key
/// (`spec.md` §4.9, "Diff two snapshots"). Commit walking against Gerrit is
/// out of this crate's scope; callers layer that on top of
/// [`SnapshotDiff::updated`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiff {
    pub new: Vec<crate::project::ProjectKey>,
    pub deleted: Vec<crate::project::ProjectKey>,
    pub updated: Vec<(crate::project::ProjectKey, String, String)>,
}

pub fn diff_snapshots(old: &Manifest, new: &Manifest) -> SnapshotDiff {
    let old_by_key: IndexMap<_, _> = old
        .projects
        .project
        .iter()
        .map(|p| (p.key(), p))
        .collect();
    let new_by_key: IndexMap<_, _> = new
        .projects
        .project
        .iter()
        .map(|p| (p.key(), p))
        .collect();

    let mut diff = SnapshotDiff::default();
    for (key, new_project) in &new_by_key {
        match old_by_key.get(key) {
            None => diff.new.push(key.clone()),
            Some(old_project) if old_project.revision != new_project.revision => {
                diff.updated.push((
                    key.clone(),
                    old_project.revision.clone(),
                    new_project.revision.clone(),
                ));
            }
            Some(_) => {}
        }
    }
    for key in old_by_key.keys() {
        if !new_by_key.contains_key(key) {
            diff.deleted.push(key.clone());
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use std::collections::BTreeSet;

    fn project(name: &str, revision: &str) -> Project {
        Project {
            name: name.into(),
            remote: "https://example.com/x".into(),
            path: name.into(),
            revision: revision.into(),
            remote_branch: "master".into(),
            gerrit_host: None,
            githooks_path: None,
            history_depth: 0,
            attributes: BTreeSet::new(),
            git_submodules: false,
            manifest_path: String::new(),
            local_config: Default::default(),
        }
    }

    #[test]
    fn diff_detects_new_deleted_and_updated() {
        let old = Manifest {
            projects: Projects {
                project: vec![project("a", "r1"), project("b", "r1")],
            },
            ..Default::default()
        };
        let new = Manifest {
            projects: Projects {
                project: vec![project("a", "r2"), project("c", "r1")],
            },
            ..Default::default()
        };
        let diff = diff_snapshots(&old, &new);
        assert_eq!(diff.new.len(), 1);
        assert_eq!(diff.new[0].name, "c");
        assert_eq!(diff.deleted.len(), 1);
        assert_eq!(diff.deleted[0].name, "b");
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(diff.updated[0].0.name, "a");
    }
}
