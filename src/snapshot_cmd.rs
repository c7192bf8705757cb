//! `jiri snapshot` / `jiri snapshot -checkout` / `jiri snapshot -diff`
//! (`spec.md` §4.9), wiring `jiri_manifest::snapshot` onto real git state.

use indexmap::IndexMap;
use jiri_manifest::loader::ResolvedUniverse;
use jiri_manifest::snapshot::{build_snapshot, build_source_manifest, diff_snapshots, SnapshotDiff, SourceManifest};
use jiri_manifest::{Manifest, ProjectKey};
use thiserror::Error;

use crate::context::WorkspaceContext;
use crate::gerrit::GerritClient;
use crate::git::{GitError, Scm};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Xml(#[from] quick_xml::DeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn gather_current_revisions(
    scm: &dyn Scm,
    ctx: &WorkspaceContext,
    universe: &ResolvedUniverse,
) -> Result<IndexMap<ProjectKey, String>, GitError> {
    let mut revisions = IndexMap::new();
    for (key, project) in &universe.projects {
        let path = ctx.project_path(&project.path);
        revisions.insert(key.clone(), scm.current_revision(&path)?);
    }
    Ok(revisions)
}

pub fn create(
    scm: &dyn Scm,
    ctx: &WorkspaceContext,
    universe: &ResolvedUniverse,
    dest: &std::path::Path,
    also_source_manifest: Option<&std::path::Path>,
) -> Result<(), SnapshotError> {
    let revisions = gather_current_revisions(scm, ctx, universe)?;
    let snapshot = build_snapshot(universe, &revisions);
    std::fs::write(dest, snapshot.to_xml()?)?;

    if let Some(source_manifest_dest) = also_source_manifest {
        let source_manifest = build_source_manifest(universe, &revisions);
        let serialized = serde_json::to_string_pretty(&source_manifest)
            .expect("SourceManifest serialization cannot fail");
        std::fs::write(source_manifest_dest, serialized)?;
    }
    Ok(())
}

pub fn load_source_manifest(path: &std::path::Path) -> Result<SourceManifest, SnapshotError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents).unwrap_or_default())
}

pub fn diff(old_path: &std::path::Path, new_path: &std::path::Path) -> Result<SnapshotDiff, SnapshotError> {
    let old = Manifest::parse(&std::fs::read_to_string(old_path)?)?;
    let new = Manifest::parse(&std::fs::read_to_string(new_path)?)?;
    Ok(diff_snapshots(&old, &new))
}

/// One commit the Gerrit CL walk surfaced between an updated project's old
/// and new pinned revision (`spec.md` §4.9, "Diff two snapshots").
pub struct ClEntry {
    pub commit: String,
    pub number: u64,
    pub subject: String,
    pub url: String,
}

pub struct ProjectClWalk {
    pub project: String,
    pub cls: Vec<ClEntry>,
    pub has_more: bool,
}

/// Walks Gerrit commits between each updated project's old and new
/// revision, up to `max_cls` newest-first, reporting whether more exist
/// (`spec.md` §4.9). Reuses the already-checked-out working tree to list
/// commit hashes (`Scm::extra_commits`) and Gerrit to resolve each hash to
/// a change (`GerritClient::change_by_commit`).
pub fn walk_cls(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    new_manifest: &Manifest,
    updated: &[(ProjectKey, String, String)],
    default_host: Option<&str>,
    max_cls: usize,
) -> Vec<ProjectClWalk> {
    let mut walks = Vec::new();
    for (key, old_revision, new_revision) in updated {
        let Some(project) = new_manifest.projects.project.iter().find(|p| &p.key() == key) else {
            continue;
        };
        let Some(host) = project.gerrit_host.as_deref().or(default_host) else {
            walks.push(ProjectClWalk {
                project: key.name.clone(),
                cls: Vec::new(),
                has_more: false,
            });
            continue;
        };

        let path = ctx.project_path(&project.path);
        let commits = match scm.extra_commits(&path, new_revision, old_revision) {
            Ok(commits) => commits,
            Err(_) => {
                walks.push(ProjectClWalk {
                    project: key.name.clone(),
                    cls: Vec::new(),
                    has_more: false,
                });
                continue;
            }
        };
        let has_more = commits.len() > max_cls;

        let mut cls = Vec::new();
        for commit in commits.into_iter().take(max_cls) {
            match gerrit.change_by_commit(host, &project.name, &commit) {
                Ok(Some(change)) => cls.push(ClEntry {
                    commit,
                    number: change.number,
                    subject: change.subject,
                    url: format!("{host}/c/{}/+/{}", project.name, change.number),
                }),
                Ok(None) | Err(_) => {
                    let subject = scm
                        .commit_msg(&path, &commit)
                        .ok()
                        .and_then(|msg| msg.lines().next().map(str::to_string))
                        .unwrap_or_default();
                    cls.push(ClEntry {
                        commit,
                        number: 0,
                        subject,
                        url: String::new(),
                    });
                }
            }
        }
        walks.push(ProjectClWalk {
            project: key.name.clone(),
            cls,
            has_more,
        });
    }
    walks
}
