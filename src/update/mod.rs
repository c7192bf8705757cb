//! Per-project update algorithm and whole-workspace reconciliation
//! (`spec.md` §4.4).

pub mod plan;

use indexmap::IndexMap;
use jiri_manifest::{Hook, Project, ProjectKey};
use tracing::{info, info_span, warn};

use crate::cache::ObjectCache;
use crate::context::WorkspaceContext;
use crate::git::{CheckoutOpts, CloneOpts, FetchOpts, GitError, Scm};
use crate::hooks::HookRunner;
use plan::{classify, ordering_levels, Operation, PlannedProject};

const JIRI_HEAD_REF: &str = "refs/jiri/head";

#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateFlags {
    pub gc: bool,
    pub local_manifest: bool,
    pub rebase_tracked: bool,
    pub rebase_untracked: bool,
    pub rebase_all: bool,
    pub run_hooks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectOutcome {
    Ok,
    Warning(String),
}

pub struct UpdateReport {
    pub outcomes: Vec<(String, ProjectOutcome)>,
}

/// Runs one full update: classifies the plan, executes delete/move before
/// create, then update, within each level bounding concurrency by
/// `ctx.parallelism` (`spec.md` §4.4, "Ordering invariants").
pub fn run_update(
    ctx: &WorkspaceContext,
    scm: &dyn Scm,
    cache: &ObjectCache,
    local: &IndexMap<ProjectKey, String>,
    universe: &IndexMap<ProjectKey, Project>,
    hooks: &IndexMap<(String, String), Hook>,
    flags: UpdateFlags,
) -> UpdateReport {
    let planned = classify(local, universe, flags.gc);
    let levels = ordering_levels(planned);

    let mut outcomes = Vec::new();
    for level in levels {
        let (_, errors) = crate::parallel::run_over_projects(
            level,
            ctx.parallelism,
            |p: &PlannedProject| p.key.name.clone(),
            |p| apply(ctx, scm, cache, p, flags).map_err(anyhow::Error::from),
        );
        if let Some(errors) = errors {
            for failure in errors.failures {
                ctx.record_failure();
                outcomes.push((failure.project, ProjectOutcome::Warning(failure.source.to_string())));
            }
        }
    }

    if flags.run_hooks {
        let runner = HookRunner::new(ctx.hook_timeout_secs);
        for project in universe.values() {
            let project_hooks: Vec<&Hook> = hooks
                .values()
                .filter(|h| h.project_name == project.name)
                .collect();
            for hook in project_hooks {
                if let Err(e) = runner.run(ctx, project, hook) {
                    ctx.record_failure();
                    outcomes.push((project.name.clone(), ProjectOutcome::Warning(e.to_string())));
                }
            }
        }
    }

    UpdateReport { outcomes }
}

fn apply(
    ctx: &WorkspaceContext,
    scm: &dyn Scm,
    cache: &ObjectCache,
    planned: &PlannedProject,
    flags: UpdateFlags,
) -> Result<(), GitError> {
    match &planned.op {
        Operation::Nullop => Ok(()),
        Operation::Delete => delete_project(ctx, scm, planned),
        Operation::Move { old_path } => move_project(ctx, old_path, planned),
        Operation::Create | Operation::Update => {
            let project = planned.project.as_ref().expect("create/update always has a project");
            update_one(ctx, scm, cache, project, flags)
        }
    }
}

fn update_one(
    ctx: &WorkspaceContext,
    scm: &dyn Scm,
    cache: &ObjectCache,
    project: &Project,
    flags: UpdateFlags,
) -> Result<(), GitError> {
    let _span = info_span!("update", project = project.name.as_str()).entered();

    let local_config = ctx.load_local_config(&project.path);
    if local_config.ignore {
        info!("skipping (local-config.ignore)");
        return Ok(());
    }

    let path = ctx.project_path(&project.path);
    if !path.join(".git").exists() {
        info!("creating working tree");
        let cached = cache.ensure_and_update(scm, &project.remote, non_empty(&project.revision))?;
        scm.clone(
            &project.remote,
            &path,
            CloneOpts {
                reference_cache: Some(cached.as_path()),
                no_checkout: false,
                omit_blobs: false,
                depth: project.history_depth,
            },
        )?;
    }

    if local_config.no_update {
        info!("skipping working-tree update (local-config.no-update)");
        return Ok(());
    }

    scm.fetch(
        &path,
        "origin",
        None,
        FetchOpts {
            tags: false,
            prune: true,
            depth: 0,
            update_shallow: project.history_depth > 0,
        },
    )?;

    let target_revision = if project.is_pinned() {
        project.revision.clone()
    } else {
        scm.current_revision_of_branch(&path, &format!("origin/{}", project.remote_branch))?
    };

    write_jiri_head(scm, &path, &target_revision)?;

    if scm.has_uncommitted(&path)? || scm.has_untracked(&path)? {
        warn!("working tree is dirty, leaving untouched");
        return Err(GitError::WouldClobber {
            path: project.path.clone(),
            rev: target_revision,
        });
    }

    let allow_rebase = !local_config.no_rebase;
    let current_branch = scm.current_branch(&path)?;

    match current_branch {
        None => {
            scm.checkout(&path, &target_revision, CheckoutOpts { detach: true })?;
        }
        Some(branch) if branch == project.remote_branch => {
            if allow_rebase && (flags.rebase_tracked || flags.rebase_all) {
                rebase_or_warn(scm, &path, &target_revision)?;
            } else {
                let head = scm.current_revision(&path)?;
                if head != target_revision {
                    warn!(branch, "tracked branch is behind manifest revision");
                }
            }
        }
        Some(_untracked) => {
            if allow_rebase && (flags.rebase_untracked || flags.rebase_all) {
                rebase_or_warn(scm, &path, &target_revision)?;
            }
        }
    }

    Ok(())
}

fn rebase_or_warn(scm: &dyn Scm, path: &std::path::Path, onto: &str) -> Result<(), GitError> {
    if let Err(e) = scm.rebase(path, onto) {
        warn!(error = %e, "rebase failed, aborting and leaving branch untouched");
        let _ = scm.rebase_abort(path);
    }
    Ok(())
}

fn write_jiri_head(scm: &dyn Scm, path: &std::path::Path, revision: &str) -> Result<(), GitError> {
    scm.update_ref(path, JIRI_HEAD_REF, revision)
}

fn move_project(ctx: &WorkspaceContext, old_path: &str, planned: &PlannedProject) -> Result<(), GitError> {
    let project = planned.project.as_ref().expect("move always has a target project");
    let from = ctx.project_path(old_path);
    let to = ctx.project_path(&project.path);
    info!(from = %from.display(), to = %to.display(), "moving project");

    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(&from, &to) {
        Ok(()) => Ok(()),
        Err(_) => {
            // Cross-filesystem rename: fall back to copy + remove
            // (`spec.md` §4.4, "Move").
            copy_dir_recursive(&from, &to)?;
            std::fs::remove_dir_all(&from)?;
            Ok(())
        }
    }
}

fn copy_dir_recursive(from: &std::path::Path, to: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

fn delete_project(ctx: &WorkspaceContext, scm: &dyn Scm, planned: &PlannedProject) -> Result<(), GitError> {
    let relative = planned.local_path.as_ref().expect("delete always has a local path");
    let path = ctx.project_path(relative);

    let branches = scm.branch_list(&path)?;
    let merged = scm.merged_branches(&path, JIRI_HEAD_REF)?;
    let safe_to_delete = branches
        .iter()
        .all(|b| b == "master" || b == "main" || merged.contains(b));
    if !safe_to_delete || scm.has_uncommitted(&path)? || scm.has_untracked(&path)? {
        warn!(project = relative.as_str(), "refusing to delete: local branches or changes present");
        return Err(GitError::WouldClobber {
            path: path.display().to_string(),
            rev: "gc".to_string(),
        });
    }

    info!(project = relative.as_str(), "deleting project");
    std::fs::remove_dir_all(&path)?;
    Ok(())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use jiri_manifest::project::LocalConfig;

    use crate::git::fake::{FakeRepo, FakeScm};

    use super::*;

    fn project(path: &str, revision: &str) -> Project {
        Project {
            name: "p".into(),
            remote: "https://example.com/p.git".into(),
            path: path.into(),
            revision: revision.into(),
            remote_branch: "master".into(),
            gerrit_host: None,
            githooks_path: None,
            history_depth: 0,
            attributes: BTreeSet::new(),
            git_submodules: false,
            manifest_path: String::new(),
            local_config: LocalConfig::default(),
        }
    }

    #[test]
    fn update_one_clones_and_checks_out_pinned_revision() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let cache = ObjectCache::new(ctx.object_cache_dir());
        let scm = FakeScm::new();
        let project = project("proj", "deadbeef");

        update_one(&ctx, &scm, &cache, &project, UpdateFlags::default()).unwrap();

        let path = ctx.project_path(&project.path);
        assert_eq!(scm.current_revision(&path).unwrap(), "deadbeef");
        assert_eq!(scm.rev_parse(&path, JIRI_HEAD_REF).unwrap(), "deadbeef");
    }

    #[test]
    fn update_one_rebases_tracked_branch_when_requested() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let cache = ObjectCache::new(ctx.object_cache_dir());
        let scm = FakeScm::new();
        let project = project("proj", "");

        let path = ctx.project_path(&project.path);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        let mut repo = FakeRepo {
            head: Some("master".into()),
            ..Default::default()
        };
        repo.branches.insert("master".into(), "old".into());
        repo.branches.insert("origin/master".into(), "new".into());
        scm.seed(&path, repo);

        let flags = UpdateFlags {
            rebase_tracked: true,
            ..Default::default()
        };
        update_one(&ctx, &scm, &cache, &project, flags).unwrap();

        assert_eq!(scm.rev_parse(&path, JIRI_HEAD_REF).unwrap(), "new");
    }

    #[test]
    fn update_one_refuses_when_tree_is_dirty() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let cache = ObjectCache::new(ctx.object_cache_dir());
        let scm = FakeScm::new();
        let project = project("proj", "");

        let path = ctx.project_path(&project.path);
        std::fs::create_dir_all(path.join(".git")).unwrap();
        let mut repo = FakeRepo {
            head: Some("master".into()),
            uncommitted: true,
            ..Default::default()
        };
        repo.branches.insert("master".into(), "old".into());
        repo.branches.insert("origin/master".into(), "new".into());
        scm.seed(&path, repo);

        let err = update_one(&ctx, &scm, &cache, &project, UpdateFlags::default()).unwrap_err();
        assert!(matches!(err, GitError::WouldClobber { .. }));
    }

    #[test]
    fn gc_delete_refuses_when_branch_not_merged_into_jiri_head() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let scm = FakeScm::new();
        let path = ctx.project_path("proj");
        let mut repo = FakeRepo::default();
        repo.branches.insert("master".into(), "m".into());
        repo.branches.insert("topic".into(), "unmerged".into());
        scm.seed(&path, repo);
        std::fs::create_dir_all(&path).unwrap();

        let planned = PlannedProject {
            key: ProjectKey::new("p", "https://example.com/p.git"),
            op: Operation::Delete,
            project: None,
            local_path: Some("proj".into()),
        };
        let err = delete_project(&ctx, &scm, &planned).unwrap_err();
        assert!(matches!(err, GitError::WouldClobber { .. }));
        assert!(path.exists());
    }

    #[test]
    fn gc_delete_allows_branch_merged_into_jiri_head() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let scm = FakeScm::new();
        let path = ctx.project_path("proj");
        let mut repo = FakeRepo::default();
        repo.branches.insert("master".into(), "m".into());
        repo.branches.insert("topic".into(), JIRI_HEAD_REF.into());
        scm.seed(&path, repo);
        std::fs::create_dir_all(&path).unwrap();

        let planned = PlannedProject {
            key: ProjectKey::new("p", "https://example.com/p.git"),
            op: Operation::Delete,
            project: None,
            local_path: Some("proj".into()),
        };
        delete_project(&ctx, &scm, &planned).unwrap();
        assert!(!path.exists());
    }
}
