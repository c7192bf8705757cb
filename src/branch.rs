//! Branch hygiene operations (`spec.md` §4.6).

use jiri_manifest::Project;
use regex::Regex;
use tracing::{info, warn};

use crate::context::WorkspaceContext;
use crate::gerrit::{ChangeStatus, GerritClient};
use crate::git::{CheckoutOpts, GitError, Scm};

const MAX_EXTRA_COMMITS_FOR_CL_CHECK: usize = 10;

#[derive(Debug, Clone)]
pub struct ProjectBranches {
    pub project: String,
    pub current: Option<String>,
    pub branches: Vec<String>,
}

/// `jiri branch` with no argument: every project, non-`master` branches
/// only (`spec.md` §4.6, "List").
pub fn list(scm: &dyn Scm, ctx: &WorkspaceContext, projects: &[Project]) -> Result<Vec<ProjectBranches>, GitError> {
    let mut out = Vec::new();
    for project in projects {
        let path = ctx.project_path(&project.path);
        let all = scm.branch_list(&path)?;
        let non_master: Vec<String> = all.into_iter().filter(|b| b != "master" && b != "main").collect();
        if non_master.is_empty() {
            continue;
        }
        out.push(ProjectBranches {
            project: project.name.clone(),
            current: scm.current_branch(&path)?,
            branches: non_master,
        });
    }
    Ok(out)
}

/// `jiri branch -d/-D` (`spec.md` §4.6, "Delete by name").
pub fn delete_by_name(
    scm: &dyn Scm,
    ctx: &WorkspaceContext,
    project: &Project,
    name: &str,
    force: bool,
    override_project_config: bool,
) -> Result<(), GitError> {
    let local_config = ctx.load_local_config(&project.path);
    if (local_config.ignore || local_config.no_update) && !override_project_config {
        return Err(GitError::NoSuchBranch(format!(
            "{name}: project {} is ignore/no-update; pass override-project-config to force",
            project.name
        )));
    }
    let path = ctx.project_path(&project.path);
    scm.delete_branch(&path, name, force)
}

/// `jiri branch -delete-merged` (`spec.md` §4.6, "Delete merged").
pub fn delete_merged(scm: &dyn Scm, ctx: &WorkspaceContext, project: &Project) -> Result<Vec<String>, GitError> {
    let path = ctx.project_path(&project.path);
    let mut deleted = Vec::new();

    let tracking_remote_branch = format!("origin/{}", project.remote_branch);
    let current = scm.current_branch(&path)?;

    for branch in scm.branch_list(&path)? {
        if branch == "master" || branch == "main" {
            continue;
        }
        let merged = scm.merged_branches(&path, &tracking_remote_branch)?.contains(&branch);
        if !merged {
            continue;
        }

        let is_current = current.as_deref() == Some(branch.as_str());
        if is_current {
            scm.checkout(&path, "refs/jiri/head", CheckoutOpts { detach: true })?;
        }

        match scm.delete_branch(&path, &branch, true) {
            Ok(()) => deleted.push(branch),
            Err(e) if is_current => {
                warn!(branch = branch.as_str(), error = %e, "delete failed, restoring prior branch");
                scm.checkout(&path, &branch, CheckoutOpts::default())?;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(deleted)
}

fn change_id_of(message: &str) -> Option<String> {
    static PATTERN: &str = r"(?m)^Change-Id:\s*(I[0-9a-f]{40})\s*$";
    let re = Regex::new(PATTERN).expect("static regex is valid");
    re.captures(message).map(|c| c[1].to_string())
}

/// `jiri branch -delete-merged-cl` (`spec.md` §4.6, "Delete merged CLs").
pub fn delete_merged_cl(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    project: &Project,
    host: &str,
) -> Result<Vec<String>, GitError> {
    let path = ctx.project_path(&project.path);
    let tracking = format!("origin/{}", project.remote_branch);
    let mut deleted = Vec::new();

    for branch in scm.branch_list(&path)? {
        if branch == "master" || branch == "main" {
            continue;
        }
        let extra = scm.extra_commits(&path, &branch, &tracking)?;
        if extra.len() > MAX_EXTRA_COMMITS_FOR_CL_CHECK {
            info!(branch = branch.as_str(), "skipping: more than 10 extra commits");
            continue;
        }

        let mut missing_change_id = 0;
        let mut all_resolved = true;
        for commit in &extra {
            let msg = scm.commit_msg(&path, commit)?;
            match change_id_of(&msg) {
                None => missing_change_id += 1,
                Some(change_id) => {
                    let change = gerrit
                        .change_by_id(host, &change_id)
                        .map_err(|_| GitError::RevNotFound(change_id.clone()));
                    match change {
                        Ok(change) if change.status == ChangeStatus::Merged => {}
                        _ => {
                            all_resolved = false;
                            break;
                        }
                    }
                }
            }
        }

        if all_resolved && missing_change_id <= 1 {
            scm.delete_branch(&path, &branch, true)?;
            deleted.push(branch);
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use jiri_manifest::project::LocalConfig;

    use crate::git::fake::{FakeRepo, FakeScm};

    use super::*;

    fn project() -> Project {
        Project {
            name: "p".into(),
            remote: "https://example.com/p.git".into(),
            path: "proj".into(),
            revision: String::new(),
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
    fn delete_merged_removes_branch_merged_into_tracking_remote() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let scm = FakeScm::new();
        let project = project();
        let path = ctx.project_path(&project.path);

        let mut repo = FakeRepo {
            head: Some("other".into()),
            ..Default::default()
        };
        repo.branches.insert("master".into(), "m".into());
        repo.branches.insert("feature".into(), "origin/master".into());
        scm.seed(&path, repo);

        let deleted = delete_merged(&scm, &ctx, &project).unwrap();
        assert_eq!(deleted, vec!["feature".to_string()]);
        assert!(!scm.branch_exists(&path, "feature").unwrap());
    }

    #[test]
    fn delete_merged_leaves_unmerged_branch_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let scm = FakeScm::new();
        let project = project();
        let path = ctx.project_path(&project.path);

        let mut repo = FakeRepo {
            head: Some("feature".into()),
            ..Default::default()
        };
        repo.branches.insert("master".into(), "m".into());
        repo.branches.insert("feature".into(), "not_merged".into());
        scm.seed(&path, repo);

        let deleted = delete_merged(&scm, &ctx, &project).unwrap();
        assert!(deleted.is_empty());
        assert!(scm.branch_exists(&path, "feature").unwrap());
    }

    #[test]
    fn delete_merged_detaches_off_current_branch_before_deleting() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = WorkspaceContext::new(tmp.path().to_path_buf(), 1);
        let scm = FakeScm::new();
        let project = project();
        let path = ctx.project_path(&project.path);

        let mut repo = FakeRepo {
            head: Some("feature".into()),
            ..Default::default()
        };
        repo.branches.insert("master".into(), "m".into());
        repo.branches.insert("feature".into(), "origin/master".into());
        scm.seed(&path, repo);

        let deleted = delete_merged(&scm, &ctx, &project).unwrap();
        assert_eq!(deleted, vec!["feature".to_string()]);
        assert_eq!(scm.current_branch(&path).unwrap(), None);
    }

    #[test]
    fn extracts_change_id_footer() {
        let msg = "Fix thing\n\nChange-Id: I1234567890abcdef1234567890abcdef12345678\n";
        assert_eq!(
            change_id_of(msg),
            Some("I1234567890abcdef1234567890abcdef12345678".to_string())
        );
    }

    #[test]
    fn no_footer_is_none() {
        assert_eq!(change_id_of("just a commit message"), None);
    }
}
