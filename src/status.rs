//! `jiri status`: short status line per project (`spec.md` §4.1
//! `short-status`, §4.6 component table, §2 "commits ahead of remote?").

use jiri_manifest::Project;

use crate::context::WorkspaceContext;
use crate::git::{GitError, Scm, ShortStatus};

/// Flags wired from `StatusArgs` (`spec.md` §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusOptions {
    /// Only report projects with uncommitted or untracked changes.
    pub changes: bool,
    /// Compute how many commits the current branch is ahead of
    /// `origin/<remote-branch>`.
    pub commits: bool,
    /// Only report projects that are not checked out at `refs/jiri/head`.
    pub check_head: bool,
    /// Include the current branch name in the report.
    pub branch: bool,
}

#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub project: String,
    pub path: String,
    pub status: ShortStatus,
    pub on_jiri_head: bool,
    pub branch: Option<String>,
    pub commits_ahead: usize,
}

pub fn status_of(ctx: &WorkspaceContext, scm: &dyn Scm, project: &Project) -> Result<ProjectStatus, GitError> {
    let path = ctx.project_path(&project.path);
    let status = scm.short_status(&path)?;
    let current = scm.current_revision(&path)?;
    let jiri_head = scm.rev_parse(&path, "refs/jiri/head").unwrap_or_default();
    let branch = scm.current_branch(&path)?;

    let commits_ahead = if branch.is_some() {
        scm.extra_commits(&path, "HEAD", &format!("origin/{}", project.remote_branch))
            .map(|commits| commits.len())
            .unwrap_or(0)
    } else {
        0
    };

    Ok(ProjectStatus {
        project: project.name.clone(),
        path: project.path.clone(),
        on_jiri_head: !jiri_head.is_empty() && jiri_head == current,
        status,
        branch,
        commits_ahead,
    })
}

pub fn status_all(ctx: &WorkspaceContext, scm: &dyn Scm, projects: &[Project], opts: StatusOptions) -> Vec<ProjectStatus> {
    projects
        .iter()
        .filter_map(|p| status_of(ctx, scm, p).ok())
        .filter(|s| !opts.check_head || !s.on_jiri_head)
        .filter(|s| !opts.changes || s.status.has_uncommitted || s.status.has_untracked)
        .collect()
}
