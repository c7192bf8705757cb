//! Applying a Gerrit change to a local project (`spec.md` §4.7).

use jiri_manifest::Project;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::WorkspaceContext;
use crate::gerrit::{ChangeInfo, GerritClient};
use crate::git::{CheckoutOpts, GitError, Scm};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Gerrit(#[from] crate::gerrit::GerritError),

    #[error("no local project matches change project {0}")]
    NoMatchingProject(String),

    #[error("branch {0} already exists; pass -delete to replace it")]
    BranchExists(String),

    #[error("cherry-pick of {rev} onto {project} conflicted and was rolled back")]
    CherryPickConflict { project: String, rev: String },
}

pub struct PatchOptions {
    pub no_branch: bool,
    pub delete: bool,
    pub force: bool,
    pub cherry_pick: bool,
    pub rebase_after: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            no_branch: false,
            delete: false,
            force: false,
            cherry_pick: false,
            rebase_after: true,
        }
    }
}

/// Parses `refs/changes/NN/CCCC/PP` into `(change, patchset)`.
fn parse_change_ref(input: &str) -> Option<(String, String)> {
    let re = Regex::new(r"^refs/changes/\d+/(\d+)/(\d+)$").expect("static regex is valid");
    re.captures(input).map(|c| (c[1].to_string(), c[2].to_string()))
}

/// Picks the project whose remote URL matches the change's `project`
/// field, preferring one whose `gerrit-host` equals `host` (`spec.md`
/// §4.7 step 2).
fn locate_project<'a>(projects: &'a [Project], change_project: &str, host: &str) -> Option<&'a Project> {
    let candidates: Vec<&Project> = projects
        .iter()
        .filter(|p| p.remote.trim_end_matches('/').ends_with(change_project))
        .collect();

    candidates
        .iter()
        .find(|p| p.gerrit_host.as_deref() == Some(host))
        .or_else(|| candidates.first())
        .copied()
}

pub fn apply(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    projects: &[Project],
    host: &str,
    change_arg: &str,
    opts: PatchOptions,
) -> Result<(), PatchError> {
    let change = if let Some((cl, ps)) = parse_change_ref(change_arg) {
        info!(cl, ps, "resolved ref argument");
        gerrit.change_by_id(host, &cl)?
    } else {
        gerrit.change_by_id(host, change_arg)?
    };

    let project = locate_project(projects, &change.project, host)
        .ok_or_else(|| PatchError::NoMatchingProject(change.project.clone()))?;

    apply_one(scm, ctx, project, &change, &opts)
}

fn apply_one(
    scm: &dyn Scm,
    ctx: &WorkspaceContext,
    project: &Project,
    change: &ChangeInfo,
    opts: &PatchOptions,
) -> Result<(), PatchError> {
    let path = ctx.project_path(&project.path);
    let branch_name = format!("change/{}/{}", change.number, change.patchset);

    scm.fetch(&path, "origin", Some(&change.fetch_ref), Default::default())?;

    if opts.cherry_pick {
        if let Err(e) = scm.cherry_pick(&path, "FETCH_HEAD") {
            warn!(project = project.name.as_str(), error = %e, "cherry-pick conflicted, rolling back");
            scm.cherry_pick_abort(&path)?;
            return Err(PatchError::CherryPickConflict {
                project: project.name.clone(),
                rev: change.current_revision.clone(),
            });
        }
    } else if !opts.no_branch {
        let exists = scm.branch_exists(&path, &branch_name)?;
        if exists {
            if !opts.delete {
                return Err(PatchError::BranchExists(branch_name));
            }
            scm.delete_branch(&path, &branch_name, opts.force)?;
        }
        scm.create_branch(&path, &branch_name, "FETCH_HEAD")?;
        scm.checkout(&path, &branch_name, CheckoutOpts::default())?;
    } else {
        scm.checkout(&path, "FETCH_HEAD", CheckoutOpts { detach: true })?;
    }

    if opts.rebase_after {
        let onto = format!("origin/{}", project.remote_branch);
        scm.rebase(&path, &onto)?;
    }

    Ok(())
}

/// `-topic <name>`: apply every open change with that topic; conflicts on
/// one project don't halt the others (`spec.md` §4.7, "Topic mode").
pub fn apply_topic(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    projects: &[Project],
    host: &str,
    topic: &str,
    opts: PatchOptions,
) -> Vec<(String, PatchError)> {
    let changes = match gerrit.changes_by_topic(host, topic) {
        Ok(changes) => changes,
        Err(e) => return vec![(topic.to_string(), PatchError::Gerrit(e))],
    };

    let mut failures = Vec::new();
    for change in changes {
        let project = match locate_project(projects, &change.project, host) {
            Some(p) => p,
            None => {
                failures.push((change.project.clone(), PatchError::NoMatchingProject(change.project.clone())));
                continue;
            }
        };
        let per_change_opts = PatchOptions {
            no_branch: opts.no_branch,
            delete: opts.delete,
            force: opts.force,
            cherry_pick: opts.cherry_pick,
            rebase_after: opts.rebase_after,
        };
        if let Err(e) = apply_one(scm, ctx, project, &change, &per_change_opts) {
            failures.push((project.name.clone(), e));
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_change_ref() {
        assert_eq!(
            parse_change_ref("refs/changes/34/1234/5"),
            Some(("1234".to_string(), "5".to_string()))
        );
        assert_eq!(parse_change_ref("not-a-ref"), None);
    }
}
