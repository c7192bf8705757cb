//! Pushing a local branch to Gerrit for review (`spec.md` §4.8).

use jiri_manifest::Project;
use thiserror::Error;

use crate::context::WorkspaceContext;
use crate::gerrit::GerritClient;
use crate::git::{GitError, Scm};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Gerrit(#[from] crate::gerrit::GerritError),

    #[error("working tree is dirty; refusing to rebase before upload")]
    DirtyRebase,

    #[error("project {0} has no configured gerrit-host")]
    NoGerritHost(String),
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub topic: Option<String>,
    pub reviewers: Vec<String>,
    pub cc: Vec<String>,
    pub rebase: bool,
    pub multipart: bool,
}

fn build_refspec(remote_branch: &str, opts: &UploadOptions) -> String {
    let mut refspec = format!("refs/for/{remote_branch}");
    let mut params = Vec::new();
    if let Some(topic) = &opts.topic {
        params.push(format!("topic={topic}"));
    }
    if !opts.reviewers.is_empty() {
        params.push(format!("r={}", opts.reviewers.join(",")));
    }
    if !opts.cc.is_empty() {
        params.push(format!("cc={}", opts.cc.join(",")));
    }
    if !params.is_empty() {
        refspec.push('%');
        refspec.push_str(&params.join(","));
    }
    refspec
}

fn upload_one(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    project: &Project,
    opts: &UploadOptions,
) -> Result<(), UploadError> {
    let path = ctx.project_path(&project.path);
    let host = project
        .gerrit_host
        .clone()
        .ok_or_else(|| UploadError::NoGerritHost(project.name.clone()))?;

    if opts.rebase {
        if scm.has_uncommitted(&path)? || scm.has_untracked(&path)? {
            return Err(UploadError::DirtyRebase);
        }
        let onto = format!("origin/{}", project.remote_branch);
        scm.rebase(&path, &onto)?;
    }

    let refspec = build_refspec(&project.remote_branch, opts);
    gerrit.push_refspec(&host, "HEAD", &refspec)?;
    Ok(())
}

/// Uploads the current branch for `project`, or (with `-multipart`) every
/// project on the current local branch (`spec.md` §4.8).
pub fn upload(
    scm: &dyn Scm,
    gerrit: &dyn GerritClient,
    ctx: &WorkspaceContext,
    project: &Project,
    all_projects: &[Project],
    opts: UploadOptions,
) -> Result<(), UploadError> {
    if !opts.multipart {
        return upload_one(scm, gerrit, ctx, project, &opts);
    }

    let path = ctx.project_path(&project.path);
    let current = scm.current_branch(&path)?;
    for candidate in all_projects {
        let candidate_path = ctx.project_path(&candidate.path);
        if scm.current_branch(&candidate_path)? == current {
            upload_one(scm, gerrit, ctx, candidate, &opts)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refspec_includes_topic_and_reviewers() {
        let opts = UploadOptions {
            topic: Some("my-topic".to_string()),
            reviewers: vec!["a@example.com".to_string()],
            cc: vec![],
            rebase: false,
            multipart: false,
        };
        assert_eq!(
            build_refspec("main", &opts),
            "refs/for/main%topic=my-topic,r=a@example.com"
        );
    }

    #[test]
    fn refspec_with_no_options_is_bare() {
        assert_eq!(build_refspec("main", &UploadOptions::default()), "refs/for/main");
    }
}
