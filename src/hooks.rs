//! Post-update hook runner, bound to a resolved project's working tree
//! (`spec.md` §4.4 step "run-hooks", §4.5 component table).

use std::process::Command;
use std::time::Duration;

use jiri_manifest::{Hook, Project};
use thiserror::Error;
use tracing::info_span;
use wait_timeout::ChildExt;

use crate::context::WorkspaceContext;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook {name} in project {project} timed out after {timeout_secs}s")]
    Timeout {
        name: String,
        project: String,
        timeout_secs: u64,
    },

    #[error("hook {name} in project {project} exited with status {status}")]
    NonZeroExit {
        name: String,
        project: String,
        status: i32,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct HookRunner {
    timeout: Duration,
}

impl HookRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn run(&self, ctx: &WorkspaceContext, project: &Project, hook: &Hook) -> Result<(), HookError> {
        let _span = info_span!("hook", project = project.name.as_str(), hook = hook.name.as_str()).entered();

        let project_path = ctx.project_path(&project.path);
        let action_path = project_path.join(&hook.action);

        let mut child = Command::new(&action_path).current_dir(&project_path).spawn()?;

        match child.wait_timeout(self.timeout)? {
            Some(status) if status.success() => Ok(()),
            Some(status) => Err(HookError::NonZeroExit {
                name: hook.name.clone(),
                project: project.name.clone(),
                status: status.code().unwrap_or(-1),
            }),
            None => {
                let _ = child.kill();
                Err(HookError::Timeout {
                    name: hook.name.clone(),
                    project: project.name.clone(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
