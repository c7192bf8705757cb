//! `jiri runp`: run an arbitrary shell command in every project, in
//! parallel (`spec.md` §4.5, "Output streams").

use std::process::Command;

use jiri_manifest::Project;

use crate::context::WorkspaceContext;

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub project: String,
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` with `args` inside `project`'s working tree. Output is
/// buffered per task and replayed by the caller once the task completes,
/// rather than interleaved live (`spec.md` §4.5, "collated per task").
pub fn run_in_project(
    ctx: &WorkspaceContext,
    project: &Project,
    command: &str,
    args: &[String],
) -> std::io::Result<RunOutput> {
    let path = ctx.project_path(&project.path);
    let output = Command::new(command).args(args).current_dir(&path).output()?;
    Ok(RunOutput {
        project: project.name.clone(),
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
