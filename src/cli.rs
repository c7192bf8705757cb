//! Top-level clap surface (`spec.md` §6, "CLI surface (core-relevant
//! subset)"), generalizing the teacher's `Command` subcommand enum.

use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update working trees to match the resolved manifest
    Update(UpdateArgs),
    /// Show the working tree status of every project
    Status(StatusArgs),
    /// List, create, or delete development branches
    Branch(BranchArgs),
    /// Apply a Gerrit change to a local project
    Patch(PatchArgs),
    /// Push the current branch to Gerrit for review
    Upload(UploadArgs),
    /// Create, check out, or list pinned snapshots
    Snapshot(SnapshotArgs),
    /// Show the difference between two snapshots
    Diff(DiffArgs),
    /// Search every project's working tree for a pattern
    Grep(GrepArgs),
    /// Run a shell command in every project
    Runp(RunpArgs),
    /// Resolve the manifest graph without touching working trees
    Resolve(ResolveArgs),
    /// Edit pinned revisions in a manifest or lockfile
    Edit(EditArgs),
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long)]
    pub gc: bool,
    #[arg(long)]
    pub rebase_tracked: bool,
    #[arg(long)]
    pub rebase_untracked: bool,
    #[arg(long)]
    pub rebase_all: bool,
    #[arg(long)]
    pub local_manifest: bool,
    #[arg(long, default_value_t = 900)]
    pub hook_timeout: u64,
    #[arg(long)]
    pub fetch_packages: bool,
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub changes: bool,
    #[arg(long)]
    pub commits: bool,
    #[arg(long)]
    pub check_head: bool,
    #[arg(long)]
    pub branch: bool,
}

#[derive(Args, Debug)]
pub struct BranchArgs {
    pub name: Option<String>,
    #[arg(short = 'd')]
    pub delete: bool,
    #[arg(short = 'D')]
    pub force_delete: bool,
    #[arg(long)]
    pub delete_merged: bool,
    #[arg(long)]
    pub delete_merged_cl: bool,
    #[arg(long)]
    pub list: bool,
    #[arg(long)]
    pub override_pc: bool,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    pub change: String,
    #[arg(long)]
    pub topic: bool,
    #[arg(long)]
    pub cherry_pick: bool,
    #[arg(long)]
    pub no_branch: bool,
    #[arg(long)]
    pub rebase: bool,
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[arg(long)]
    pub multipart: bool,
    #[arg(long)]
    pub rebase: bool,
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long)]
    pub set_topic: bool,
    #[arg(short = 'r', long = "reviewer")]
    pub reviewers: Vec<String>,
    #[arg(long)]
    pub cc: Vec<String>,
    #[arg(long)]
    pub verify: bool,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    Create { dest: String },
    Checkout { snapshot: String },
    List,
}

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    #[command(subcommand)]
    pub command: SnapshotCommand,
}

#[derive(Args, Debug)]
pub struct DiffArgs {
    pub snap1: String,
    pub snap2: String,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, default_value_t = 5)]
    pub max_cls: usize,
}

#[derive(Args, Debug)]
pub struct GrepArgs {
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct RunpArgs {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(long)]
    pub local_manifest: bool,
    #[arg(long)]
    pub enable_project_lock: bool,
    #[arg(long)]
    pub enable_package_lock: bool,
    #[arg(long)]
    pub allow_floating_refs: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub manifest: String,
    #[arg(long = "project")]
    pub project_revisions: Vec<String>,
    #[arg(long = "import")]
    pub import_revisions: Vec<String>,
    #[arg(long = "package")]
    pub package_versions: Vec<String>,
    #[arg(long, default_value = "manifest")]
    pub edit_mode: String,
}
