use std::path::PathBuf;

use clap::Parser;
use miette::Result;
use regex::Regex;

mod branch;
mod cache;
mod cli;
mod config;
mod context;
mod edit;
mod error;
mod gerrit;
mod git;
mod grep;
mod hooks;
mod logging;
mod manifest_io;
mod packages;
mod parallel;
mod patch;
mod resolve;
mod runp;
mod scan;
mod snapshot_cmd;
mod status;
mod update;
mod upload;

use cli::{BranchArgs, Command, EditArgs, GrepArgs, PatchArgs, ResolveArgs, RunpArgs, SnapshotCommand, UpdateArgs, UploadArgs};
use config::WorkspaceConfig;
use context::WorkspaceContext;
use error::JiriError;
use git::gix_impl::GixScm;
use git::Scm;
use manifest_io::RealManifestIo;

/// Multi-repository workspace manager governed by an XML manifest graph
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(%e, "command failed");
            std::process::exit(e.exit_code());
        }
    }
}

fn run(command: Command) -> Result<(), JiriError> {
    let cwd = std::env::current_dir()?;
    let root = WorkspaceContext::discover(&cwd).ok_or(JiriError::NotInWorkspace)?;
    let ctx = WorkspaceContext::new(root, num_cpus_hint());
    let scm = GixScm::new();
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());

    match command {
        Command::Update(args) => cmd_update(&ctx, &scm, &cache, args),
        Command::Status(args) => cmd_status(&ctx, &scm, args),
        Command::Branch(args) => cmd_branch(&ctx, &scm, args),
        Command::Patch(args) => cmd_patch(&ctx, &scm, args),
        Command::Upload(args) => cmd_upload(&ctx, &scm, args),
        Command::Snapshot(args) => cmd_snapshot(&ctx, &scm, args.command),
        Command::Diff(args) => cmd_diff(&ctx, &scm, args),
        Command::Grep(args) => cmd_grep(&ctx, args),
        Command::Runp(args) => cmd_runp(&ctx, args),
        Command::Resolve(args) => cmd_resolve(&ctx, &scm, &cache, args),
        Command::Edit(args) => cmd_edit(&scm, args),
    }
}

fn num_cpus_hint() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

fn current_universe(
    ctx: &WorkspaceContext,
    scm: &dyn Scm,
    cache: &cache::ObjectCache,
    local_manifest: bool,
) -> Result<jiri_manifest::loader::ResolvedUniverse, JiriError> {
    let mut io = RealManifestIo::new(ctx, scm, cache);
    resolve::resolve(
        &mut io,
        context::MANIFEST_FILE,
        resolve::ResolveOptions {
            local_manifest,
            enable_project_lock: true,
            enable_package_lock: true,
            allow_floating_refs: false,
        },
    )
    .map_err(|e| JiriError::ImportConflict(e.to_string()))
}

fn cmd_update(ctx: &WorkspaceContext, scm: &dyn Scm, cache: &cache::ObjectCache, args: UpdateArgs) -> Result<(), JiriError> {
    let universe = current_universe(ctx, scm, cache, args.local_manifest)?;
    let local = scan::load(ctx);

    let flags = update::UpdateFlags {
        gc: args.gc,
        local_manifest: args.local_manifest,
        rebase_tracked: args.rebase_tracked,
        rebase_untracked: args.rebase_untracked,
        rebase_all: args.rebase_all,
        run_hooks: true,
    };

    let report = update::run_update(ctx, scm, cache, &local, &universe.projects, &universe.hooks, flags);
    let mut failures = Vec::new();
    for (project, outcome) in report.outcomes {
        if let update::ProjectOutcome::Warning(msg) = outcome {
            tracing::warn!(project = project.as_str(), "{msg}");
            failures.push(parallel::ProjectFailure {
                project,
                source: anyhow::anyhow!(msg),
            });
        }
    }

    if args.fetch_packages {
        if let Ok(tool) = packages::CipdTool::new() {
            let failures = packages::fetch_packages(ctx, &tool, universe.packages.values().cloned());
            for (name, err) in failures {
                tracing::warn!(package = name.as_str(), "{err}");
                ctx.record_failure();
            }
        }
    }

    scan::save(ctx, &scan::rebuild_from_universe(&universe))?;

    let history_dir = ctx.update_history_dir();
    std::fs::create_dir_all(&history_dir)?;
    snapshot_cmd::create(scm, ctx, &universe, &history_dir.join("latest.xml"), None)
        .map_err(|e| JiriError::FatalInternal(e.to_string()))?;

    if let Some(aggregate) = parallel::MultiError::from_failures(failures) {
        return Err(JiriError::Aggregate(aggregate));
    }
    Ok(())
}

fn resolved_projects(ctx: &WorkspaceContext, scm: &dyn Scm, cache: &cache::ObjectCache) -> Result<Vec<jiri_manifest::Project>, JiriError> {
    let universe = current_universe(ctx, scm, cache, false)?;
    Ok(universe.projects.into_values().collect())
}

fn cmd_status(ctx: &WorkspaceContext, scm: &dyn Scm, args: cli::StatusArgs) -> Result<(), JiriError> {
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, scm, &cache)?;
    let opts = status::StatusOptions {
        changes: args.changes,
        commits: args.commits,
        check_head: args.check_head,
        branch: args.branch,
    };

    for status in status::status_all(ctx, scm, &projects, opts) {
        let mut line = format!("{} {:?}", status.project, status.status);
        if opts.branch {
            line.push_str(&format!(" branch={}", status.branch.as_deref().unwrap_or("(detached)")));
        }
        if opts.commits {
            line.push_str(&format!(" ahead={}", status.commits_ahead));
        }
        if !status.on_jiri_head {
            line.push_str(" (not on JIRI_HEAD)");
        }
        println!("{line}");
    }
    Ok(())
}

fn cmd_branch(ctx: &WorkspaceContext, scm: &dyn Scm, args: BranchArgs) -> Result<(), JiriError> {
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, scm, &cache)?;

    if args.delete_merged {
        for project in &projects {
            match branch::delete_merged(scm, ctx, project) {
                Ok(deleted) => deleted.iter().for_each(|b| println!("{}: deleted {b}", project.name)),
                Err(e) => tracing::warn!(project = project.name.as_str(), "{e}"),
            }
        }
        return Ok(());
    }

    if let Some(name) = &args.name {
        if args.delete || args.force_delete {
            for project in &projects {
                if branch::delete_by_name(scm, ctx, project, name, args.force_delete, args.override_pc).is_ok() {
                    println!("{}: deleted {name}", project.name);
                }
            }
            return Ok(());
        }
    }

    for entry in branch::list(scm, ctx, &projects).map_err(JiriError::Git)? {
        println!("{} {:?} {:?}", entry.project, entry.current, entry.branches);
    }
    Ok(())
}

fn cmd_patch(ctx: &WorkspaceContext, scm: &dyn Scm, args: PatchArgs) -> Result<(), JiriError> {
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, scm, &cache)?;
    let config = WorkspaceConfig::load(ctx)?;
    let host = args
        .host
        .or(config.gerrit_host)
        .ok_or_else(|| JiriError::Usage("no gerrit host: pass -host or set it in the workspace config".to_string()))?;
    let gerrit_client = gerrit::HttpGerritClient::new();
    let opts = patch::PatchOptions {
        no_branch: args.no_branch,
        delete: false,
        force: false,
        cherry_pick: args.cherry_pick,
        rebase_after: args.rebase,
    };

    if args.topic {
        let failures = patch::apply_topic(scm, &gerrit_client, ctx, &projects, &host, &args.change, opts);
        for (project, e) in &failures {
            tracing::warn!(project = project.as_str(), "{e}");
        }
        return Ok(());
    }

    patch::apply(scm, &gerrit_client, ctx, &projects, &host, &args.change, opts)
        .map_err(|e| JiriError::Hook(e.to_string()))
}

fn cmd_upload(ctx: &WorkspaceContext, scm: &dyn Scm, args: UploadArgs) -> Result<(), JiriError> {
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, scm, &cache)?;
    let gerrit_client = gerrit::HttpGerritClient::new();

    let cwd = std::env::current_dir()?;
    let project = projects
        .iter()
        .find(|p| cwd.ends_with(&p.path))
        .ok_or_else(|| JiriError::ProjectNotFound("current directory is not inside a known project".to_string()))?;

    let opts = upload::UploadOptions {
        topic: args.topic,
        reviewers: args.reviewers,
        cc: args.cc,
        rebase: args.rebase,
        multipart: args.multipart,
    };
    upload::upload(scm, &gerrit_client, ctx, project, &projects, opts).map_err(|e| JiriError::Hook(e.to_string()))
}

fn cmd_snapshot(ctx: &WorkspaceContext, scm: &dyn Scm, command: SnapshotCommand) -> Result<(), JiriError> {
    match command {
        SnapshotCommand::Create { dest } => {
            let cache = cache::ObjectCache::new(ctx.object_cache_dir());
            let universe = current_universe(ctx, scm, &cache, false)?;
            snapshot_cmd::create(scm, ctx, &universe, &PathBuf::from(dest), None)
                .map_err(|e| JiriError::FatalInternal(e.to_string()))
        }
        SnapshotCommand::Checkout { snapshot } => cmd_snapshot_checkout(ctx, scm, &snapshot),
        SnapshotCommand::List => {
            let dir = ctx.update_history_dir();
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    println!("{}", entry.path().display());
                }
            }
            Ok(())
        }
    }
}

/// `snapshot -checkout`: treats the snapshot file as the root manifest and
/// runs a regular update against it (`spec.md` §4.9, "Checkout snapshot").
fn cmd_snapshot_checkout(ctx: &WorkspaceContext, scm: &dyn Scm, snapshot: &str) -> Result<(), JiriError> {
    let contents = std::fs::read_to_string(snapshot)?;
    let manifest = jiri_manifest::Manifest::parse(&contents)?;

    let projects: indexmap::IndexMap<jiri_manifest::ProjectKey, jiri_manifest::Project> =
        manifest.projects.project.into_iter().map(|p| (p.key(), p)).collect();
    let hooks: indexmap::IndexMap<(String, String), jiri_manifest::Hook> =
        manifest.hooks.hook.into_iter().map(|h| (h.key(), h)).collect();

    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let local = scan::load(ctx);
    let flags = update::UpdateFlags {
        gc: false,
        local_manifest: false,
        rebase_tracked: false,
        rebase_untracked: false,
        rebase_all: false,
        run_hooks: true,
    };

    let report = update::run_update(ctx, scm, &cache, &local, &projects, &hooks, flags);
    let mut failures = Vec::new();
    for (project, outcome) in report.outcomes {
        if let update::ProjectOutcome::Warning(msg) = outcome {
            tracing::warn!(project = project.as_str(), "{msg}");
            failures.push(parallel::ProjectFailure {
                project,
                source: anyhow::anyhow!(msg),
            });
        }
    }

    scan::save(ctx, &scan::rebuild_from_projects(&projects))?;

    if let Some(aggregate) = parallel::MultiError::from_failures(failures) {
        return Err(JiriError::Aggregate(aggregate));
    }
    Ok(())
}

fn cmd_diff(ctx: &WorkspaceContext, scm: &dyn Scm, args: cli::DiffArgs) -> Result<(), JiriError> {
    let new_manifest = jiri_manifest::Manifest::parse(&std::fs::read_to_string(&args.snap2)?)?;
    let diff = snapshot_cmd::diff(&PathBuf::from(&args.snap1), &PathBuf::from(&args.snap2))
        .map_err(|e| JiriError::FatalInternal(e.to_string()))?;

    for key in &diff.new {
        println!("new: {}", key.name);
    }
    for key in &diff.deleted {
        println!("deleted: {}", key.name);
    }

    let host = args.host.or(WorkspaceConfig::load(ctx)?.gerrit_host);
    let gerrit_client = gerrit::HttpGerritClient::new();
    let walks = snapshot_cmd::walk_cls(scm, &gerrit_client, ctx, &new_manifest, &diff.updated, host.as_deref(), args.max_cls);

    for (walk, (key, old, new)) in walks.iter().zip(&diff.updated) {
        println!("updated: {} {old} -> {new}", key.name);
        for cl in &walk.cls {
            if cl.number != 0 {
                println!("  CL {}: {} ({})", cl.number, cl.subject, cl.url);
            } else {
                println!("  {}: {}", &cl.commit[..cl.commit.len().min(12)], cl.subject);
            }
        }
        if walk.has_more {
            println!("  ... and more CLs not shown (pass -max-cls to see more)");
        }
    }
    Ok(())
}

fn cmd_grep(ctx: &WorkspaceContext, args: GrepArgs) -> Result<(), JiriError> {
    let pattern = Regex::new(&args.pattern).map_err(|e| JiriError::Usage(e.to_string()))?;
    let scm = GixScm::new();
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, &scm, &cache)?;
    for project in &projects {
        if let Ok(matches) = grep::grep_project(ctx, project, &pattern) {
            for m in matches {
                println!("{}/{}:{}: {}", m.project, m.file, m.line_number, m.line);
            }
        }
    }
    Ok(())
}

fn cmd_runp(ctx: &WorkspaceContext, args: RunpArgs) -> Result<(), JiriError> {
    let scm = GixScm::new();
    let cache = cache::ObjectCache::new(ctx.object_cache_dir());
    let projects = resolved_projects(ctx, &scm, &cache)?;
    for project in &projects {
        if let Ok(output) = runp::run_in_project(ctx, project, &args.command, &args.args) {
            println!("== {} (exit {}) ==", output.project, output.status);
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
        }
    }
    Ok(())
}

fn cmd_resolve(ctx: &WorkspaceContext, scm: &dyn Scm, cache: &cache::ObjectCache, args: ResolveArgs) -> Result<(), JiriError> {
    let mut io = RealManifestIo::new(ctx, scm, cache);
    let universe = resolve::resolve(
        &mut io,
        context::MANIFEST_FILE,
        resolve::ResolveOptions {
            local_manifest: args.local_manifest,
            enable_project_lock: args.enable_project_lock,
            enable_package_lock: args.enable_package_lock,
            allow_floating_refs: args.allow_floating_refs,
        },
    )
    .map_err(|e| JiriError::ImportConflict(e.to_string()))?;

    println!("resolved {} project(s)", universe.projects.len());
    Ok(())
}

fn cmd_edit(scm: &dyn Scm, args: EditArgs) -> Result<(), JiriError> {
    let parse_pairs = |raw: &[String]| -> Vec<(String, String)> {
        raw.iter()
            .filter_map(|s| s.split_once('=').map(|(a, b)| (a.to_string(), b.to_string())))
            .collect()
    };
    let request = edit::EditRequest {
        project_revisions: parse_pairs(&args.project_revisions),
        import_revisions: parse_pairs(&args.import_revisions),
        package_versions: parse_pairs(&args.package_versions),
    };
    let mode = match args.edit_mode.as_str() {
        "lockfile" => edit::EditMode::Lockfile,
        "both" => edit::EditMode::Both,
        _ => edit::EditMode::Manifest,
    };
    edit::edit_file(scm, &PathBuf::from(&args.manifest), &request, mode)
        .map_err(|e| JiriError::FatalInternal(e.to_string()))
}
