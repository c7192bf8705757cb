//! CIPD-style binary package fetcher (`spec.md` §6 "Package", §4.4 flag
//! `fetch-packages`).
//!
//! `jiri`'s core only needs "ensure this package is present at this path at
//! this version"; the actual package tool is swappable behind
//! [`PackageTool`], the same way [`crate::git::Scm`] abstracts git.

use std::path::Path;
use std::process::Command;

use jiri_manifest::Package;
use thiserror::Error;
use tracing::{info, info_span};

use crate::context::WorkspaceContext;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("package tool `{command}` failed: {stderr}")]
    ToolFailed { command: String, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait PackageTool: Send + Sync {
    fn ensure(&self, name: &str, version: &str, dest: &Path) -> Result<(), PackageError>;
}

/// Shells out to `cipd ensure`, matching the one concrete external
/// dependency `spec.md` §1/§6 keeps at interface level only.
pub struct CipdTool {
    binary: String,
}

impl CipdTool {
    pub fn new() -> Result<Self, PackageError> {
        let path = which::which("cipd").map_err(|_| PackageError::ToolNotFound("cipd".to_string()))?;
        Ok(Self {
            binary: path.display().to_string(),
        })
    }
}

impl PackageTool for CipdTool {
    fn ensure(&self, name: &str, version: &str, dest: &Path) -> Result<(), PackageError> {
        std::fs::create_dir_all(dest)?;
        let spec = format!("{name} {version}");
        let output = Command::new(&self.binary)
            .args(["ensure", "-root"])
            .arg(dest)
            .args(["-ensure-file", "-"])
            .arg(format!("@Subdir .\n{spec}"))
            .output()?;

        if !output.status.success() {
            return Err(PackageError::ToolFailed {
                command: format!("cipd ensure {spec}"),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

fn current_platform() -> (&'static str, &'static str) {
    let os = if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "mac"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else {
        "unknown"
    };
    let arch = if cfg!(target_arch = "x86_64") {
        "amd64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "unknown"
    };
    (os, arch)
}

/// Resolves every package applicable to this host's platform into its
/// expanded destination and ensures it with `tool`.
pub fn fetch_packages(
    ctx: &WorkspaceContext,
    tool: &dyn PackageTool,
    packages: impl IntoIterator<Item = Package>,
) -> Vec<(String, PackageError)> {
    let (os, arch) = current_platform();
    let platform = format!("{os}-{arch}");

    let mut failures = Vec::new();
    for package in packages {
        if !package.applies_to_platform(&platform) {
            continue;
        }
        let _span = info_span!("package", name = package.name.as_str()).entered();
        let relative = jiri_manifest::package::expand_path_template(&package.path_template, os, arch);
        let dest = ctx.project_path(&relative);
        info!(version = package.version.as_str(), path = %dest.display(), "ensuring package");
        if let Err(e) = tool.ensure(&package.name, &package.version, &dest) {
            failures.push((package.name.clone(), e));
        }
    }
    failures
}
