//! Process-wide state threaded through every operation (`spec.md` §4,
//! "Workspace context"; §9 Design Notes, "Global mutable state").
//!
//! Created once in `main`, passed by reference everywhere else. Subsystems
//! never read `std::env` or other process globals at call sites — anything
//! environment-derived is captured here first.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use jiri_manifest::project::LocalConfig;

pub const METADATA_DIR: &str = ".jiri_root";
pub const MANIFEST_FILE: &str = ".jiri_manifest";
pub const BIN_DIR: &str = ".jiri_root/bin";
pub const UPDATE_HISTORY_DIR: &str = ".jiri_root/update_history";
pub const PROJECT_METADATA_DIR: &str = ".jiri";
pub const PROJECT_CONFIG_FILE: &str = ".jiri/config";

/// Everything downstream of `init` needs to know about where the workspace
/// lives and how aggressively to parallelize.
#[derive(Debug)]
pub struct WorkspaceContext {
    pub root: PathBuf,
    pub parallelism: usize,
    pub hook_timeout_secs: u64,
    failure_count: AtomicU32,
}

impl WorkspaceContext {
    pub fn new(root: PathBuf, parallelism: usize) -> Self {
        Self {
            root,
            parallelism: parallelism.max(1),
            hook_timeout_secs: 15 * 60,
            failure_count: AtomicU32::new(0),
        }
    }

    /// Finds the workspace root starting from `start`, walking upward until
    /// `.jiri_root` is found, honoring `JIRI_ROOT` first (`spec.md` §6,
    /// "Environment").
    pub fn discover(start: &Path) -> Option<PathBuf> {
        if let Ok(root) = std::env::var("JIRI_ROOT") {
            let path = PathBuf::from(root);
            if path.join(METADATA_DIR).is_dir() {
                return Some(path);
            }
        }
        let mut cursor = Some(start.to_path_buf());
        while let Some(dir) = cursor {
            if dir.join(METADATA_DIR).is_dir() {
                return Some(dir);
            }
            cursor = dir.parent().map(Path::to_path_buf);
        }
        None
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn update_history_dir(&self) -> PathBuf {
        self.root.join(UPDATE_HISTORY_DIR)
    }

    pub fn object_cache_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR).join("cache")
    }

    pub fn project_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn project_config_path(&self, relative: &str) -> PathBuf {
        self.project_path(relative).join(PROJECT_CONFIG_FILE)
    }

    pub fn load_local_config(&self, relative: &str) -> LocalConfig {
        let path = self.project_config_path(relative);
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| toml::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save_local_config(&self, relative: &str, config: &LocalConfig) -> std::io::Result<()> {
        let path = self.project_config_path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = toml::to_string_pretty(config).unwrap_or_default();
        std::fs::write(path, serialized)
    }

    /// Atomically bumps the failure counter (`spec.md` §5, "Global
    /// counters use atomic increments").
    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::SeqCst)
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_walks_up_to_metadata_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(METADATA_DIR)).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let found = WorkspaceContext::discover(&nested).unwrap();
        assert_eq!(found, dir.path());
    }

    #[test]
    fn failure_counter_is_atomic_and_monotonic() {
        let ctx = WorkspaceContext::new(PathBuf::from("/tmp/ws"), 4);
        assert!(!ctx.has_failures());
        ctx.record_failure();
        ctx.record_failure();
        assert_eq!(ctx.failure_count(), 2);
    }
}
