//! Bounded-parallelism substrate every per-project operation runs on
//! (`spec.md` §4.5, "Parallel operation substrate").
//!
//! Operations (update, status, grep, runp, branch cleanup, ...) each map a
//! closure over a project list through [`run_over_projects`]. A custom
//! `rayon` thread pool caps concurrency to [`crate::context::WorkspaceContext::parallelism`]
//! instead of rayon's default of "one thread per core", since the work here
//! is I/O-bound (git network calls, subprocess spawns) rather than CPU-bound.

use std::fmt;

use rayon::prelude::*;
use thiserror::Error;

/// One project's failure, collected rather than propagated immediately so
/// that a single broken project doesn't abort the whole operation
/// (`spec.md` §4.5, "Failure isolation").
#[derive(Debug, Error)]
#[error("{project}: {source}")]
pub struct ProjectFailure {
    pub project: String,
    #[source]
    pub source: anyhow::Error,
}

/// Aggregate of every project-level failure from one parallel operation.
/// Reported as a single [`crate::error::JiriError::Aggregate`] so the CLI
/// can print each failure and still return one process exit code.
#[derive(Debug)]
pub struct MultiError {
    pub failures: Vec<ProjectFailure>,
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} project(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            writeln!(f, "  {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl MultiError {
    pub fn from_failures(failures: Vec<ProjectFailure>) -> Option<Self> {
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }
}

/// Runs `op` over every item in `items` using a pool capped at
/// `parallelism` threads, collecting per-item failures instead of
/// short-circuiting on the first one.
///
/// `label` extracts the human-readable project name used in failure
/// reports; it's a separate closure so callers aren't forced to make `T`
/// itself `Display`.
pub fn run_over_projects<T, F, L>(
    items: Vec<T>,
    parallelism: usize,
    label: L,
    op: F,
) -> (usize, Option<MultiError>)
where
    T: Send,
    F: Fn(&T) -> anyhow::Result<()> + Sync,
    L: Fn(&T) -> String + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism.max(1))
        .build()
        .expect("failed to build parallel operation thread pool");

    let results: Vec<Result<(), ProjectFailure>> = pool.install(|| {
        items
            .par_iter()
            .map(|item| {
                op(item).map_err(|source| ProjectFailure {
                    project: label(item),
                    source,
                })
            })
            .collect()
    });

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    let failures: Vec<_> = results.into_iter().filter_map(Result::err).collect();
    (succeeded, MultiError::from_failures(failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn collects_failures_without_aborting_other_projects() {
        let items = vec!["a", "b", "c"];
        let ran = AtomicUsize::new(0);
        let (succeeded, errors) = run_over_projects(
            items,
            2,
            |s: &&str| s.to_string(),
            |s| {
                ran.fetch_add(1, Ordering::SeqCst);
                if *s == "b" {
                    anyhow::bail!("broken checkout")
                }
                Ok(())
            },
        );
        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(succeeded, 2);
        let errors = errors.expect("b should have failed");
        assert_eq!(errors.failures.len(), 1);
        assert_eq!(errors.failures[0].project, "b");
    }

    #[test]
    fn empty_input_yields_no_error() {
        let (succeeded, errors) =
            run_over_projects(Vec::<&str>::new(), 4, |s: &&str| s.to_string(), |_| Ok(()));
        assert_eq!(succeeded, 0);
        assert!(errors.is_none());
    }
}
