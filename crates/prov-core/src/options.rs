//! Execution options

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

/// Default upper bound on concurrent prefetches.
pub const DEFAULT_MAX_PARALLEL_FETCHES: usize = 4;

#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Reinstall components whose verification already passes.
    pub force: bool,
    /// Walk the plan and report what would happen without side effects.
    pub dry_run: bool,
    /// Bound on concurrent prefetches. Zero is treated as one.
    pub max_parallel_fetches: usize,
    /// Root of the per-component staging directories.
    pub staging_dir: PathBuf,
    /// Checked between components only; an open transaction always finishes.
    pub cancellation: CancellationToken,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            force: false,
            dry_run: false,
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            staging_dir: default_staging_dir(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl ExecutionOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_staging_dir(mut self, staging_dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = staging_dir.into();
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub(crate) fn fetch_permits(&self) -> usize {
        self.max_parallel_fetches.max(1)
    }
}

pub fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("prov-staging")
}
