//! Batch scan of a base directory
//!
//! Runs are handled one at a time. A failure in one run is logged and never
//! stops the rest of the batch.

use std::path::Path;

use color_eyre::Result;
use tracing::{debug, error};

use runsync_core::discover_runs;

use crate::runner::{RunState, TransferRunner};
use crate::{Transfer, TransferMode};

/// Counts from one pass over the base directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Final transfers that succeeded and wrote the marker
    pub finalized: usize,
    /// Incremental transfers that succeeded
    pub incremental: usize,
    /// Transfers that failed, timed out or errored
    pub failed: usize,
    /// Runs skipped because the marker already exists
    pub already_synced: usize,
}

impl ScanReport {
    /// Runs a transfer was attempted for
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.finalized + self.incremental + self.failed
    }
}

/// Walks a base directory and syncs every run not yet marked
pub struct RunScanner<T> {
    runner: TransferRunner<T>,
}

impl<T: Transfer> RunScanner<T> {
    #[must_use]
    pub fn new(runner: TransferRunner<T>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn runner(&self) -> &TransferRunner<T> {
        &self.runner
    }

    /// Sync every unmarked run directly under `base_dir`.
    ///
    /// # Errors
    /// Returns an error only if `base_dir` cannot be listed
    pub async fn scan(&self, base_dir: &Path) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for run in discover_runs(base_dir)? {
            if run.is_synced() {
                debug!("Skipping {}: already synced", run.path().display());
                report.already_synced += 1;
                continue;
            }

            match self.runner.sync(&run, TransferMode::Incremental).await {
                Ok(outcome) => match outcome.state {
                    RunState::Done => report.finalized += 1,
                    RunState::Incremental => report.incremental += 1,
                    _ => report.failed += 1,
                },
                Err(e) => {
                    error!("Sync {} failed: {e:#}", run.path().display());
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
