//! Discovery of run directories under a base directory

use std::path::Path;

use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;
use tracing::debug;

use crate::run::Run;

/// List the valid runs directly under `base_dir`.
///
/// Entries that are not directories, or directories that do not look like a
/// run, are skipped. Results are sorted by path for deterministic ordering.
///
/// # Errors
/// Returns an error if `base_dir` cannot be listed
pub fn discover_runs(base_dir: &Path) -> Result<Vec<Run>> {
    let entries = std::fs::read_dir(base_dir)
        .wrap_err_with(|| format!("failed to list {}", base_dir.display()))?;

    let mut runs = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {e}", base_dir.display());
                continue;
            }
        };

        // Follows symlinks, so linked run directories are picked up
        if !path.is_dir() {
            continue;
        }

        let run = Run::new(path);
        if !run.is_valid_run() {
            debug!("Skipping {}: not a run directory", run.path().display());
            continue;
        }
        runs.push(run);
    }

    runs.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(runs)
}
