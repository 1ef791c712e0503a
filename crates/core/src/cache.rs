//! Marker cache seeding
//!
//! For first-time setup on a host whose historical runs already exist on the
//! destination: every current run is marked synced without transferring
//! anything, so only runs that appear afterwards get copied.

use std::path::Path;

use color_eyre::Result;
use tracing::{debug, info};

use crate::scan::discover_runs;

/// Create the completion marker in every valid run under `base_dir`.
///
/// Returns the number of runs marked. Runs that already carry a marker are
/// counted as well.
///
/// # Errors
/// Returns an error if `base_dir` cannot be listed or a marker cannot be
/// written
pub fn seed_markers(base_dir: &Path) -> Result<usize> {
    let runs = discover_runs(base_dir)?;
    for run in &runs {
        run.mark_synced()?;
        debug!("Marked {} as synced", run.path().display());
    }
    info!("Seeded {} sync markers under {}", runs.len(), base_dir.display());
    Ok(runs.len())
}
