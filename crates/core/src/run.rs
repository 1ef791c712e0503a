//! Sequencing run directories: validity, completion and the sync marker
//!
//! A run is recognised by its instrument layout and is considered finished
//! once the instrument drops a completion flag, or once `RunInfo.xml` has not
//! been touched for long enough that the run is assumed abandoned.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;

use crate::config::{DEFAULT_STALE_AFTER_DAYS, SECS_PER_DAY};

/// Subdirectory holding the instrument recipe
pub const RECIPE_DIR: &str = "Recipe";
/// Subdirectory holding the instrument config
pub const CONFIG_DIR: &str = "Config";
/// Run description written at the start of a run
pub const RUN_INFO: &str = "RunInfo.xml";
/// Flag written by RTA when primary analysis completes
pub const RTA_COMPLETE: &str = "RTAComplete.txt";
/// Status file written by newer instruments when the run ends
pub const RUN_COMPLETION_STATUS: &str = "RunCompletionStatus.xml";
/// Hidden marker meaning "fully and finally transferred"
pub const SYNC_DONE_MARKER: &str = ".sync.done";

/// Default age after which an untouched `RunInfo.xml` marks the run finished
pub const DEFAULT_STALE_AFTER: Duration =
    Duration::from_secs(DEFAULT_STALE_AFTER_DAYS * SECS_PER_DAY);

/// Which condition made a run count as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    /// `RTAComplete.txt` is present
    RtaComplete,
    /// `RunCompletionStatus.xml` is present
    CompletionStatus,
    /// `RunInfo.xml` is older than the staleness threshold
    StaleRunInfo,
}

impl fmt::Display for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RtaComplete => f.write_str(RTA_COMPLETE),
            Self::CompletionStatus => f.write_str(RUN_COMPLETION_STATUS),
            Self::StaleRunInfo => write!(f, "stale {RUN_INFO}"),
        }
    }
}

/// A candidate run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    path: PathBuf,
}

impl Run {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, used in log lines
    #[must_use]
    pub fn name(&self) -> String {
        self.path.file_name().map_or_else(
            || self.path.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }

    /// Path of the completion marker inside this run
    #[must_use]
    pub fn marker_path(&self) -> PathBuf {
        self.path.join(SYNC_DONE_MARKER)
    }

    /// Whether this directory looks like an instrument run.
    ///
    /// Any one of `Recipe/`, `Config/` or `RunInfo.xml` is enough.
    #[must_use]
    pub fn is_valid_run(&self) -> bool {
        self.path.join(RECIPE_DIR).exists()
            || self.path.join(CONFIG_DIR).exists()
            || self.path.join(RUN_INFO).exists()
    }

    /// Whether the instrument is done writing this run
    #[must_use]
    pub fn is_finished(&self, stale_after: Duration) -> bool {
        self.completion_signal(stale_after).is_some()
    }

    /// First completion condition that holds, checked in flag-file order
    #[must_use]
    pub fn completion_signal(&self, stale_after: Duration) -> Option<CompletionSignal> {
        if self.path.join(RTA_COMPLETE).exists() {
            return Some(CompletionSignal::RtaComplete);
        }
        if self.path.join(RUN_COMPLETION_STATUS).exists() {
            return Some(CompletionSignal::CompletionStatus);
        }
        self.run_info_is_stale(stale_after)
            .then_some(CompletionSignal::StaleRunInfo)
    }

    fn run_info_is_stale(&self, stale_after: Duration) -> bool {
        let Ok(modified) = std::fs::metadata(self.path.join(RUN_INFO)).and_then(|m| m.modified())
        else {
            return false;
        };
        // mtime in the future reads as zero age
        SystemTime::now()
            .duration_since(modified)
            .is_ok_and(|age| age > stale_after)
    }

    /// Whether the completion marker exists
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.marker_path().exists()
    }

    /// Create the completion marker. Content is irrelevant, only existence.
    ///
    /// # Errors
    /// Returns an error if the marker file cannot be created
    pub fn mark_synced(&self) -> Result<()> {
        let marker = self.marker_path();
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&marker)
            .wrap_err_with(|| format!("failed to create marker {}", marker.display()))?;
        Ok(())
    }
}
