//! runsync-core: run detection and bookkeeping
//!
//! Decides which directories are sequencing runs, whether the instrument has
//! finished them, and tracks which ones were fully transferred.

pub mod cache;
pub mod config;
pub mod run;
pub mod scan;

pub use cache::seed_markers;
pub use config::{SyncConfig, split_extra_args};
pub use run::{CompletionSignal, DEFAULT_STALE_AFTER, Run, SYNC_DONE_MARKER};
pub use scan::discover_runs;
