//! runsync-transport: rsync transport and transfer policy
//!
//! Runs the external transfer tool against one run directory at a time and
//! decides when a run may be marked as fully transferred.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use color_eyre::Result;

pub mod local;
pub mod rsync;
pub mod runner;
pub mod scanner;

pub use local::{RecordingTransport, Scripted};
pub use rsync::RsyncTransport;
pub use runner::{RunState, SyncOutcome, TransferRunner};
pub use scanner::{RunScanner, ScanReport};

/// Whether a successful transfer may mark the run as done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// The run may still be growing; copy what exists so far
    Incremental,
    /// The run is complete; success writes the completion marker
    Final,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incremental => f.write_str("incremental"),
            Self::Final => f.write_str("final"),
        }
    }
}

/// Result of one transfer process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutput {
    /// Exit code, `None` if the process was killed
    pub exit_code: Option<i32>,
    /// The overall timeout expired and the process was killed
    pub timed_out: bool,
    /// Combined stdout and stderr, in arrival order
    pub lines: Vec<String>,
}

impl TransferOutput {
    /// Process exited by itself with code 0
    #[must_use]
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// A tool that copies one run directory to the configured destination.
///
/// A non-zero exit or a timeout is reported through [`TransferOutput`];
/// `Err` is reserved for failures to run the tool at all.
#[async_trait]
pub trait Transfer: Send + Sync {
    async fn transfer(&self, source: &Path, mode: TransferMode) -> Result<TransferOutput>;
}

#[async_trait]
impl<T: Transfer + ?Sized> Transfer for &T {
    async fn transfer(&self, source: &Path, mode: TransferMode) -> Result<TransferOutput> {
        (**self).transfer(source, mode).await
    }
}
