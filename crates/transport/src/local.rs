//! Local in-process transport for testing
//!
//! `RecordingTransport` never touches the network. It records every call and
//! answers with a scripted result, so the transfer policy and the scanner can
//! be exercised without rsync.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use color_eyre::Result;

use crate::{Transfer, TransferMode, TransferOutput};

/// Scripted answer for a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Process exits with this code
    Exit(i32),
    /// Overall timeout expires
    TimedOut,
    /// The tool cannot be run at all
    Error(String),
}

/// Transport that records calls instead of copying anything
#[derive(Debug)]
pub struct RecordingTransport {
    default: Scripted,
    scripted: Mutex<HashMap<PathBuf, Scripted>>,
    calls: Mutex<Vec<(PathBuf, TransferMode)>>,
}

impl RecordingTransport {
    /// Transport where every transfer succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::with_default(Scripted::Exit(0))
    }

    /// Transport answering `default` for every source without a script
    #[must_use]
    pub fn with_default(default: Scripted) -> Self {
        Self {
            default,
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer transfers of `source` with `result`
    #[must_use]
    pub fn script(self, source: impl Into<PathBuf>, result: Scripted) -> Self {
        lock(&self.scripted).insert(source.into(), result);
        self
    }

    /// Every call made so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<(PathBuf, TransferMode)> {
        lock(&self.calls).clone()
    }

    /// Calls made for `source`
    #[must_use]
    pub fn calls_for(&self, source: &Path) -> Vec<TransferMode> {
        lock(&self.calls)
            .iter()
            .filter(|(path, _)| path == source)
            .map(|(_, mode)| *mode)
            .collect()
    }
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transfer for RecordingTransport {
    async fn transfer(&self, source: &Path, mode: TransferMode) -> Result<TransferOutput> {
        lock(&self.calls).push((source.to_path_buf(), mode));

        let result = lock(&self.scripted)
            .get(source)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match result {
            Scripted::Exit(code) => Ok(TransferOutput {
                exit_code: Some(code),
                timed_out: false,
                lines: vec![format!("sent {}", source.display())],
            }),
            Scripted::TimedOut => Ok(TransferOutput {
                exit_code: None,
                timed_out: true,
                lines: Vec::new(),
            }),
            Scripted::Error(message) => Err(color_eyre::eyre::eyre!(message)),
        }
    }
}

/// A panic while holding the lock only ever happens in a failing test
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
