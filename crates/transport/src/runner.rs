//! Two-phase transfer policy
//!
//! A run that is still being written is copied incrementally and never
//! marked. Once the instrument has finished, the next transfer runs in final
//! mode and a clean exit writes the completion marker. Every call makes
//! exactly one transfer.

use std::time::Duration;

use color_eyre::Result;
use tracing::{debug, info, warn};

use runsync_core::Run;

use crate::{Transfer, TransferMode, TransferOutput};

/// Where a run stands in one sync call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not started
    Pending,
    /// Transfer in flight
    Transferring(TransferMode),
    /// Incremental copy succeeded; the run is not finished yet
    Incremental,
    /// Final copy succeeded and the run is marked synced
    Done,
    /// Non-zero exit or timeout
    Failed,
}

impl RunState {
    /// Start a transfer in `mode`; only a pending run can start
    #[must_use]
    pub fn start(self, mode: TransferMode) -> Self {
        match self {
            Self::Pending => Self::Transferring(mode),
            other => other,
        }
    }

    /// State a transfer moves to once its output is known
    #[must_use]
    pub fn after_transfer(self, output: &TransferOutput) -> Self {
        match self {
            Self::Transferring(mode) if output.success() => match mode {
                TransferMode::Final => Self::Done,
                TransferMode::Incremental => Self::Incremental,
            },
            Self::Transferring(_) => Self::Failed,
            other => other,
        }
    }
}

/// Result of syncing one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Mode the transfer actually ran in
    pub mode: TransferMode,
    pub state: RunState,
    pub output: TransferOutput,
}

/// Applies the two-phase policy to single runs
pub struct TransferRunner<T> {
    transport: T,
    stale_after: Duration,
}

impl<T: Transfer> TransferRunner<T> {
    #[must_use]
    pub fn new(transport: T, stale_after: Duration) -> Self {
        Self {
            transport,
            stale_after,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Mode a transfer of `run` will use: finished runs are always final
    #[must_use]
    pub fn effective_mode(&self, run: &Run, requested: TransferMode) -> TransferMode {
        if requested == TransferMode::Final {
            return TransferMode::Final;
        }
        match run.completion_signal(self.stale_after) {
            Some(signal) => {
                debug!("{} is finished ({signal}), promoting to final", run.name());
                TransferMode::Final
            }
            None => TransferMode::Incremental,
        }
    }

    /// Transfer `run` once and write its marker if a final transfer
    /// succeeded.
    ///
    /// A non-zero exit or timeout is not an error; it shows up as
    /// [`RunState::Failed`].
    ///
    /// # Errors
    /// Returns an error if the transport cannot run or the marker cannot be
    /// written
    pub async fn sync(&self, run: &Run, requested: TransferMode) -> Result<SyncOutcome> {
        let mode = self.effective_mode(run, requested);

        info!("Syncing {} ({mode})...", run.path().display());
        let state = RunState::Pending.start(mode);
        let output = self.transport.transfer(run.path(), mode).await?;

        if !output.timed_out {
            if let Some(code) = output.exit_code.filter(|code| *code != 0) {
                warn!("Sync {} has return code: {code}", run.path().display());
            } else if output.exit_code.is_none() {
                warn!("Sync {} was terminated by a signal", run.path().display());
            }
        }

        let state = state.after_transfer(&output);
        match state {
            RunState::Done => {
                run.mark_synced()?;
                info!("Sync {} finished", run.path().display());
            }
            RunState::Incremental => {
                debug!("Incremental sync of {} complete", run.path().display());
            }
            _ => {}
        }

        Ok(SyncOutcome {
            mode,
            state,
            output,
        })
    }
}
