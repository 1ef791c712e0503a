//! rsync transport using the system `rsync` binary
//!
//! The command is built as an argument vector and spawned directly, so the
//! destination and passthrough arguments never go through a shell.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;
use color_eyre::eyre::WrapErr as _;
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use runsync_core::SyncConfig;

use crate::{Transfer, TransferMode, TransferOutput};

/// How long to keep reading output after a timed-out process was killed
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Transport that mirrors run directories with rsync
#[derive(Debug, Clone)]
pub struct RsyncTransport {
    program: PathBuf,
    remote: String,
    port: u16,
    timeout: Duration,
    io_timeout: Duration,
    excludes: Vec<String>,
    extra_args: Vec<String>,
}

impl RsyncTransport {
    /// Create a transport to `remote` (any rsync destination expression)
    /// using the default settings
    #[must_use]
    pub fn new(remote: impl Into<String>) -> Self {
        Self::from_config(remote, &SyncConfig::default())
    }

    #[must_use]
    pub fn from_config(remote: impl Into<String>, config: &SyncConfig) -> Self {
        Self {
            program: config.rsync_path.clone(),
            remote: remote.into(),
            port: config.port,
            timeout: config.timeout(),
            io_timeout: config.io_timeout(),
            excludes: config.excludes.clone(),
            extra_args: config.extra_args.clone(),
        }
    }

    /// Use a different rsync executable
    #[must_use]
    pub fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Overall wall-clock limit for one transfer
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Arguments passed to rsync for `source`
    #[must_use]
    pub fn args(&self, source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-av".into(), "--partial".into()];
        for pattern in &self.excludes {
            args.push("--exclude".into());
            args.push(pattern.into());
        }
        args.push("--timeout".into());
        args.push(self.io_timeout.as_secs().to_string().into());
        args.push("--port".into());
        args.push(self.port.to_string().into());
        args.extend(self.extra_args.iter().map(OsString::from));
        // No trailing slash: the run directory itself lands under the remote
        args.push(source.as_os_str().to_owned());
        args.push(self.remote.clone().into());
        args
    }
}

#[async_trait]
impl Transfer for RsyncTransport {
    async fn transfer(&self, source: &Path, mode: TransferMode) -> Result<TransferOutput> {
        let args = self.args(source);
        debug!(
            "{mode} transfer: {} {}",
            self.program.display(),
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .wrap_err_with(|| format!("failed to spawn {}", self.program.display()))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let waited = tokio::time::timeout(self.timeout, child.wait()).await;
        let (exit_code, timed_out) = match waited {
            Ok(status) => {
                let status = status.wrap_err("failed to wait for rsync")?;
                (status.code(), false)
            }
            Err(_) => {
                warn!(
                    "Transfer of {} timed out after {}s, killing rsync",
                    source.display(),
                    self.timeout.as_secs()
                );
                child.kill().await.wrap_err("failed to kill rsync")?;
                (None, true)
            }
        };

        // Children of rsync may still hold the pipes open after a kill
        let drain = async {
            for reader in &mut readers {
                let _ = reader.await;
            }
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            debug!("Output of {} not fully drained", source.display());
        }
        for reader in &readers {
            reader.abort();
        }

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }

        Ok(TransferOutput {
            exit_code,
            timed_out,
            lines,
        })
    }
}

/// Log each line of `stream` at debug level and hand it to `tx`
fn forward_lines<R>(stream: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{line}");
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}
