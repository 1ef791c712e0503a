//! runsync: mirror sequencing runs to a remote rsync target
//!
//! - Copies every run under a base directory with rsync
//! - Keeps re-copying runs the instrument is still writing
//! - Marks a run with `.sync.done` after a clean final copy and never
//!   touches it again

mod logging;
mod report;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, builder::Styles};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::{error, info};

use runsync_core::{SyncConfig, discover_runs, seed_markers, split_extra_args};
use runsync_transport::{RsyncTransport, RunScanner, Transfer, TransferRunner};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::Red.on_default());

#[derive(Parser, Debug)]
#[command(name = "runsync")]
#[command(version)]
#[command(styles = STYLES)]
#[command(about = "Mirror sequencing run directories to a remote rsync target")]
#[command(long_about = r#"
runsync copies instrument run directories to a remote rsync destination.

Runs still being written are copied incrementally on every invocation. Once a
run is finished (RTAComplete.txt, RunCompletionStatus.xml, or a RunInfo.xml
untouched for --stale-days) a final copy is made, and a clean exit marks the
run with .sync.done so it is skipped from then on.

Examples:
  runsync /data/runs backup::runs/                 One pass (e.g. from cron)
  runsync /data/runs backup::runs/ --interval 900  Rescan every 15 minutes
  runsync /data/runs --make-cache                  Mark existing runs as synced
  runsync /data/runs --status                      Show what the next pass does
"#)]
struct Cli {
    /// Base directory holding run directories
    base_dir: PathBuf,

    /// Remote destination (any rsync destination expression)
    #[arg(required_unless_present_any = ["make_cache", "status"])]
    remote: Option<String>,

    /// rsync port [default: 875]
    #[arg(long)]
    port: Option<u16>,

    /// Extra rsync arguments, split with shell quoting rules (never run by a shell)
    #[arg(long, allow_hyphen_values = true)]
    extra_args: Option<String>,

    /// Overall timeout for one transfer in seconds [default: 7200]
    #[arg(long)]
    timeout: Option<u64>,

    /// Days after which an untouched RunInfo.xml counts as finished [default: 7]
    #[arg(long)]
    stale_days: Option<u64>,

    /// TOML file with default settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mark all existing runs as synced and exit
    #[arg(long, conflicts_with = "status")]
    make_cache: bool,

    /// Print the state of each run and exit
    #[arg(long)]
    status: bool,

    /// Keep running and rescan every SECS seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,

    /// Also write a debug-level log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Config file values with command-line flags applied on top
    fn settings(&self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(days) = self.stale_days {
            config.stale_after_days = days;
        }
        if let Some(extra) = &self.extra_args {
            config.extra_args = split_extra_args(extra)?;
        }

        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;
    let config = cli.settings()?;

    if cli.make_cache {
        let count = seed_markers(&cli.base_dir)?;
        report::seeded(count);
        return Ok(());
    }

    if cli.status {
        let runs = discover_runs(&cli.base_dir)?;
        report::run_status(&runs, config.stale_after());
        return Ok(());
    }

    let remote = cli
        .remote
        .clone()
        .ok_or_else(|| eyre!("a remote destination is required"))?;
    info!(
        "Syncing runs in {} -> {remote} (port {})",
        cli.base_dir.display(),
        config.port
    );

    let transport = RsyncTransport::from_config(remote, &config);
    let scanner = RunScanner::new(TransferRunner::new(transport, config.stale_after()));

    match cli.interval {
        None => scan_once(&scanner, &cli.base_dir).await?,
        Some(secs) => watch(&scanner, &cli.base_dir, Duration::from_secs(secs)).await,
    }

    Ok(())
}

async fn scan_once<T: Transfer>(scanner: &RunScanner<T>, base_dir: &Path) -> Result<()> {
    let started = Instant::now();
    let scan_report = scanner.scan(base_dir).await?;
    report::scan_summary(&scan_report, started);
    Ok(())
}

/// Rescan every `interval` until Ctrl+C
async fn watch<T: Transfer>(scanner: &RunScanner<T>, base_dir: &Path, interval: Duration) {
    loop {
        if let Err(e) = scan_once(scanner, base_dir).await {
            error!("Scan failed: {e:#}");
        }

        info!("Next scan in {}s (Ctrl+C to stop)", interval.as_secs());
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["runsync", "/data/runs", "backup::runs/"]).unwrap();
        assert_eq!(cli.remote.as_deref(), Some("backup::runs/"));
        assert!(!cli.make_cache);

        let config = cli.settings().unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_remote_required_for_sync() {
        assert!(Cli::try_parse_from(["runsync", "/data/runs"]).is_err());
        assert!(Cli::try_parse_from(["runsync", "/data/runs", "--make-cache"]).is_ok());
        assert!(Cli::try_parse_from(["runsync", "/data/runs", "--status"]).is_ok());
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--port",
            "873",
            "--timeout",
            "60",
            "--stale-days",
            "2",
            "--extra-args",
            "\"--bwlimit=50m -z\"",
        ])
        .unwrap();

        let config = cli.settings().unwrap();
        assert_eq!(config.port, 873);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.stale_after_days, 2);
        assert_eq!(config.extra_args, ["--bwlimit=50m", "-z"]);
    }

    #[test]
    fn test_extra_args_keep_quoted_option_whole() {
        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--extra-args",
            "\"--rsh='ssh -p 2222' --bwlimit=50m\"",
        ])
        .unwrap();
        assert_eq!(
            cli.settings().unwrap().extra_args,
            ["--rsh=ssh -p 2222", "--bwlimit=50m"]
        );
    }

    #[test]
    fn test_unbalanced_extra_args_rejected() {
        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--extra-args",
            "--rsh='ssh -p 2222",
        ])
        .unwrap();
        assert!(cli.settings().is_err());
    }

    #[test]
    fn test_huge_stale_days_does_not_overflow() {
        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--stale-days",
            "300000000000000",
        ])
        .unwrap();
        let config = cli.settings().unwrap();
        assert_eq!(config.stale_after(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_extra_args_may_start_with_dash() {
        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--extra-args",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.settings().unwrap().extra_args, ["--dry-run"]);
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runsync.toml");
        std::fs::write(&path, "port = 10873\ntimeout_secs = 120\n").unwrap();

        let cli = Cli::try_parse_from([
            "runsync",
            "/data/runs",
            "host::runs",
            "--config",
            path.to_str().unwrap(),
            "--timeout",
            "30",
        ])
        .unwrap();

        let config = cli.settings().unwrap();
        assert_eq!(config.port, 10873);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(
            Cli::try_parse_from(["runsync", "/data/runs", "host::runs", "--interval", "0"])
                .is_err()
        );
    }
}
