//! runsync configuration file parsing (TOML)
//!
//! Every key is optional; command-line flags take precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{WrapErr as _, eyre};

/// Default rsync daemon port
pub const DEFAULT_PORT: u16 = 875;
/// Default overall transfer timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 7200;
/// Default rsync `--timeout` (I/O idle timeout) in seconds
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;
/// Default staleness threshold for `RunInfo.xml` in days
pub const DEFAULT_STALE_AFTER_DAYS: u64 = 7;

pub(crate) const SECS_PER_DAY: u64 = 24 * 3600;

/// runsync configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// rsync daemon port
    pub port: u16,
    /// Overall wall-clock limit for one transfer
    pub timeout_secs: u64,
    /// Idle timeout passed to rsync itself
    pub io_timeout_secs: u64,
    /// Extra arguments appended to every rsync invocation
    pub extra_args: Vec<String>,
    /// Exclude patterns passed to rsync
    pub excludes: Vec<String>,
    /// Age after which an untouched `RunInfo.xml` counts as finished
    pub stale_after_days: u64,
    /// rsync executable
    pub rsync_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
            extra_args: Vec::new(),
            excludes: default_excludes(),
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            rsync_path: PathBuf::from("rsync"),
        }
    }
}

/// Thumbnails and instrument temp files are never mirrored
fn default_excludes() -> Vec<String> {
    vec!["Thumbnail_Images".to_string(), "*.tmp.*".to_string()]
}

impl SyncConfig {
    /// Load config from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> color_eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }

    #[must_use]
    pub fn stale_after(&self) -> Duration {
        // Absurdly large values saturate to "never stale"
        Duration::from_secs(self.stale_after_days.saturating_mul(SECS_PER_DAY))
    }
}

/// Split a passthrough argument string the way users type it on the command
/// line.
///
/// One matching pair of outer quotes is dropped, then the rest is split with
/// POSIX shell quoting rules. Nothing is expanded or executed.
///
/// # Errors
/// Returns an error if the quotes are unbalanced
pub fn split_extra_args(raw: &str) -> color_eyre::Result<Vec<String>> {
    let raw = raw.trim();
    let inner = ['"', '\'']
        .into_iter()
        .find_map(|q| raw.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))
        .unwrap_or(raw);
    shlex::split(inner).ok_or_else(|| eyre!("unbalanced quotes in extra args: {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
port = 873
timeout_secs = 600
io_timeout_secs = 60
extra_args = ["--bwlimit=50m", "--chmod=ugo+r"]
excludes = ["Thumbnail_Images", "Logs"]
stale_after_days = 3
rsync_path = "/usr/local/bin/rsync"
"#;

        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.port, 873);
        assert_eq!(config.timeout(), Duration::from_secs(600));
        assert_eq!(config.io_timeout(), Duration::from_secs(60));
        assert_eq!(config.extra_args, ["--bwlimit=50m", "--chmod=ugo+r"]);
        assert_eq!(config.excludes, ["Thumbnail_Images", "Logs"]);
        assert_eq!(config.stale_after(), Duration::from_secs(3 * 24 * 3600));
        assert_eq!(config.rsync_path, PathBuf::from("/usr/local/bin/rsync"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.excludes, ["Thumbnail_Images", "*.tmp.*"]);
        assert_eq!(config.stale_after(), Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<SyncConfig>("prot = 873").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(SyncConfig::load(&dir.path().join("runsync.toml")).is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("runsync.toml");
        std::fs::write(&path, "port = 10873\n").unwrap();

        let config = SyncConfig::load(&path).unwrap();
        assert_eq!(config.port, 10873);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_split_extra_args() {
        assert_eq!(
            split_extra_args("\"--bwlimit=50m --dry-run\"").unwrap(),
            ["--bwlimit=50m", "--dry-run"]
        );
        assert_eq!(split_extra_args("'-z'").unwrap(), ["-z"]);
        assert!(split_extra_args("").unwrap().is_empty());
        assert!(split_extra_args("  ''  ").unwrap().is_empty());
    }

    #[test]
    fn test_split_extra_args_keeps_quoted_spaces() {
        assert_eq!(
            split_extra_args("--rsh='ssh -p 2222' --bwlimit=50m").unwrap(),
            ["--rsh=ssh -p 2222", "--bwlimit=50m"]
        );
        // Outer pair wrapping an inner quoted value
        assert_eq!(
            split_extra_args("\"--rsh='ssh -p 2222' -z\"").unwrap(),
            ["--rsh=ssh -p 2222", "-z"]
        );
        assert_eq!(
            split_extra_args("--exclude \"Logs dir\"").unwrap(),
            ["--exclude", "Logs dir"]
        );
    }

    #[test]
    fn test_split_extra_args_unbalanced_quotes() {
        assert!(split_extra_args("--rsh='ssh -p 2222").is_err());
        assert!(split_extra_args("\"-z").is_err());
    }

    #[test]
    fn test_huge_stale_days_saturates() {
        let config = SyncConfig {
            stale_after_days: 300_000_000_000_000,
            ..SyncConfig::default()
        };
        assert_eq!(config.stale_after(), Duration::from_secs(u64::MAX));

        let config = SyncConfig {
            stale_after_days: u64::MAX,
            ..SyncConfig::default()
        };
        assert_eq!(config.stale_after(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_huge_stale_days_from_toml() {
        let config: SyncConfig = toml::from_str("stale_after_days = 300000000000000").unwrap();
        assert!(config.stale_after() > Duration::from_secs(100 * 365 * SECS_PER_DAY));
    }
}
