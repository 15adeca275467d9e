use crate::error::{Error, Result};
use crate::level::Severity;
use crate::sink::FailurePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Rotation size used when a sink is configured with `max_size_mb == 0`.
pub const DEFAULT_MAX_SIZE_MB: u64 = 100;

const MEGABYTE: u64 = 1024 * 1024;

/// Rotation policy of one sink file.
///
/// A zero `max_backups` keeps every rotated file and a zero `max_age_days`
/// never expires them. Backups are named in local time and never
/// compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    path: PathBuf,
    max_size_mb: u64,
    max_backups: usize,
    max_age_days: u64,
}

impl SinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SinkConfig {
            path: path.into(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_backups: 0,
            max_age_days: 0,
        }
    }

    pub fn with_max_size_mb(mut self, max_size_mb: u64) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    pub fn with_max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    pub fn with_max_age_days(mut self, max_age_days: u64) -> Self {
        self.max_age_days = max_age_days;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    pub fn max_age_days(&self) -> u64 {
        self.max_age_days
    }

    /// Size in bytes a file may grow past before it is rotated.
    pub fn max_size_bytes(&self) -> u64 {
        let mb = match self.max_size_mb {
            0 => DEFAULT_MAX_SIZE_MB,
            mb => mb,
        };
        mb.saturating_mul(MEGABYTE)
    }
}

/// Everything needed to build the two sinks and their router.
///
/// Deserializes from JSON; any missing key takes its default.
///
/// ```json
/// {"dir": "/var/log/app", "warn_file": "err.log", "level": "debug"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory holding both log files.
    pub dir: PathBuf,
    /// File receiving records below warn.
    pub info_file: String,
    /// File receiving warn and above.
    pub warn_file: String,
    pub max_size_mb: u64,
    pub max_backups: usize,
    pub max_age_days: u64,
    /// Records below this severity are dropped.
    pub level: Severity,
    /// What a sink does when a write fails.
    pub on_write_error: FailurePolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: PathBuf::from("logs"),
            info_file: "info.log".to_string(),
            warn_file: "error.log".to_string(),
            max_size_mb: DEFAULT_MAX_SIZE_MB,
            max_backups: 5,
            max_age_days: 30,
            level: Severity::Info,
            on_write_error: FailurePolicy::default(),
        }
    }
}

impl LogConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text)
    }

    /// Rotation policy for `file_name` inside [`LogConfig::dir`].
    pub fn sink_config(&self, file_name: &str) -> SinkConfig {
        SinkConfig::new(self.dir.join(file_name))
            .with_max_size_mb(self.max_size_mb)
            .with_max_backups(self.max_backups)
            .with_max_age_days(self.max_age_days)
    }
}
