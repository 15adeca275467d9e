use crate::config::SinkConfig;
use crate::error::{Error, Result};
use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};
use serde::Deserialize;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Destination for encoded records.
///
/// Implementations must accept concurrent calls from any thread.
pub trait RecordSink: Send + Sync {
    /// Appends one complete encoded record.
    fn append(&self, record: &[u8]) -> Result<()>;

    /// Flushes anything buffered to stable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// What the router does with an error returned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Discard the record silently.
    Drop,
    /// Print the failure on stderr and carry on.
    #[default]
    Stderr,
}

impl FailurePolicy {
    pub(crate) fn report(self, sink: &str, err: &Error) {
        match self {
            FailurePolicy::Drop => {}
            FailurePolicy::Stderr => {
                let _ = writeln!(io::stderr(), "logger: {sink}: {err}");
            }
        }
    }
}

type Writer = FileRotate<AppendTimestamp>;

/// A log file that rotates itself by size, backed by [`file_rotate`].
///
/// The file is opened lazily on the first write. Once it has grown past the
/// configured size it is moved aside as `<name>.<timestamp>` (local time;
/// rotations within the same second get a numeric suffix) and writing
/// carries on in a fresh file. The writer enforces the backup count. Backups
/// older than the age limit are removed here, on open and after a rotation.
pub struct RotatingFile {
    config: SinkConfig,
    writer: Mutex<Option<Writer>>,
}

impl RotatingFile {
    pub fn new(config: SinkConfig) -> Self {
        RotatingFile {
            config,
            writer: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        self.config.path()
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Rotated files of this sink, newest first.
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let mut backups = self.backup_entries()?;
        backups.sort_by(|a, b| b.cmp(a));
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Writer>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dir(&self) -> &Path {
        match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn open(&self) -> Result<Writer> {
        let path = self.path();
        let dir = self.dir();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        // The writer carries on without a file when it cannot open one.
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        self.remove_expired_backups()?;

        let limit = match self.config.max_backups() {
            0 => FileLimit::Unlimited,
            max => FileLimit::MaxFiles(max),
        };
        let max_size = usize::try_from(self.config.max_size_bytes()).unwrap_or(usize::MAX);
        Ok(FileRotate::new(
            path,
            AppendTimestamp::default(limit),
            ContentLimit::BytesSurpassed(max_size),
            Compression::None,
            #[cfg(unix)]
            None,
        ))
    }

    fn backup_entries(&self) -> Result<Vec<(SystemTime, PathBuf)>> {
        let prefix = match self.path().file_name() {
            Some(name) => format!("{}.", name.to_string_lossy()),
            None => return Ok(Vec::new()),
        };
        let dir = self.dir();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(dir, e)),
        };

        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                if !meta.is_file() {
                    return None;
                }
                Some((meta.modified().ok()?, entry.path()))
            })
            .collect())
    }

    /// Deletes backups last written before the age limit and returns how
    /// many went.
    fn remove_expired_backups(&self) -> Result<usize> {
        let max_age_days = self.config.max_age_days();
        if max_age_days == 0 {
            return Ok(0);
        }
        let max_age = Duration::from_secs(max_age_days.saturating_mul(SECONDS_PER_DAY));
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Ok(0);
        };

        let mut removed = 0;
        for (modified, path) in self.backup_entries()? {
            if modified >= cutoff {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(path, e)),
            }
        }
        Ok(removed)
    }
}

impl RecordSink for RotatingFile {
    fn append(&self, record: &[u8]) -> Result<()> {
        let len = record.len() as u64;
        let max = self.config.max_size_bytes();
        if len > max {
            return Err(Error::RecordTooLarge { len, max });
        }

        let mut slot = self.lock();
        let mut writer = match slot.take() {
            Some(writer) => writer,
            None => self.open()?,
        };
        let before = writer.log_paths();
        let written = writer
            .write_all(record)
            .and_then(|()| writer.flush())
            .map_err(|e| Error::io(self.path(), e));

        let pruned = if writer.log_paths() == before {
            Ok(0)
        } else {
            self.remove_expired_backups()
        };
        match pruned {
            // The writer still lists what was just removed; reopen on the
            // next write so it rescans the directory.
            Ok(removed) if removed > 0 => {}
            _ => *slot = Some(writer),
        }
        written.and(pruned.map(|_| ()))
    }

    fn sync(&self) -> Result<()> {
        match self.lock().as_mut() {
            Some(writer) => writer.flush().map_err(|e| Error::io(self.path(), e)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RotatingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingFile")
            .field("config", &self.config)
            .finish()
    }
}
