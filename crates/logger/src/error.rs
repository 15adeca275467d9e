use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the logger crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while configuring or writing logs.
///
/// Log calls themselves never return these. They surface from sink
/// operations, configuration loading and global installation, and are
/// otherwise handed to the sink's [`FailurePolicy`](crate::FailurePolicy).
#[derive(Debug, Error)]
pub enum Error {
    /// A filesystem operation on a log file or its directory failed.
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single encoded record is larger than the sink's rotation size,
    /// so it could never fit in any file.
    #[error("write length {len} exceeds maximum file size {max}")]
    RecordTooLarge { len: u64, max: u64 },

    /// A configuration value could not be understood.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Encoding a record or decoding a configuration document failed.
    #[error("json error {0}")]
    Json(#[from] serde_json::Error),

    /// A process-wide `tracing` subscriber was already installed.
    #[error("global logger already installed")]
    GlobalAlreadySet,

    /// Another `log` logger owns the process, so `log` records cannot be
    /// bridged.
    #[error("a `log` logger is already installed")]
    LogBridgeAlreadySet,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
