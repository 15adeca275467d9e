//! Dual-sink structured logging.
//!
//! [`init`] builds two size-rotating JSON log files: one for records below
//! warn, one for warn and above, both filtered by a single minimum
//! severity. It hands back a [`Loggers`] value holding a structured-only
//! [`Logger`] and a freeform [`SugaredLogger`] over the same router. Pass
//! it to whatever needs to log; nothing is installed globally unless
//! [`Loggers::install_global`] is called.
//!
//! ```no_run
//! use logger::{Field, Severity};
//!
//! let loggers = logger::init("/var/log/app", "info.log", "err.log", 10, 5, 30, Severity::Info);
//! loggers.logger.info("listening", &[Field::u64("port", 8080)]);
//! loggers.sugar.errorf(format_args!("lost {} peers", 3));
//! ```

mod config;
mod encoder;
mod error;
mod handle;
mod level;
mod route;
mod router;
mod sink;

#[cfg(test)]
mod testing;

pub use config::{DEFAULT_MAX_SIZE_MB, LogConfig, SinkConfig};
pub use encoder::{Caller, EncoderConfig, Field, JsonEncoder, Record, Value};
pub use error::{Error, Result};
pub use handle::{KeyValues, Logger, SugaredLogger};
pub use level::Severity;
pub use route::Route;
pub use router::{Router, RouterLayer};
pub use sink::{FailurePolicy, RecordSink, RotatingFile};

use std::path::Path;
use std::sync::Arc;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;

/// The two logging handles produced by [`init`].
#[derive(Clone, Debug)]
pub struct Loggers {
    /// Structured-only handle.
    pub logger: Logger,
    /// Freeform-capable handle over the same sinks.
    pub sugar: SugaredLogger,
    router: Arc<Router>,
}

impl Loggers {
    /// A `tracing` layer writing to the same sinks as the handles.
    pub fn layer(&self) -> RouterLayer {
        RouterLayer::new(self.router.clone())
    }

    /// Routes `tracing` events and `log` records through these sinks for
    /// the rest of the process.
    ///
    /// Succeeds once per process. The `log` bridge is claimed first, so
    /// when any `log` logger (including one from an earlier call) is
    /// already installed this returns [`Error::LogBridgeAlreadySet`] and
    /// installs nothing. A `tracing` subscriber installed elsewhere yields
    /// [`Error::GlobalAlreadySet`].
    pub fn install_global(&self) -> Result<()> {
        LogTracer::init().map_err(|_| Error::LogBridgeAlreadySet)?;
        let subscriber = tracing_subscriber::registry().with(self.layer());
        tracing::subscriber::set_global_default(subscriber).map_err(|_| Error::GlobalAlreadySet)
    }

    /// Flushes both sinks.
    pub fn sync(&self) -> Result<()> {
        self.router.sync()
    }
}

/// Builds the info and warn sinks under `log_dir` and the handles bound
/// to them.
///
/// Nothing is validated or opened here. A bad directory surfaces on the
/// first write, where the sink reports it on stderr.
pub fn init(
    log_dir: impl AsRef<Path>,
    info_file: &str,
    warn_file: &str,
    max_size_mb: u64,
    max_backups: usize,
    max_age_days: u64,
    minimum: Severity,
) -> Loggers {
    init_with_config(&LogConfig {
        dir: log_dir.as_ref().to_path_buf(),
        info_file: info_file.to_string(),
        warn_file: warn_file.to_string(),
        max_size_mb,
        max_backups,
        max_age_days,
        level: minimum,
        ..LogConfig::default()
    })
}

/// Same as [`init`], driven by a [`LogConfig`].
///
/// Each call builds fresh sinks. Files held by earlier handles are closed
/// once their last clone is dropped.
pub fn init_with_config(config: &LogConfig) -> Loggers {
    let info = RotatingFile::new(config.sink_config(&config.info_file));
    let warn = RotatingFile::new(config.sink_config(&config.warn_file));

    let router = Router::new(config.level, JsonEncoder::new(EncoderConfig::default()))
        .with_sink(
            Route::Info,
            config.info_file.clone(),
            Arc::new(info),
            config.on_write_error,
        )
        .with_sink(
            Route::Warn,
            config.warn_file.clone(),
            Arc::new(warn),
            config.on_write_error,
        );
    let router = Arc::new(router);

    let logger = Logger::new(router.clone());
    Loggers {
        sugar: logger.sugar(),
        logger,
        router,
    }
}
