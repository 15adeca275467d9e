use anyhow::{Context, Result};
use clap::Parser;
use logger::{Field, KeyValues, LogConfig, Loggers, Severity};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "logdemo")]
#[command(about = "Writes sample records through the dual-sink rotating logger")]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding both log files
    #[arg(long)]
    dir: Option<PathBuf>,
    /// File receiving records below warn
    #[arg(long)]
    info_file: Option<String>,
    /// File receiving warn and above
    #[arg(long)]
    warn_file: Option<String>,
    /// Rotation size in megabytes
    #[arg(long)]
    max_size: Option<u64>,
    /// Rotated files kept per sink, 0 keeps all
    #[arg(long)]
    max_backups: Option<usize>,
    /// Days a rotated file is kept, 0 keeps forever
    #[arg(long)]
    max_age: Option<u64>,
    /// Minimum severity written (debug, info, warn, error, fatal)
    #[arg(long)]
    level: Option<Severity>,
    /// How many bursts to write
    #[arg(long, default_value_t = 1)]
    count: usize,
}

impl Args {
    fn log_config(&self) -> Result<LogConfig> {
        let mut config = match &self.config {
            Some(path) => LogConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => LogConfig::default(),
        };
        if let Some(dir) = &self.dir {
            config.dir = dir.clone();
        }
        if let Some(info_file) = &self.info_file {
            config.info_file = info_file.clone();
        }
        if let Some(warn_file) = &self.warn_file {
            config.warn_file = warn_file.clone();
        }
        if let Some(max_size) = self.max_size {
            config.max_size_mb = max_size;
        }
        if let Some(max_backups) = self.max_backups {
            config.max_backups = max_backups;
        }
        if let Some(max_age) = self.max_age {
            config.max_age_days = max_age;
        }
        if let Some(level) = self.level {
            config.level = level;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.log_config()?;

    let loggers = logger::init_with_config(&config);
    loggers
        .install_global()
        .context("Failed to install global logger")?;

    let started = Instant::now();
    for burst in 0..args.count {
        write_burst(&loggers, burst);
    }

    loggers.logger.info(
        "demo finished",
        &[
            Field::u64("bursts", args.count as u64),
            Field::duration("elapsed", started.elapsed()),
        ],
    );
    loggers.sync().context("Failed to sync log files")?;

    println!(
        "wrote {} bursts to {} and {} in {}",
        args.count,
        config.info_file,
        config.warn_file,
        config.dir.display()
    );
    Ok(())
}

/// One record per severity from each entry point: the structured handle,
/// the sugared handle and `tracing` macros.
fn write_burst(loggers: &Loggers, burst: usize) {
    let logger = loggers.logger.with([Field::u64("burst", burst as u64)]);
    logger.debug("cache warmed", &[Field::u64("entries", 1024)]);
    logger.info(
        "request served",
        &[
            Field::str("path", "/orders"),
            Field::u64("status", 200),
            Field::duration("latency", Duration::from_millis(37)),
        ],
    );
    logger.warn("retrying upstream", &[Field::i64("attempt", 2)]);

    let sugar = logger.sugar();
    sugar.infof(format_args!("{} workers ready", 8));
    sugar.errorw(
        "order rejected",
        KeyValues::new()
            .kv("order", &json!({"id": 77, "items": ["tea", "jam"]}))
            .kv("reasons", &["stock", "address"]),
    );

    debug!(burst, "tracing debug");
    info!(burst, peer = "10.0.0.7", "tracing info");
    warn!(burst, "tracing warn");
    error!(burst, code = 503u64, "tracing error");
}
