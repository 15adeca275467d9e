use crate::encoder::{Caller, Field, Record, render};
use crate::error::Result;
use crate::level::Severity;
use crate::router::Router;
use serde::Serialize;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Structured-only logging handle.
///
/// Accepts typed [`Field`]s and nothing else, so no argument is coerced
/// on the way in. Cloning is cheap; every clone shares the same router.
#[derive(Clone, Debug)]
pub struct Logger {
    router: Arc<Router>,
    context: Arc<[Field]>,
}

impl Logger {
    pub fn new(router: Arc<Router>) -> Self {
        Logger {
            router,
            context: Arc::from(Vec::new()),
        }
    }

    /// A child logger that adds `fields` to every record it writes.
    pub fn with(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let context: Vec<Field> = self.context.iter().cloned().chain(fields).collect();
        Logger {
            router: self.router.clone(),
            context: Arc::from(context),
        }
    }

    /// The freeform view over the same router and context.
    pub fn sugar(&self) -> SugaredLogger {
        SugaredLogger { base: self.clone() }
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.router.enabled(severity)
    }

    #[track_caller]
    pub fn log(&self, severity: Severity, msg: &str, fields: &[Field]) {
        if self.enabled(severity) {
            self.write(severity, msg.to_owned(), fields.to_vec(), Location::caller());
        }
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, fields: &[Field]) {
        self.log(Severity::Debug, msg, fields);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, fields: &[Field]) {
        self.log(Severity::Info, msg, fields);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, fields: &[Field]) {
        self.log(Severity::Warn, msg, fields);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, fields: &[Field]) {
        self.log(Severity::Error, msg, fields);
    }

    /// Writes at [`Severity::Fatal`] and syncs the sinks. Terminating the
    /// process is left to the caller.
    #[track_caller]
    pub fn fatal(&self, msg: &str, fields: &[Field]) {
        self.log(Severity::Fatal, msg, fields);
        let _ = self.sync();
    }

    pub fn sync(&self) -> Result<()> {
        self.router.sync()
    }

    fn write(
        &self,
        severity: Severity,
        message: String,
        fields: Vec<Field>,
        location: &Location<'_>,
    ) {
        let fields = if self.context.is_empty() {
            fields
        } else {
            self.context.iter().cloned().chain(fields).collect()
        };
        let record = Record::new(severity, message)
            .with_caller(Caller::from(location))
            .with_fields(fields)
            .with_stacktrace_if_warn();
        self.router.dispatch(&record);
    }
}

/// Loosely typed key/value pairs for [`SugaredLogger`].
///
/// Values are converted with `serde` at call time. A value that fails to
/// serialize is replaced by its error text under `<key>Error`.
#[derive(Debug, Clone, Default)]
pub struct KeyValues(Vec<Field>);

impl KeyValues {
    pub fn new() -> Self {
        KeyValues::default()
    }

    pub fn kv<T: Serialize + ?Sized>(mut self, key: impl Into<String>, value: &T) -> Self {
        self.0.push(coerce(key.into(), value));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn coerce<T: Serialize + ?Sized>(key: String, value: &T) -> Field {
    match serde_json::to_value(value) {
        Ok(value) => Field::json(key, value),
        Err(err) => Field::str(format!("{key}Error"), err.to_string()),
    }
}

/// Freeform-capable logging handle.
///
/// On top of what [`Logger`] offers it takes any `Display` message,
/// `format_args!` messages (`*f` methods) and [`KeyValues`] of arbitrary
/// serializable values (`*w` methods). The extra conversions make it
/// slower than the structured handle.
#[derive(Clone, Debug)]
pub struct SugaredLogger {
    base: Logger,
}

macro_rules! sugared_levels {
    ($($severity:ident => $plain:ident, $formatted:ident, $with:ident;)*) => {
        $(
            #[track_caller]
            pub fn $plain(&self, msg: impl fmt::Display) {
                self.log(Severity::$severity, msg, KeyValues::default());
            }

            #[track_caller]
            pub fn $formatted(&self, args: fmt::Arguments<'_>) {
                self.log(Severity::$severity, args, KeyValues::default());
            }

            #[track_caller]
            pub fn $with(&self, msg: impl fmt::Display, kvs: KeyValues) {
                self.log(Severity::$severity, msg, kvs);
            }
        )*
    };
}

impl SugaredLogger {
    /// The structured view over the same router and context.
    pub fn desugar(&self) -> Logger {
        self.base.clone()
    }

    /// A child logger carrying `key = value` on every record.
    pub fn with<T: Serialize + ?Sized>(&self, key: impl Into<String>, value: &T) -> Self {
        SugaredLogger {
            base: self.base.with([coerce(key.into(), value)]),
        }
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.base.enabled(severity)
    }

    #[track_caller]
    pub fn log(&self, severity: Severity, msg: impl fmt::Display, kvs: KeyValues) {
        if self.base.enabled(severity) {
            let message = render(format_args!("{msg}"));
            self.base.write(severity, message, kvs.0, Location::caller());
        }
    }

    sugared_levels! {
        Debug => debug, debugf, debugw;
        Info => info, infof, infow;
        Warn => warn, warnf, warnw;
        Error => error, errorf, errorw;
    }

    /// Writes at [`Severity::Fatal`] and syncs the sinks.
    #[track_caller]
    pub fn fatal(&self, msg: impl fmt::Display) {
        self.log(Severity::Fatal, msg, KeyValues::default());
        let _ = self.sync();
    }

    #[track_caller]
    pub fn fatalw(&self, msg: impl fmt::Display, kvs: KeyValues) {
        self.log(Severity::Fatal, msg, kvs);
        let _ = self.sync();
    }

    pub fn sync(&self) -> Result<()> {
        self.base.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::JsonEncoder;
    use crate::route::Route;
    use crate::sink::FailurePolicy;
    use crate::testing::MemorySink;
    use serde::ser::{Error as _, Serializer};
    use std::time::Duration;

    fn logger(floor: Severity) -> (Logger, MemorySink, MemorySink) {
        let info = MemorySink::default();
        let warn = MemorySink::default();
        let router = Router::new(floor, JsonEncoder::default())
            .with_sink(Route::Info, "info", Arc::new(info.clone()), FailurePolicy::Drop)
            .with_sink(Route::Warn, "warn", Arc::new(warn.clone()), FailurePolicy::Drop);
        (Logger::new(Arc::new(router)), info, warn)
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn structured_fields_are_written_in_order() {
        let (logger, info, _) = logger(Severity::Info);
        logger.info(
            "request served",
            &[
                Field::str("path", "/health"),
                Field::u64("status", 200),
                Field::duration("latency", Duration::from_millis(42)),
            ],
        );

        let lines = info.lines();
        assert_eq!(lines.len(), 1);
        let keys: Vec<_> = lines[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["level", "time", "msg", "file", "path", "status", "latency"]);
        assert_eq!(lines[0]["latency"], 42);
    }

    #[test]
    fn caller_points_at_the_call_site() {
        let (logger, info, _) = logger(Severity::Debug);
        let line = line!() + 1;
        logger.debug("here", &[]);
        assert_eq!(info.lines()[0]["file"], format!("src/handle.rs:{line}"));
    }

    #[test]
    fn warn_and_above_carry_a_stacktrace() {
        let (logger, info, warn) = logger(Severity::Info);
        logger.info("fine", &[]);
        logger.warn("careful", &[]);
        logger.error("broken", &[Field::error(&std::fmt::Error)]);

        assert!(info.lines()[0].get("stacktrace").is_none());
        let warn_lines = warn.lines();
        assert_eq!(warn_lines.len(), 2);
        for line in &warn_lines {
            assert!(!line["stacktrace"].as_str().unwrap().is_empty());
        }
        assert!(warn_lines[1]["error"].is_string());
    }

    #[test]
    fn child_context_is_prepended() {
        let (logger, info, _) = logger(Severity::Info);
        let child = logger.with([Field::str("component", "billing")]);
        child.info("charged", &[Field::i64("cents", 1250)]);
        logger.info("plain", &[]);

        let lines = info.lines();
        assert_eq!(lines[0]["component"], "billing");
        assert_eq!(lines[0]["cents"], 1250);
        assert!(lines[1].get("component").is_none());
    }

    #[test]
    fn sugared_handle_formats_and_coerces() {
        let (logger, info, warn) = logger(Severity::Info);
        let sugar = logger.sugar().with("session", &7);

        sugar.info("started");
        sugar.infof(format_args!("{} of {}", 1, 3));
        sugar.warnw(
            "slow",
            KeyValues::new()
                .kv("tags", &["a", "b"])
                .kv("bad", &Unserializable),
        );

        let lines = info.lines();
        assert_eq!(lines[0]["msg"], "started");
        assert_eq!(lines[1]["msg"], "1 of 3");
        assert_eq!(lines[1]["session"], 7);

        let warned = &warn.lines()[0];
        assert_eq!(warned["tags"], serde_json::json!(["a", "b"]));
        assert!(warned["badError"].as_str().unwrap().contains("refused"));
        assert!(warned.get("bad").is_none());
    }

    #[test]
    fn sugared_caller_points_at_the_call_site() {
        let (logger, info, _) = logger(Severity::Info);
        let sugar = logger.sugar();
        let line = line!() + 1;
        sugar.infow("here", KeyValues::new());
        assert_eq!(info.lines()[0]["file"], format!("src/handle.rs:{line}"));
    }

    struct Failing;

    impl fmt::Display for Failing {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn failing_display_is_logged_as_a_placeholder() {
        let (logger, info, warn) = logger(Severity::Info);
        let sugar = logger.sugar();
        sugar.info(Failing);
        sugar.errorw(Failing, KeyValues::new().kv("attempt", &1));

        assert_eq!(info.lines()[0]["msg"], crate::encoder::UNPRINTABLE);
        let warned = &warn.lines()[0];
        assert_eq!(warned["msg"], crate::encoder::UNPRINTABLE);
        assert_eq!(warned["attempt"], 1);
    }

    #[test]
    fn desugar_shares_the_router() {
        let (logger, info, _) = logger(Severity::Info);
        logger.sugar().desugar().info("round trip", &[]);
        assert_eq!(info.lines().len(), 1);
    }

    #[test]
    fn below_floor_does_nothing() {
        let (logger, info, warn) = logger(Severity::Warn);
        logger.info("dropped", &[]);
        logger.sugar().debugf(format_args!("dropped too"));
        assert!(!logger.enabled(Severity::Info));
        assert!(info.lines().is_empty());
        assert!(warn.lines().is_empty());
    }

    #[test]
    fn fatal_goes_to_the_warn_sink() {
        let (logger, _, warn) = logger(Severity::Info);
        logger.fatal("giving up", &[]);
        logger.sugar().fatalw("still giving up", KeyValues::new().kv("attempt", &2));
        let levels: Vec<_> = warn.lines().iter().map(|l| l["level"].clone()).collect();
        assert_eq!(levels, ["FATAL", "FATAL"]);
    }
}
