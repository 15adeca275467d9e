use crate::error::Result;
use crate::level::Severity;
use chrono::{DateTime, Local};
use serde_json::{Map, Number};
use std::backtrace::Backtrace;
use std::fmt::{self, Write as _};
use std::panic::Location;
use std::time::Duration;

/// A typed structured value attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Rendered as whole milliseconds.
    Duration(Duration),
    Json(serde_json::Value),
}

impl Value {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::I64(n) => serde_json::Value::from(*n),
            Value::U64(n) => serde_json::Value::from(*n),
            // NaN and infinities have no JSON number form.
            Value::F64(n) => Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Duration(d) => {
                serde_json::Value::from(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            }
            Value::Json(v) => v.clone(),
        }
    }
}

/// A key/value pair carried by a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Field {
            key: key.into(),
            value,
        }
    }

    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Field::new(key, Value::Str(value.into()))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Field::new(key, Value::I64(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Field::new(key, Value::U64(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Field::new(key, Value::F64(value))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Field::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Field::new(key, Value::Duration(value))
    }

    pub fn json(key: impl Into<String>, value: serde_json::Value) -> Self {
        Field::new(key, Value::Json(value))
    }

    /// Records an error's message under the `error` key.
    pub fn error(err: &dyn std::error::Error) -> Self {
        Field::str("error", render(format_args!("{err}")))
    }
}

/// Written in place of a value whose formatting implementation failed.
pub(crate) const UNPRINTABLE: &str = "<unprintable>";

/// Formats `args` into a string, substituting [`UNPRINTABLE`] when a
/// `Display` or `Debug` implementation returns an error.
pub(crate) fn render(args: fmt::Arguments<'_>) -> String {
    let mut text = String::new();
    match text.write_fmt(args) {
        Ok(()) => text,
        Err(_) => UNPRINTABLE.to_owned(),
    }
}

/// Source location of the call that produced a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    file: String,
    line: u32,
}

impl Caller {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Caller {
            file: file.into(),
            line,
        }
    }

    /// Keeps only the last directory and the file name, e.g.
    /// `crates/logger/src/handle.rs` becomes `src/handle.rs:42`.
    pub fn short(&self) -> String {
        let is_sep = |c: char| c == '/' || c == '\\';
        let trimmed = match self.file.rfind(is_sep) {
            Some(last) => match self.file[..last].rfind(is_sep) {
                Some(prev) => &self.file[prev + 1..],
                None => self.file.as_str(),
            },
            None => self.file.as_str(),
        };
        format!("{}:{}", trimmed, self.line)
    }
}

impl From<&Location<'_>> for Caller {
    fn from(location: &Location<'_>) -> Self {
        Caller::new(location.file(), location.line())
    }
}

/// A single log event, serialized as soon as it is routed.
#[derive(Debug, Clone)]
pub struct Record {
    pub severity: Severity,
    pub time: DateTime<Local>,
    pub message: String,
    pub caller: Option<Caller>,
    pub fields: Vec<Field>,
    pub stacktrace: Option<String>,
}

impl Record {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Record {
            severity,
            time: Local::now(),
            message: message.into(),
            caller: None,
            fields: Vec::new(),
            stacktrace: None,
        }
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_stacktrace(mut self, stacktrace: String) -> Self {
        self.stacktrace = Some(stacktrace);
        self
    }

    /// Attaches a stack trace of the current thread when the record is at
    /// or above [`Severity::Warn`].
    pub(crate) fn with_stacktrace_if_warn(self) -> Self {
        if self.severity >= Severity::Warn {
            self.with_stacktrace(Backtrace::force_capture().to_string())
        } else {
            self
        }
    }
}

/// Key names and time layout used by [`JsonEncoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderConfig {
    pub message_key: &'static str,
    pub level_key: &'static str,
    pub time_key: &'static str,
    pub caller_key: &'static str,
    pub stacktrace_key: &'static str,
    /// `chrono` format string for the time key.
    pub time_format: &'static str,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            message_key: "msg",
            level_key: "level",
            time_key: "time",
            caller_key: "file",
            stacktrace_key: "stacktrace",
            time_format: "%Y-%m-%d %H:%M:%S",
        }
    }
}

impl EncoderConfig {
    fn is_reserved(&self, key: &str) -> bool {
        [
            self.message_key,
            self.level_key,
            self.time_key,
            self.caller_key,
            self.stacktrace_key,
        ]
        .contains(&key)
    }
}

/// Serializes records as single-line JSON objects.
///
/// Keys come out in a fixed order: level, time, msg, file, the record's
/// own fields, then the stack trace. A field whose key collides with one
/// of the standard keys is written as `fields.<key>` so the standard keys
/// appear exactly once.
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        JsonEncoder { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encodes `record` as one newline-terminated line.
    pub fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        let config = &self.config;
        let mut object = Map::new();
        object.insert(config.level_key.into(), record.severity.as_str().into());
        // An invalid custom format must not take the caller down.
        let mut time = String::new();
        if write!(time, "{}", record.time.format(config.time_format)).is_err() {
            time = record.time.to_rfc3339();
        }
        object.insert(config.time_key.into(), time.into());
        object.insert(config.message_key.into(), record.message.as_str().into());
        if let Some(caller) = &record.caller {
            object.insert(config.caller_key.into(), caller.short().into());
        }
        for field in &record.fields {
            let key = if config.is_reserved(&field.key) {
                format!("fields.{}", field.key)
            } else {
                field.key.clone()
            };
            object.insert(key, field.value.to_json());
        }
        if let Some(stacktrace) = &record.stacktrace {
            object.insert(config.stacktrace_key.into(), stacktrace.as_str().into());
        }

        let mut line = serde_json::to_vec(&serde_json::Value::Object(object))?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn decode(line: &[u8]) -> serde_json::Map<String, serde_json::Value> {
        assert_eq!(line.last(), Some(&b'\n'));
        match serde_json::from_slice(line).unwrap() {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn fixed_record(severity: Severity) -> Record {
        let mut record = Record::new(severity, "started")
            .with_caller(Caller::new("apps/logdemo/src/main.rs", 14));
        record.time = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        record
    }

    #[test]
    fn standard_keys_come_first_in_order() {
        let record = fixed_record(Severity::Info).with_fields(vec![Field::str("user", "ana")]);
        let map = decode(&JsonEncoder::default().encode(&record).unwrap());

        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, ["level", "time", "msg", "file", "user"]);
        assert_eq!(map["level"], "INFO");
        assert_eq!(map["time"], "2024-03-09 07:05:01");
        assert_eq!(map["msg"], "started");
        assert_eq!(map["file"], "src/main.rs:14");
    }

    #[test]
    fn stacktrace_is_written_last() {
        let record = fixed_record(Severity::Error)
            .with_fields(vec![Field::bool("retry", false)])
            .with_stacktrace("frame 0".into());
        let map = decode(&JsonEncoder::default().encode(&record).unwrap());
        assert_eq!(map.keys().last().map(String::as_str), Some("stacktrace"));
        assert_eq!(map["stacktrace"], "frame 0");
    }

    #[test]
    fn colliding_field_keys_are_prefixed() {
        let record = fixed_record(Severity::Info).with_fields(vec![
            Field::str("msg", "shadow"),
            Field::str("level", "shadow"),
        ]);
        let map = decode(&JsonEncoder::default().encode(&record).unwrap());
        assert_eq!(map["msg"], "started");
        assert_eq!(map["level"], "INFO");
        assert_eq!(map["fields.msg"], "shadow");
        assert_eq!(map["fields.level"], "shadow");
    }

    #[test]
    fn durations_are_whole_milliseconds() {
        let record = fixed_record(Severity::Info)
            .with_fields(vec![Field::duration("elapsed", Duration::from_micros(2_750_900))]);
        let map = decode(&JsonEncoder::default().encode(&record).unwrap());
        assert_eq!(map["elapsed"], 2750);
    }

    #[test]
    fn non_finite_floats_become_strings() {
        let record = fixed_record(Severity::Info).with_fields(vec![
            Field::f64("ratio", 0.5),
            Field::f64("bad", f64::NAN),
        ]);
        let map = decode(&JsonEncoder::default().encode(&record).unwrap());
        assert_eq!(map["ratio"], 0.5);
        assert_eq!(map["bad"], "NaN");
    }

    struct Failing;

    impl fmt::Display for Failing {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn failing_display_renders_a_placeholder() {
        assert_eq!(render(format_args!("{}", Failing)), UNPRINTABLE);
        assert_eq!(render(format_args!("{} ok", 7)), "7 ok");
    }

    #[test]
    fn short_caller_keeps_last_directory() {
        assert_eq!(Caller::new("a/b/c/file.rs", 3).short(), "c/file.rs:3");
        assert_eq!(Caller::new("src\\lib.rs", 9).short(), "src\\lib.rs:9");
        assert_eq!(Caller::new("main.rs", 1).short(), "main.rs:1");
    }

    #[test]
    fn stacktrace_only_attached_from_warn() {
        assert!(Record::new(Severity::Info, "x").with_stacktrace_if_warn().stacktrace.is_none());
        let warned = Record::new(Severity::Warn, "x").with_stacktrace_if_warn();
        assert!(!warned.stacktrace.unwrap_or_default().is_empty());
    }
}
