use crate::encoder::{Caller, Field, JsonEncoder, Record, Value, render};
use crate::error::Result;
use crate::level::Severity;
use crate::route::Route;
use crate::sink::{FailurePolicy, RecordSink};
use std::fmt;
use std::sync::Arc;
use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Metadata, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer};

struct Output {
    route: Route,
    name: String,
    sink: Arc<dyn RecordSink>,
    on_error: FailurePolicy,
}

/// Fans records out to the sinks whose route accepts them.
///
/// Each accepted record is encoded once per matching sink. Sink failures
/// never reach the caller; they are handed to the sink's [`FailurePolicy`].
pub struct Router {
    floor: Severity,
    encoder: JsonEncoder,
    outputs: Vec<Output>,
}

impl Router {
    pub fn new(floor: Severity, encoder: JsonEncoder) -> Self {
        Router {
            floor,
            encoder,
            outputs: Vec::new(),
        }
    }

    /// Attaches `sink` to `route`. `name` identifies the sink in failure
    /// reports.
    pub fn with_sink(
        mut self,
        route: Route,
        name: impl Into<String>,
        sink: Arc<dyn RecordSink>,
        on_error: FailurePolicy,
    ) -> Self {
        self.outputs.push(Output {
            route,
            name: name.into(),
            sink,
            on_error,
        });
        self
    }

    pub fn floor(&self) -> Severity {
        self.floor
    }

    /// Whether any sink would accept a record at `severity`.
    pub fn enabled(&self, severity: Severity) -> bool {
        self.outputs
            .iter()
            .any(|output| output.route.accepts(severity, self.floor))
    }

    pub fn dispatch(&self, record: &Record) {
        for output in self
            .outputs
            .iter()
            .filter(|output| output.route.accepts(record.severity, self.floor))
        {
            let written = self
                .encoder
                .encode(record)
                .and_then(|line| output.sink.append(&line));
            if let Err(err) = written {
                output.on_error.report(&output.name, &err);
            }
        }
    }

    /// Syncs every sink, returning the first failure.
    pub fn sync(&self) -> Result<()> {
        let mut first_err = None;
        for output in &self.outputs {
            if let Err(err) = output.sink.sync() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sinks: Vec<_> = self
            .outputs
            .iter()
            .map(|output| (output.route, output.name.as_str()))
            .collect();
        f.debug_struct("Router")
            .field("floor", &self.floor)
            .field("sinks", &sinks)
            .finish()
    }
}

/// `tracing` layer feeding events into a [`Router`].
///
/// Events bridged from the `log` crate are normalized first, so their
/// caller location is the original `log` call site.
#[derive(Debug, Clone)]
pub struct RouterLayer {
    router: Arc<Router>,
}

impl RouterLayer {
    pub fn new(router: Arc<Router>) -> Self {
        RouterLayer { router }
    }
}

impl<S: Subscriber> Layer<S> for RouterLayer {
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        !metadata.is_event() || self.router.enabled(Severity::from(*metadata.level()))
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        Some(self.router.floor().level_filter())
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());
        let severity = Severity::from(*metadata.level());
        if !self.router.enabled(severity) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = Record::new(severity, visitor.message.unwrap_or_default())
            .with_fields(visitor.fields);
        if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
            record = record.with_caller(Caller::new(file, line));
        }
        self.router.dispatch(&record.with_stacktrace_if_warn());
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl FieldVisitor {
    fn push(&mut self, field: &TracingField, value: Value) {
        match (field.name(), value) {
            ("message", Value::Str(text)) => self.message = Some(text),
            // Bridged `log` metadata is already reflected in the record.
            (name, _) if name.starts_with("log.") => {}
            (name, value) => self.fields.push(Field::new(name, value)),
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        self.push(field, Value::Str(value.to_owned()));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::Str(render(format_args!("{value}"))));
    }

    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        self.push(field, Value::Str(render(format_args!("{value:?}"))));
    }
}
