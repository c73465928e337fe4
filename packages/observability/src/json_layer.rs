//! Event lines for the agent's operator stream.
//!
//! Every tracing event becomes one flat JSON object:
//!
//! ```text
//! {"time":"2026-01-02T03:04:05.123456Z","level":"INFO","service":"echopost",
//!  "pid":4242,"target":"echopost_ipc::server","event":"log_stored","key":"01J..."}
//! ```
//!
//! The macro message is the event name. Structured fields sit beside the
//! fixed keys so `jq 'select(.event == "queue_processed") | .processed_count'`
//! works directly; a field named like a fixed key gets a `_field` suffix.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Keys every line carries; event fields may not shadow them.
const FIXED_KEYS: [&str; 7] = ["time", "level", "service", "pid", "target", "event", "span"];

/// One rendered event.
#[derive(Debug, Clone, Serialize)]
pub struct EventLine {
    /// RFC 3339, microseconds, UTC.
    pub time: String,
    pub level: &'static str,
    pub service: String,
    pub pid: u32,
    pub target: String,
    pub event: String,
    /// Innermost span, if the event fired inside one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl EventVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == "message" {
            self.event = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
            return;
        }

        let key = if FIXED_KEYS.contains(&name) {
            format!("{name}_field")
        } else {
            name.to_string()
        };
        self.fields.insert(key, value);
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(value.to_string()));
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::String(value.to_string()));
    }
}

/// Layer that writes every event as one [`EventLine`].
pub struct JsonLayer<W> {
    service_name: String,
    pid: u32,
    make_writer: W,
}

impl<W> JsonLayer<W> {
    pub fn new(service_name: String, make_writer: W) -> Self {
        Self {
            service_name,
            pid: std::process::id(),
            make_writer,
        }
    }

    fn render<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> EventLine
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();

        EventLine {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            level: metadata.level().as_str(),
            service: self.service_name.clone(),
            pid: self.pid,
            target: metadata.target().to_string(),
            event: visitor.event.unwrap_or_default(),
            span: ctx.event_span(event).map(|span| span.name().to_string()),
            fields: visitor.fields,
        }
    }
}

impl<S, W> Layer<S> for JsonLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let line = self.render(event, &ctx);

        let mut buf = Vec::with_capacity(256);
        if serde_json::to_writer(&mut buf, &line).is_ok() {
            buf.push(b'\n');
            // One write per line; the sink keeps lines whole.
            let _ = self.make_writer.make_writer().write_all(&buf);
        }
    }
}
