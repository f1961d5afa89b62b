//! Custom tracing formatters.
//!
//! Two event formats share one field pipeline: a pretty formatter for
//! development terminals and a JSON-lines formatter for production ingestion.
//! Both redact values for sensitive key names before anything is written, and
//! both inject the request id bound to the current task so every log line
//! emitted inside a request scope is correlatable.

use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use yansi::Paint;

use crate::context::current_request_id;

/// Key names whose values never reach the log stream.
const REDACTED_KEYS: &[&str] = &[
    "token",
    "session_token",
    "verification_token",
    "password",
    "secret",
    "api_key",
    "authorization",
    "secret_key",
    "database_url",
];

const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Whether the value for `key` must be replaced with the redaction
/// placeholder. Key comparison is case-insensitive.
pub fn is_redacted_key(key: &str) -> bool {
    REDACTED_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
}

/// A collected field value.
#[derive(Debug, Clone)]
enum FieldValue {
    Str(String),
    Signed(i64),
    Unsigned(u64),
    Bool(bool),
}

impl FieldValue {
    fn to_json(&self) -> Value {
        match self {
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Signed(n) => Value::Number((*n).into()),
            FieldValue::Unsigned(n) => Value::Number((*n).into()),
            FieldValue::Bool(b) => Value::Bool(*b),
        }
    }
}

/// Visitor that collects event fields, applying redaction as they arrive.
struct FieldCollector {
    fields: IndexMap<String, FieldValue>,
    message: Option<String>,
}

impl FieldCollector {
    fn new() -> Self {
        Self {
            fields: IndexMap::new(),
            message: None,
        }
    }

    fn insert(&mut self, field: &Field, value: FieldValue) {
        let name = field.name();
        if is_redacted_key(name) {
            self.fields.insert(
                name.to_string(),
                FieldValue::Str(REDACTED_PLACEHOLDER.to_string()),
            );
        } else {
            self.fields.insert(name.to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.insert(field, FieldValue::Str(format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() != "message" {
            self.insert(field, FieldValue::Signed(value));
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() != "message" {
            self.insert(field, FieldValue::Unsigned(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() != "message" {
            self.insert(field, FieldValue::Bool(value));
        }
    }
}

/// JSON-lines formatter: one object per event.
///
/// Output shape:
/// `{"timestamp":"...","level":"INFO","service":"docent","event":"...","request_id":"...",...fields}`
pub struct JsonEventFormatter;

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut collector = FieldCollector::new();
        event.record(&mut collector);

        #[derive(Serialize)]
        struct Line {
            timestamp: String,
            level: String,
            service: &'static str,
            event: String,
            target: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            request_id: Option<String>,
            #[serde(flatten)]
            fields: Map<String, Value>,
        }

        let mut fields = Map::new();
        for (key, value) in &collector.fields {
            fields.insert(key.clone(), value.to_json());
        }

        let line = Line {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level: meta.level().to_string(),
            service: env!("CARGO_PKG_NAME"),
            event: collector.message.unwrap_or_default(),
            target: meta.target().to_string(),
            request_id: current_request_id(),
            fields,
        };

        writeln!(
            writer,
            "{}",
            serde_json::to_string(&line).unwrap_or_else(|_| "{}".to_string())
        )
    }
}

/// Pretty formatter for development terminals.
///
/// `12:34:56.789  INFO target: event key=value key2=value2`
pub struct PrettyEventFormatter;

impl<S, N> FormatEvent<S, N> for PrettyEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let ansi = writer.has_ansi_escapes();

        let timestamp = Utc::now().format("%H:%M:%S%.3f").to_string();
        if ansi {
            write!(writer, "{} ", Paint::new(&timestamp).dim())?;
        } else {
            write!(writer, "{} ", timestamp)?;
        }

        write_colored_level(&mut writer, meta.level())?;
        writer.write_char(' ')?;

        if ansi {
            write!(writer, "{}: ", Paint::new(meta.target()).dim())?;
        } else {
            write!(writer, "{}: ", meta.target())?;
        }

        let mut collector = FieldCollector::new();
        event.record(&mut collector);

        if let Some(msg) = &collector.message {
            write!(writer, "{}", msg)?;
        }

        if let Some(request_id) = current_request_id() {
            collector
                .fields
                .entry("request_id".to_string())
                .or_insert(FieldValue::Str(request_id));
        }

        for (key, value) in &collector.fields {
            writer.write_char(' ')?;
            if ansi {
                write!(writer, "{}{}", Paint::new(key).cyan(), Paint::new("=").dim())?;
            } else {
                write!(writer, "{}=", key)?;
            }
            match value {
                FieldValue::Str(s) => write_str_value(&mut writer, s, ansi)?,
                FieldValue::Signed(n) => write_number(&mut writer, n, ansi)?,
                FieldValue::Unsigned(n) => write_number(&mut writer, n, ansi)?,
                FieldValue::Bool(b) => write_number(&mut writer, b, ansi)?,
            }
        }

        writeln!(writer)
    }
}

/// Quote a string value when it contains delimiters; colored when ANSI.
fn write_str_value(writer: &mut Writer<'_>, s: &str, ansi: bool) -> fmt::Result {
    let needs_quote = s.is_empty() || s.contains([' ', '=', '"', '\t', '\n']);
    let rendered = if needs_quote {
        format!("\"{}\"", s.escape_debug())
    } else {
        s.to_string()
    };
    if ansi && needs_quote {
        write!(writer, "{}", Paint::new(&rendered).yellow())
    } else {
        write!(writer, "{}", rendered)
    }
}

fn write_number(writer: &mut Writer<'_>, value: impl fmt::Display, ansi: bool) -> fmt::Result {
    if ansi {
        write!(writer, "{}", Paint::new(value).magenta())
    } else {
        write!(writer, "{}", value)
    }
}

/// Write the verbosity level with the same coloring/alignment as the Full formatter.
fn write_colored_level(writer: &mut Writer<'_>, level: &Level) -> fmt::Result {
    if writer.has_ansi_escapes() {
        let paint = match *level {
            Level::TRACE => Paint::new("TRACE").magenta(),
            Level::DEBUG => Paint::new("DEBUG").blue(),
            Level::INFO => Paint::new(" INFO").green(),
            Level::WARN => Paint::new(" WARN").yellow(),
            Level::ERROR => Paint::new("ERROR").red(),
        };
        write!(writer, "{}", paint)
    } else {
        match *level {
            Level::TRACE => write!(writer, "{:>5}", "TRACE"),
            Level::DEBUG => write!(writer, "{:>5}", "DEBUG"),
            Level::INFO => write!(writer, "{:>5}", " INFO"),
            Level::WARN => write!(writer, "{:>5}", " WARN"),
            Level::ERROR => write!(writer, "{:>5}", "ERROR"),
        }
    }
}
