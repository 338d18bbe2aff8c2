//! `tracing` bridge.
//!
//! [`TwinlogLayer`] implements [`tracing_subscriber::Layer`] and forwards
//! each event to a [`Logger`], so code instrumented with `tracing` reaches
//! the same console and store as direct log calls.
//!
//! Event fields become metadata. `error.message`/`error.stack` fields (or
//! their underscore spellings) turn an error event into a structured fault.
//! Events from twinlog itself and from the pool are skipped so the store's
//! own diagnostics cannot loop back into it.

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use twinlog_core::{Fault, LogLevel, Metadata};

use crate::logger::Logger;

/// Crates whose events are never forwarded.
const IGNORED_TARGETS: &[&str] = &[
    "twinlog",
    "twinlog_core",
    "twinlog_settings",
    "twinlog_store",
    "r2d2",
];

/// Whether `target` is `krate` itself or one of its modules.
fn in_crate(target: &str, krate: &str) -> bool {
    target
        .strip_prefix(krate)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Forwards `tracing` events into a [`Logger`].
#[derive(Clone, Debug)]
pub struct TwinlogLayer {
    logger: Logger,
}

impl TwinlogLayer {
    /// Forward events to `logger`.
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

/// Visitor that extracts the message, error fields, and metadata from an
/// event.
struct EventFieldVisitor {
    message: Option<String>,
    error_message: Option<String>,
    error_stack: Option<String>,
    data: Metadata,
}

impl EventFieldVisitor {
    fn new() -> Self {
        Self {
            message: None,
            error_message: None,
            error_stack: None,
            data: Metadata::new(),
        }
    }
}

impl Visit for EventFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "error.message" | "error_message" => {
                self.error_message = Some(value.to_string());
            }
            "error.stack" | "error_stack" => self.error_stack = Some(value.to_string()),
            name => {
                let _ = self
                    .data
                    .insert(name.to_string(), serde_json::Value::String(value.to_string()));
            }
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        let _ = self.data.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let _ = self.data.insert(
            field.name().to_string(),
            serde_json::Value::Number(value.into()),
        );
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        let _ = self
            .data
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            let _ = self
                .data
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        if field.name() == "error" {
            self.error_message = Some(value.to_string());
        } else {
            let _ = self.data.insert(
                field.name().to_string(),
                serde_json::Value::String(value.to_string()),
            );
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            let _ = self.data.insert(
                field.name().to_string(),
                serde_json::Value::String(format!("{value:?}")),
            );
        }
    }
}

impl<S> Layer<S> for TwinlogLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if IGNORED_TARGETS.iter().any(|krate| in_crate(target, krate)) {
            return;
        }

        let level = LogLevel::from_tracing(event.metadata().level());
        let mut visitor = EventFieldVisitor::new();
        event.record(&mut visitor);

        let message = visitor.message.unwrap_or_default();
        let mut data = visitor.data;
        let _ = data.insert("target".to_string(), serde_json::Value::String(target.to_string()));

        if level != LogLevel::Error {
            self.logger.log(level, &message, data);
            return;
        }

        match (visitor.error_message, visitor.error_stack) {
            (None, None) => self.logger.error(message.as_str(), data),
            (error_message, stack) => {
                let detail = error_message.unwrap_or_else(|| message.clone());
                let mut fault = Fault::new("Error", detail);
                if let Some(stack) = stack {
                    fault = fault.with_stack(stack);
                }
                if message.is_empty() || message == fault.message() {
                    self.logger.error(fault, data);
                } else {
                    self.logger.error_enriched(&message, fault, data);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
