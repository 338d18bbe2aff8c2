//! The write-once log record and its bounded text fields.
//!
//! Message and metadata are each capped at [`MAX_FIELD_CHARS`] Unicode
//! scalar values. Oversized input is cut at a scalar boundary, never
//! rejected, so a truncated metadata string may no longer be valid JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::level::LogLevel;

/// Maximum length, in characters, of the persisted message and metadata.
pub const MAX_FIELD_CHARS: usize = 2000;

/// Arbitrary structured key/value data attached to a log call.
pub type Metadata = serde_json::Map<String, Value>;

/// A single log event, immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    level: LogLevel,
    message: String,
    metadata: String,
    stacktrace: Option<String>,
    timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn new(
        level: LogLevel,
        message: &str,
        metadata: &Metadata,
        stacktrace: Option<String>,
    ) -> Self {
        Self::new_at(level, message, metadata, stacktrace, Utc::now())
    }

    /// Build a record with an explicit timestamp.
    #[must_use]
    pub fn new_at(
        level: LogLevel,
        message: &str,
        metadata: &Metadata,
        stacktrace: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            level,
            message: truncate_chars(message, MAX_FIELD_CHARS).to_owned(),
            metadata: truncate_chars(&serialize_metadata(metadata), MAX_FIELD_CHARS).to_owned(),
            stacktrace,
            timestamp,
        }
    }

    /// Severity.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Bounded message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Bounded, JSON-serialized metadata (`{}` when empty).
    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    /// Whether the record carries any metadata.
    pub fn has_metadata(&self) -> bool {
        self.metadata != "{}"
    }

    /// Stack trace text, if any.
    pub fn stacktrace(&self) -> Option<&str> {
        self.stacktrace.as_deref()
    }

    /// Emission instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Cut `s` to at most `max_chars` Unicode scalar values.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Serialize metadata to compact JSON. Never fails.
#[must_use]
pub fn serialize_metadata(metadata: &Metadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| format!("{metadata:?}"))
}

/// Convert any serializable value into [`Metadata`]. Never fails.
///
/// Objects are used as-is, `null` becomes empty metadata, other values are
/// wrapped under `"value"`, and a serialization error is recorded under
/// `"unserializable"`.
pub fn metadata_from<T: Serialize + ?Sized>(value: &T) -> Metadata {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Metadata::new(),
        Ok(other) => {
            let mut map = Metadata::new();
            let _ = map.insert("value".to_owned(), other);
            map
        }
        Err(e) => {
            let mut map = Metadata::new();
            let _ = map.insert("unserializable".to_owned(), Value::String(e.to_string()));
            map
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn truncate_short_input_unchanged() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn truncate_respects_code_points() {
        let s = "héllo wörld";
        assert_eq!(truncate_chars(s, 2), "hé");
        assert_eq!(truncate_chars("🦀🦀🦀", 2), "🦀🦀");
    }

    #[test]
    fn oversized_message_truncated_to_bound() {
        let long = "x".repeat(MAX_FIELD_CHARS + 500);
        let record = LogRecord::new(LogLevel::Info, &long, &Metadata::new(), None);
        assert_eq!(record.message().chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn oversized_metadata_truncated_to_bound() {
        let mut meta = Metadata::new();
        let _ = meta.insert("blob".into(), json!("y".repeat(5000)));
        let record = LogRecord::new(LogLevel::Warn, "m", &meta, None);
        assert_eq!(record.metadata().chars().count(), MAX_FIELD_CHARS);
        assert!(record.metadata().starts_with("{\"blob\":\"yyy"));
    }

    #[test]
    fn empty_metadata_serializes_as_empty_object() {
        let record = LogRecord::new(LogLevel::Info, "m", &Metadata::new(), None);
        assert_eq!(record.metadata(), "{}");
        assert!(!record.has_metadata());
    }

    #[test]
    fn metadata_from_object() {
        let meta = metadata_from(&json!({"user": "ada", "attempt": 2}));
        assert_eq!(meta["user"], "ada");
        assert_eq!(meta["attempt"], 2);
    }

    #[test]
    fn metadata_from_primitive_wraps_value() {
        let meta = metadata_from(&42);
        assert_eq!(meta["value"], 42);
        assert!(metadata_from(&()).is_empty());
    }

    #[test]
    fn metadata_from_unserializable_never_fails() {
        // Maps with non-string keys cannot become JSON objects.
        let mut bad: HashMap<(u8, u8), u8> = HashMap::new();
        let _ = bad.insert((1, 2), 3);
        let meta = metadata_from(&bad);
        assert!(meta.contains_key("unserializable"));
    }

    #[test]
    fn record_keeps_stacktrace_and_timestamp() {
        let ts = Utc::now();
        let record = LogRecord::new_at(
            LogLevel::Error,
            "boom",
            &Metadata::new(),
            Some("at src/main.rs:1:1".into()),
            ts,
        );
        assert_eq!(record.stacktrace(), Some("at src/main.rs:1:1"));
        assert_eq!(record.timestamp(), ts);
        assert_eq!(record.level(), LogLevel::Error);
    }

    proptest! {
        #[test]
        fn truncation_is_bounded_prefix(s in "\\PC{0,300}", max in 0usize..200) {
            let cut = truncate_chars(&s, max);
            prop_assert!(s.starts_with(cut));
            prop_assert_eq!(cut.chars().count(), s.chars().count().min(max));
        }
    }
}
