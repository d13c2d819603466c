//! Machine-readable trace records
//!
//! Enforcement and cache components describe each request as a
//! [`TraceRecord`] and hand it to an injected [`TelemetrySink`]. The default
//! sink forwards records to `tracing`; tests capture them with
//! [`MemorySink`].

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Attribute keys
pub mod keys {
    pub const CLIENT_ID: &str = "client_id";
    pub const TOKEN_EXPIRES_AT: &str = "token_expires_at";
    pub const TOKEN_SCOPES: &str = "token_scopes";
    pub const REQUIRED_SCOPES: &str = "required_scopes";
    pub const TOKEN_FROM_CACHE: &str = "token.from_cache";
    pub const SESSION_FROM_CACHE: &str = "sams.session.from_cache";
    pub const TRANSPORT: &str = "transport";
    pub const PROCEDURE: &str = "procedure";
    pub const FULL_ERROR: &str = "full_error";
}

/// Value of a trace attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    String(String),
    StringList(Vec<String>),
}

/// Final status of a traced operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    Unset,
    Ok,
    /// Caller-safe description of the failure
    Error(String),
}

/// A structured record of one traced operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub name: &'static str,
    pub attributes: Vec<(&'static str, AttributeValue)>,
    pub status: SpanStatus,
}

impl TraceRecord {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            status: SpanStatus::Unset,
        }
    }

    /// Sets an attribute, replacing any previous value for the key
    pub fn set(&mut self, key: &'static str, value: AttributeValue) {
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn set_bool(&mut self, key: &'static str, value: bool) {
        self.set(key, AttributeValue::Bool(value));
    }

    pub fn set_string(&mut self, key: &'static str, value: impl Into<String>) {
        self.set(key, AttributeValue::String(value.into()));
    }

    pub fn set_strings(&mut self, key: &'static str, values: Vec<String>) {
        self.set(key, AttributeValue::StringList(values));
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    pub fn bool_attribute(&self, key: &str) -> Option<bool> {
        match self.attribute(key) {
            Some(AttributeValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn string_attribute(&self, key: &str) -> Option<&str> {
        match self.attribute(key) {
            Some(AttributeValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn mark_ok(&mut self) {
        self.status = SpanStatus::Ok;
    }

    /// Records the failure: `full_error` carries the detailed cause and
    /// the status carries the caller-safe message
    pub fn mark_error(&mut self, full_error: impl Into<String>, safe_message: impl Into<String>) {
        self.set_string(keys::FULL_ERROR, full_error);
        self.status = SpanStatus::Error(safe_message.into());
    }
}

/// Receives trace records
pub trait TelemetrySink: Send + Sync {
    fn record(&self, record: TraceRecord);
}

/// Emits trace records as `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, record: TraceRecord) {
        match &record.status {
            SpanStatus::Error(message) => warn!(
                span = record.name,
                attributes = ?record.attributes,
                status = %message,
                "authz trace"
            ),
            _ => debug!(
                span = record.name,
                attributes = ?record.attributes,
                "authz trace"
            ),
        }
    }
}

/// Keeps trace records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<TraceRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().clone()
    }

    pub fn last(&self) -> Option<TraceRecord> {
        self.records.lock().last().cloned()
    }

    /// Returns and clears the captured records
    pub fn take(&self) -> Vec<TraceRecord> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl TelemetrySink for MemorySink {
    fn record(&self, record: TraceRecord) {
        self.records.lock().push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_existing_attribute() {
        let mut record = TraceRecord::new("test");
        record.set_bool(keys::TOKEN_FROM_CACHE, false);
        record.set_bool(keys::TOKEN_FROM_CACHE, true);

        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.bool_attribute(keys::TOKEN_FROM_CACHE), Some(true));
    }

    #[test]
    fn test_mark_error_keeps_details_out_of_status() {
        let mut record = TraceRecord::new("test");
        record.mark_error("upstream returned 502 for client abc", "unable to validate token");

        assert_eq!(
            record.status,
            SpanStatus::Error("unable to validate token".to_string())
        );
        assert_eq!(
            record.string_attribute(keys::FULL_ERROR),
            Some("upstream returned 502 for client abc")
        );
    }

    #[test]
    fn test_memory_sink_take() {
        let sink = MemorySink::new();
        sink.record(TraceRecord::new("a"));
        sink.record(TraceRecord::new("b"));

        assert_eq!(sink.last().map(|r| r.name), Some("b"));
        assert_eq!(sink.take().len(), 2);
        assert!(sink.records().is_empty());
    }
}
