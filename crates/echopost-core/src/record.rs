//! The buffered log record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Opaque key/value document supplied by a producer.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One buffered unit of data awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Producer document; always an object, possibly empty.
    pub payload: Payload,
    /// Pipeline tags, opaque to the agent.
    pub pipelines: Vec<String>,
    /// Time the agent accepted the record.
    pub received_at: DateTime<Utc>,
}

impl LogRecord {
    /// Build a record from already-structured data, stamped with the current time.
    pub fn new(payload: Payload, pipelines: Vec<String>) -> Self {
        Self {
            payload,
            pipelines,
            received_at: Utc::now(),
        }
    }

    /// Build a record from the raw text a producer sent.
    ///
    /// Text that does not parse as a JSON object is replaced by an empty
    /// document; ingestion never rejects a record for its payload.
    pub fn from_producer(json_data: &str, pipelines: Vec<String>) -> Self {
        Self::new(parse_payload(json_data), pipelines)
    }

    /// Body sent to the remote `/log` endpoint.
    pub fn delivery_body(&self) -> serde_json::Value {
        serde_json::json!({
            "pipelines": self.pipelines,
            "log_data": self.payload,
        })
    }
}

/// Parse producer text into a payload, falling back to `{}`.
pub fn parse_payload(json_data: &str) -> Payload {
    match serde_json::from_str::<serde_json::Value>(json_data) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = %json_kind(&other), "payload_not_object");
            Payload::new()
        }
        Err(e) => {
            warn!(error = %e, "payload_decode_error");
            Payload::new()
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_producer_keeps_object_payload() {
        let rec = LogRecord::from_producer(r#"{"msg":"hi","n":3}"#, vec!["p1".into()]);
        assert_eq!(rec.payload.get("msg"), Some(&json!("hi")));
        assert_eq!(rec.payload.get("n"), Some(&json!(3)));
        assert_eq!(rec.pipelines, vec!["p1".to_string()]);
    }

    #[test]
    fn from_producer_substitutes_empty_payload_for_garbage() {
        let rec = LogRecord::from_producer("not json at all", vec![]);
        assert!(rec.payload.is_empty());
    }

    #[test]
    fn from_producer_substitutes_empty_payload_for_non_object() {
        assert!(LogRecord::from_producer("[1,2,3]", vec![]).payload.is_empty());
        assert!(LogRecord::from_producer("\"text\"", vec![]).payload.is_empty());
        assert!(LogRecord::from_producer("null", vec![]).payload.is_empty());
    }

    #[test]
    fn serialized_field_names_are_stable() {
        let rec = LogRecord::from_producer(r#"{"a":1}"#, vec!["x".into(), "y".into()]);
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["payload"], json!({"a": 1}));
        assert_eq!(value["pipelines"], json!(["x", "y"]));
        assert!(value["received_at"].is_string());
    }

    #[test]
    fn delivery_body_shape() {
        let rec = LogRecord::from_producer(r#"{"level":"INFO"}"#, vec!["pipe".into()]);
        assert_eq!(
            rec.delivery_body(),
            json!({"pipelines": ["pipe"], "log_data": {"level": "INFO"}})
        );
    }

    #[test]
    fn pipeline_order_is_preserved_through_serde() {
        let rec = LogRecord::new(Payload::new(), vec!["c".into(), "a".into(), "b".into()]);
        let text = serde_json::to_string(&rec).unwrap();
        let back: LogRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, rec);
    }
}
