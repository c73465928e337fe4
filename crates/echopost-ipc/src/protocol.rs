//! Wire protocol: one JSON object per line in each direction.

use serde::{Deserialize, Serialize};

/// `message` returned when a record was persisted.
pub const MESSAGE_STORED: &str = "stored";
/// `message` returned when the queue rejected the write.
pub const MESSAGE_WRITE_FAILED: &str = "Db write failed";

/// IPC method types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[serde(rename = "health")]
    Health,
    #[serde(rename = "log.send")]
    LogSend,
}

impl Method {
    /// Look up a method by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.to_string())).ok()
    }
}

/// IPC request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation.
    pub id: String,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    /// Create a new request with auto-generated ID.
    pub fn new(method: Method) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method,
            params: None,
        }
    }

    /// Create a new request with parameters.
    pub fn with_params(method: Method, params: serde_json::Value) -> Self {
        Self {
            params: Some(params),
            ..Self::new(method)
        }
    }

    /// Build a `log.send` request.
    pub fn log_send(json_data: &str, pipelines: &[String]) -> Self {
        Self::with_params(
            Method::LogSend,
            serde_json::json!({ "json_data": json_data, "pipelines": pipelines }),
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Parameters of `log.send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSendParams {
    /// Producer document as text; need not be valid JSON.
    pub json_data: String,
    #[serde(default)]
    pub pipelines: Vec<String>,
}

/// Result of `log.send`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSendResult {
    pub success: bool,
    pub message: String,
}

impl LogSendResult {
    pub fn stored() -> Self {
        Self {
            success: true,
            message: MESSAGE_STORED.to_string(),
        }
    }

    pub fn write_failed() -> Self {
        Self {
            success: false,
            message: MESSAGE_WRITE_FAILED.to_string(),
        }
    }
}

/// IPC response message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Error information in a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: i32,
    pub message: String,
}

impl Response {
    /// Create a successful response.
    pub fn success(id: &str, result: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: &str, code: i32, message: &str) -> Self {
        Self {
            id: id.to_string(),
            result: None,
            error: Some(ErrorInfo {
                code,
                message: message.to_string(),
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// Standard error codes
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = Request::new(Method::Health);
        let json = request.to_json().unwrap();

        assert!(json.contains("\"method\":\"health\""));
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn test_log_send_request_shape() {
        let request = Request::log_send("{\"a\":1}", &["p1".to_string()]);
        let value: serde_json::Value = serde_json::from_str(&request.to_json().unwrap()).unwrap();

        assert_eq!(value["method"], "log.send");
        assert_eq!(value["params"]["json_data"], "{\"a\":1}");
        assert_eq!(value["params"]["pipelines"][0], "p1");
    }

    #[test]
    fn test_method_from_name() {
        assert_eq!(Method::from_name("health"), Some(Method::Health));
        assert_eq!(Method::from_name("log.send"), Some(Method::LogSend));
        assert_eq!(Method::from_name("log.delete"), None);
    }

    #[test]
    fn test_log_send_params_default_pipelines() {
        let params: LogSendParams = serde_json::from_str(r#"{"json_data":"x"}"#).unwrap();
        assert!(params.pipelines.is_empty());
    }

    #[test]
    fn test_response_error() {
        let response = Response::error("123", error_codes::METHOD_NOT_FOUND, "Unknown method");
        let json = response.to_json().unwrap();

        assert!(json.contains("\"code\":-32601"));
        assert!(!json.contains("\"result\""));
        assert!(!response.is_success());
    }

    #[test]
    fn test_log_send_result_messages() {
        assert_eq!(LogSendResult::stored().message, "stored");
        assert!(!LogSendResult::write_failed().success);
        assert_eq!(LogSendResult::write_failed().message, "Db write failed");
    }
}
