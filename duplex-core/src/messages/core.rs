//! Core JSON-RPC 2.0 message structures.
//!
//! These types are the envelopes every MCP exchange travels in:
//!
//! - **Request**: carries an `id` and expects exactly one response
//! - **Notification**: one-way, no `id`, never answered
//! - **Response**: success `result` or failure `error`, never both
//!
//! Classification of an inbound line falls directly out of the untagged
//! [`JsonRpcMessage`] enum: the response variant is tried first and rejects
//! envelopes that carry neither `result` nor `error`, so an envelope with an
//! `id` and a `method` but no outcome lands on the request variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON-RPC protocol version every envelope carries.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request ID for JSON-RPC messages.
///
/// The wire type is preserved: a peer that sends an integer id gets an
/// integer id back, a string stays a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier.
    Number(i64),
    /// String identifier.
    String(String),
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        Self::Number(n as i64)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,

    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Method name being invoked.
    pub method: String,

    /// Parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request with the given id, method, and parameters.
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Deserialize the parameters into a concrete type.
    ///
    /// Absent parameters deserialize as JSON `null`, which lets types with
    /// all-optional fields accept an omitted `params`.
    pub fn params_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match &self.params {
            Some(params) => serde_json::from_value(params.clone()),
            None => serde_json::from_value(Value::Null),
        }
    }
}

/// JSON-RPC 2.0 notification message (no id, no response).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,

    /// Method name being invoked.
    pub method: String,

    /// Parameters for the method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new notification with the given method and parameters.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }

    /// Deserialize the parameters into a concrete type.
    pub fn params_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        match &self.params {
            Some(params) => serde_json::from_value(params.clone()),
            None => serde_json::from_value(Value::Null),
        }
    }
}

/// JSON-RPC 2.0 error object carried inside an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,

    /// Human-readable error message.
    pub message: String,

    /// Additional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new error object.
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// JSON-RPC 2.0 response message.
///
/// Exactly one of `result` and `error` is present. The constructors uphold
/// this and the deserializer rejects envelopes that violate it, so the
/// invariant holds for locally built and wire-decoded responses alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: String,

    /// ID from the corresponding request, echoed with its wire type.
    pub id: RequestId,

    /// Success result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create a successful response.
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Whether this response carries a successful result.
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// Whether this response carries an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// A response must carry exactly one of `result` and `error`. Deriving
// `Deserialize` would accept any object with an `id`, which breaks
// classification of inbound messages, so the shape check happens here.
impl<'de> Deserialize<'de> for JsonRpcResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawResponse {
            jsonrpc: String,
            id: RequestId,
            #[serde(default)]
            result: Option<Value>,
            #[serde(default)]
            error: Option<JsonRpcError>,
        }

        let raw = RawResponse::deserialize(deserializer)?;
        match (&raw.result, &raw.error) {
            (None, None) => Err(serde::de::Error::custom(
                "response carries neither result nor error",
            )),
            (Some(_), Some(_)) => Err(serde::de::Error::custom(
                "response carries both result and error",
            )),
            _ => Ok(Self {
                jsonrpc: raw.jsonrpc,
                id: raw.id,
                result: raw.result,
                error: raw.error,
            }),
        }
    }
}

/// Any JSON-RPC message.
///
/// Variant order matters for untagged deserialization: responses are tried
/// first so that an envelope carrying both a `method` and a `result` is
/// treated as a response, matching the inbound classification rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Response message.
    Response(JsonRpcResponse),
    /// Request message.
    Request(JsonRpcRequest),
    /// Notification message.
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    /// The method name, for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(notif) => Some(&notif.method),
            Self::Response(_) => None,
        }
    }

    /// The request id, for requests and responses.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Response(resp) => Some(&resp.id),
            Self::Notification(_) => None,
        }
    }

    /// The `jsonrpc` version field of the envelope.
    pub fn jsonrpc_version(&self) -> &str {
        match self {
            Self::Request(req) => &req.jsonrpc,
            Self::Response(resp) => &resp.jsonrpc,
            Self::Notification(notif) => &notif.jsonrpc,
        }
    }
}

impl From<JsonRpcRequest> for JsonRpcMessage {
    fn from(req: JsonRpcRequest) -> Self {
        Self::Request(req)
    }
}

impl From<JsonRpcResponse> for JsonRpcMessage {
    fn from(resp: JsonRpcResponse) -> Self {
        Self::Response(resp)
    }
}

impl From<JsonRpcNotification> for JsonRpcMessage {
    fn from(notif: JsonRpcNotification) -> Self {
        Self::Notification(notif)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_roundtrip_preserves_numeric_id() {
        let request = JsonRpcRequest::new(7i64, "tools/list", None);
        let wire = serde_json::to_string(&request).unwrap();
        assert!(wire.contains("\"id\":7"));

        let back: JsonRpcRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.id, RequestId::Number(7));
    }

    #[test]
    fn request_roundtrip_preserves_string_id() {
        let request = JsonRpcRequest::new("req-1", "tools/list", None);
        let wire = serde_json::to_string(&request).unwrap();
        assert!(wire.contains("\"id\":\"req-1\""));
    }

    #[test]
    fn classification_request() {
        let msg: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn classification_notification() {
        let msg: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"initialized"}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Notification(_)));
    }

    #[test]
    fn classification_success_response() {
        let msg: JsonRpcMessage =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#).unwrap();
        assert!(matches!(msg, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn classification_error_response() {
        let msg: JsonRpcMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match msg {
            JsonRpcMessage::Response(resp) => {
                assert_eq!(resp.error.unwrap().code, -32601);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn response_with_method_and_result_classifies_as_response() {
        // A pathological envelope with both method and result is a response
        // per the id+result rule.
        let msg: JsonRpcMessage = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","result":{}}"#,
        )
        .unwrap();
        assert!(matches!(msg, JsonRpcMessage::Response(_)));
    }

    #[test]
    fn bare_id_envelope_is_not_classifiable() {
        let result = serde_json::from_str::<JsonRpcMessage>(r#"{"jsonrpc":"2.0","id":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn response_rejects_result_and_error_together() {
        let result = serde_json::from_str::<JsonRpcResponse>(
            r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":-32603,"message":"boom"}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn response_serialization_omits_absent_side() {
        let ok = JsonRpcResponse::success(1i64, json!({"value": 8}));
        let wire = serde_json::to_value(&ok).unwrap();
        assert!(wire.get("error").is_none());

        let err = JsonRpcResponse::error(1i64, JsonRpcError::new(-32603, "boom", None));
        let wire = serde_json::to_value(&err).unwrap();
        assert!(wire.get("result").is_none());
    }

    #[test]
    fn params_as_accepts_missing_params() {
        #[derive(Deserialize, Default)]
        struct Empty {}

        let request = JsonRpcRequest::new(1i64, "tools/list", None);
        assert!(request.params_as::<Option<Empty>>().unwrap().is_none());
    }
}
