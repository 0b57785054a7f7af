//! Error taxonomy for MCP operations.
//!
//! The wire-facing kinds form a flat, numerically stable code space:
//!
//! | kind | code |
//! |---|---|
//! | ParseError | -32700 |
//! | InvalidRequest | -32600 |
//! | MethodNotFound | -32601 |
//! | InvalidParams | -32602 |
//! | InternalError | -32603 |
//! | InitializationFailed | -32000 |
//! | ToolExecutionError | -32001 |
//! | ResourceNotFound | -32002 |
//! | PermissionDenied | -32003 |
//! | RateLimitExceeded | -32004 |
//! | ValidationError | -32005 |
//! | TimeoutError | -32006 |
//!
//! Transport and serialization failures are local to the process; if one has
//! to cross the wire it does so as `InternalError` with a sanitized message.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

use crate::messages::JsonRpcError;

/// Convenience alias for results using [`McpError`].
pub type McpResult<T> = Result<T, McpError>;

/// The error type for all MCP operations.
#[derive(Error, Debug, Clone)]
pub enum McpError {
    /// Malformed JSON arrived on the wire.
    #[error("parse error: {reason}")]
    Parse {
        /// Why the payload could not be parsed.
        reason: String,
    },

    /// The envelope violates JSON-RPC structure.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// The structural violation.
        reason: String,
    },

    /// Unknown method, or unknown tool/prompt name.
    #[error("method not found: {method}")]
    MethodNotFound {
        /// The unrecognized method or extension name.
        method: String,
    },

    /// Parameters failed to decode into the expected shape.
    #[error("invalid params: {reason}")]
    InvalidParams {
        /// The decoding failure.
        reason: String,
    },

    /// Unexpected handler or endpoint failure.
    #[error("internal error: {reason}")]
    Internal {
        /// Sanitized failure description.
        reason: String,
    },

    /// `initialize` preconditions unmet, or a request arrived before the
    /// handshake completed.
    #[error("initialization failed: {reason}")]
    InitializationFailed {
        /// What the lifecycle expected instead.
        reason: String,
    },

    /// A tool handler failed.
    #[error("tool execution failed: {reason}")]
    ToolExecution {
        /// Handler-reported failure.
        reason: String,
    },

    /// No resource is registered under the URI.
    #[error("resource not found: {uri}")]
    ResourceNotFound {
        /// The unknown URI.
        uri: String,
    },

    /// A pre-dispatch hook refused the caller's credentials.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// Why access was refused.
        reason: String,
    },

    /// A pre-dispatch hook refused the call rate.
    #[error("rate limit exceeded for {key}: {limit} per window, retry in {retry_after_secs}s")]
    RateLimitExceeded {
        /// The limiter key that was saturated.
        key: String,
        /// Maximum requests per window.
        limit: usize,
        /// Seconds until the oldest in-window sample ages out.
        retry_after_secs: u64,
    },

    /// Arguments failed schema validation.
    #[error("validation failed at {instance_path}: {reason}")]
    Validation {
        /// JSON-pointer path of the offending value.
        instance_path: String,
        /// Diagnostic text.
        reason: String,
    },

    /// An outbound request exceeded its deadline, or the endpoint shut down
    /// while the request was pending.
    #[error("request timed out: {operation}")]
    Timeout {
        /// The operation that was abandoned.
        operation: String,
    },

    /// Transport-level failure. Local only.
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Serialization failure. Local only.
    #[error("serialization error: {reason}")]
    Serialization {
        /// The serde failure.
        reason: String,
    },
}

impl McpError {
    /// Numeric wire code for this error kind.
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse { .. } => -32700,
            Self::InvalidRequest { .. } => -32600,
            Self::MethodNotFound { .. } => -32601,
            Self::InvalidParams { .. } => -32602,
            Self::Internal { .. } | Self::Transport(_) | Self::Serialization { .. } => -32603,
            Self::InitializationFailed { .. } => -32000,
            Self::ToolExecution { .. } => -32001,
            Self::ResourceNotFound { .. } => -32002,
            Self::PermissionDenied { .. } => -32003,
            Self::RateLimitExceeded { .. } => -32004,
            Self::Validation { .. } => -32005,
            Self::Timeout { .. } => -32006,
        }
    }

    /// Convert to the wire error object.
    ///
    /// Structured context travels in `data`; messages stay human-readable and
    /// never include backtraces or source chains.
    pub fn to_wire(&self) -> JsonRpcError {
        let data = match self {
            Self::RateLimitExceeded {
                limit,
                retry_after_secs,
                ..
            } => Some(json!({ "retryAfter": retry_after_secs, "limit": limit })),
            Self::Validation { instance_path, .. } => {
                Some(json!({ "instancePath": instance_path }))
            }
            _ => None,
        };
        JsonRpcError::new(self.code(), self.to_string(), data)
    }

    /// Reconstruct an error from a wire error object received from a peer.
    pub fn from_wire(error: JsonRpcError) -> Self {
        let JsonRpcError {
            code,
            message,
            data,
        } = error;
        match code {
            -32700 => Self::Parse { reason: message },
            -32600 => Self::InvalidRequest { reason: message },
            -32601 => Self::MethodNotFound { method: message },
            -32602 => Self::InvalidParams { reason: message },
            -32000 => Self::InitializationFailed { reason: message },
            -32001 => Self::ToolExecution { reason: message },
            -32002 => Self::ResourceNotFound { uri: message },
            -32003 => Self::PermissionDenied { reason: message },
            -32004 => {
                let limit = data
                    .as_ref()
                    .and_then(|d| d.get("limit"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize;
                let retry_after_secs = data
                    .as_ref()
                    .and_then(|d| d.get("retryAfter"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                Self::RateLimitExceeded {
                    key: message,
                    limit,
                    retry_after_secs,
                }
            }
            -32005 => {
                let instance_path = data
                    .as_ref()
                    .and_then(|d| d.get("instancePath"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                Self::Validation {
                    instance_path,
                    reason: message,
                }
            }
            -32006 => Self::Timeout { operation: message },
            _ => Self::Internal { reason: message },
        }
    }

    /// Shorthand constructors for the common kinds.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Unknown method or extension name.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            method: method.into(),
        }
    }

    /// Parameters failed to decode.
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Unexpected failure with a sanitized description.
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Lifecycle precondition unmet.
    pub fn initialization_failed(reason: impl Into<String>) -> Self {
        Self::InitializationFailed {
            reason: reason.into(),
        }
    }

    /// Tool handler failure.
    pub fn tool_execution(reason: impl Into<String>) -> Self {
        Self::ToolExecution {
            reason: reason.into(),
        }
    }

    /// Unknown resource URI.
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        Self::ResourceNotFound { uri: uri.into() }
    }

    /// Credentials refused.
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Outbound deadline exceeded.
    pub fn request_timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: format!("{} after {:?}", operation.into(), elapsed),
        }
    }

    /// The endpoint shut down while the operation was pending.
    pub fn shutting_down() -> Self {
        Self::Timeout {
            operation: "shutting down".to_string(),
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(McpError::Parse { reason: String::new() }.code(), -32700);
        assert_eq!(McpError::invalid_request("x").code(), -32600);
        assert_eq!(McpError::method_not_found("x").code(), -32601);
        assert_eq!(McpError::invalid_params("x").code(), -32602);
        assert_eq!(McpError::internal("x").code(), -32603);
        assert_eq!(McpError::initialization_failed("x").code(), -32000);
        assert_eq!(McpError::tool_execution("x").code(), -32001);
        assert_eq!(McpError::resource_not_found("x").code(), -32002);
        assert_eq!(McpError::permission_denied("x").code(), -32003);
        assert_eq!(
            McpError::RateLimitExceeded {
                key: "m".into(),
                limit: 10,
                retry_after_secs: 1
            }
            .code(),
            -32004
        );
        assert_eq!(
            McpError::Validation {
                instance_path: "/b".into(),
                reason: "missing".into()
            }
            .code(),
            -32005
        );
        assert_eq!(McpError::shutting_down().code(), -32006);
    }

    #[test]
    fn rate_limit_data_payload() {
        let error = McpError::RateLimitExceeded {
            key: "tools/call".to_string(),
            limit: 10,
            retry_after_secs: 42,
        };
        let wire = error.to_wire();
        let data = wire.data.unwrap();
        assert_eq!(data["retryAfter"], 42);
        assert_eq!(data["limit"], 10);
    }

    #[test]
    fn validation_data_payload() {
        let error = McpError::Validation {
            instance_path: "/b".to_string(),
            reason: "missing required field: b".to_string(),
        };
        let wire = error.to_wire();
        assert_eq!(wire.code, -32005);
        assert_eq!(wire.data.unwrap()["instancePath"], "/b");
    }

    #[test]
    fn from_wire_roundtrips_kind() {
        let wire = McpError::resource_not_found("memo://gone").to_wire();
        let back = McpError::from_wire(wire);
        assert!(matches!(back, McpError::ResourceNotFound { .. }));
        assert_eq!(back.code(), -32002);
    }

    #[test]
    fn unknown_code_maps_to_internal() {
        let back = McpError::from_wire(JsonRpcError::new(-32099, "custom", None));
        assert!(matches!(back, McpError::Internal { .. }));
    }
}
