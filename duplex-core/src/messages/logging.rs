//! Logging message types: level control and server-to-client log messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log severity, least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Routine events.
    Info,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failures.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// `logging/setLevel` parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLevelRequest {
    /// Minimum severity the peer wants to receive.
    pub level: LogLevel,
}

/// `notifications/message` parameters: a log record sent to the peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessageNotification {
    /// Record severity.
    pub level: LogLevel,

    /// Logger name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,

    /// Record payload.
    pub data: Value,
}
