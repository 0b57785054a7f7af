//! Initialization and capability-negotiation message types.
//!
//! The handshake runs exactly once per connection:
//!
//! 1. Client sends an `initialize` request with its capabilities and info
//! 2. Server answers with its own capabilities, info, and protocol version
//! 3. Client sends the `initialized` notification
//!
//! Capability sets are exchanged during this handshake and immutable
//! afterward.

use serde::{Deserialize, Serialize};

/// MCP protocol version negotiated by this implementation.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client-to-server `initialize` request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// Protocol version requested by the client.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Capabilities offered by the client.
    pub capabilities: ClientCapabilities,

    /// Information about the client implementation.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// Server-to-client `initialize` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    /// Protocol version the session will use.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,

    /// Capabilities offered by the server.
    pub capabilities: ServerCapabilities,

    /// Information about the server implementation.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,

    /// Optional usage instructions for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Capabilities a server advertises during initialization.
///
/// Absent groups are omitted from the wire so the negotiation payload reads
/// exactly like the protocol examples (`"logging": {}`, `"tools":
/// {"listChanged": true}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,

    /// Resource-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,

    /// Prompt-related capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,

    /// Logging capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
}

impl ServerCapabilities {
    /// The full capability set advertised by a default server endpoint:
    /// logging, list-change notifications for all three registries, and
    /// resource subscriptions.
    pub fn all() -> Self {
        Self {
            tools: Some(ToolsCapability { list_changed: true }),
            resources: Some(ResourcesCapability {
                subscribe: true,
                list_changed: true,
            }),
            prompts: Some(PromptsCapability { list_changed: true }),
            logging: Some(LoggingCapability {}),
        }
    }
}

/// Tool capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCapability {
    /// Whether the endpoint emits tool list-changed notifications.
    #[serde(
        rename = "listChanged",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub list_changed: bool,
}

/// Resource capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    /// Whether the endpoint supports resource subscriptions.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub subscribe: bool,

    /// Whether the endpoint emits resource list-changed notifications.
    #[serde(
        rename = "listChanged",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub list_changed: bool,
}

/// Prompt capabilities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptsCapability {
    /// Whether the endpoint emits prompt list-changed notifications.
    #[serde(
        rename = "listChanged",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub list_changed: bool,
}

/// Logging capability. Presence alone signals support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

/// Capabilities a client advertises during initialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Sampling capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,

    /// Filesystem roots capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
}

/// Sampling capability. Presence alone signals support.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapability {}

/// Roots capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootsCapability {
    /// Whether the client emits roots list-changed notifications.
    #[serde(
        rename = "listChanged",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub list_changed: bool,
}

/// Implementation name and version, used for both serverInfo and clientInfo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,

    /// Implementation version.
    pub version: String,
}

impl Implementation {
    /// Create a new implementation descriptor.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_capabilities_wire_shape() {
        let caps = ServerCapabilities::all();
        let wire = serde_json::to_value(&caps).unwrap();
        assert_eq!(
            wire,
            json!({
                "logging": {},
                "tools": {"listChanged": true},
                "resources": {"subscribe": true, "listChanged": true},
                "prompts": {"listChanged": true}
            })
        );
    }

    #[test]
    fn absent_capability_groups_are_omitted() {
        let caps = ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            ..Default::default()
        };
        let wire = serde_json::to_value(&caps).unwrap();
        assert_eq!(wire, json!({"tools": {}}));
    }

    #[test]
    fn initialize_request_roundtrip() {
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation::new("test-client", "0.1.0"),
        };

        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(wire["clientInfo"]["name"], "test-client");

        let back: InitializeRequest = serde_json::from_value(wire).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn initialize_response_omits_absent_instructions() {
        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::all(),
            server_info: Implementation::new("test-server", "0.1.0"),
            instructions: None,
        };
        let wire = serde_json::to_value(&response).unwrap();
        assert!(wire.get("instructions").is_none());
    }
}
