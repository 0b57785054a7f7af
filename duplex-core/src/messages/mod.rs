//! MCP message types and JSON-RPC structures.
//!
//! Everything that crosses the wire lives here, grouped the way the protocol
//! groups it:
//!
//! - [`core`]: JSON-RPC envelopes (request, response, notification, error)
//! - [`initialization`]: handshake and capability negotiation
//! - [`tools`]: tool discovery and invocation
//! - [`resources`]: resource discovery, reading, and subscriptions
//! - [`prompts`]: prompt templates and generation
//! - [`logging`]: log-level control and log-record notifications
//!
//! Encoding is strict JSON; `params`, `result`, and `error.data` accept any
//! JSON value, and request ids round-trip with their wire type intact.

pub mod core;
pub mod initialization;
pub mod logging;
pub mod prompts;
pub mod resources;
pub mod tools;

pub use self::core::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};
pub use initialization::{
    ClientCapabilities, Implementation, InitializeRequest, InitializeResponse, LoggingCapability,
    PromptsCapability, ResourcesCapability, RootsCapability, SamplingCapability,
    ServerCapabilities, ToolsCapability, PROTOCOL_VERSION,
};
pub use logging::{LogLevel, LogMessageNotification, SetLevelRequest};
pub use prompts::{
    GetPromptRequest, GetPromptResponse, ListPromptsRequest, ListPromptsResponse, MessageRole,
    Prompt, PromptArgument, PromptListChangedNotification, PromptMessage,
};
pub use resources::{
    ListResourcesRequest, ListResourcesResponse, ReadResourceRequest, ReadResourceResponse,
    Resource, ResourceContent, ResourceListChangedNotification, ResourceUpdatedNotification,
    SubscribeRequest, UnsubscribeRequest,
};
pub use tools::{
    CallToolRequest, CallToolResponse, Content, ListToolsRequest, ListToolsResponse, Tool,
    ToolListChangedNotification,
};

/// Well-known method names, shared by both endpoint roles.
pub mod methods {
    /// `initialize` request.
    pub const INITIALIZE: &str = "initialize";
    /// `initialized` notification.
    pub const INITIALIZED: &str = "initialized";
    /// `ping` request.
    pub const PING: &str = "ping";
    /// `tools/list` request.
    pub const TOOLS_LIST: &str = "tools/list";
    /// `tools/call` request.
    pub const TOOLS_CALL: &str = "tools/call";
    /// `resources/list` request.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// `resources/read` request.
    pub const RESOURCES_READ: &str = "resources/read";
    /// `resources/subscribe` request.
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    /// `resources/unsubscribe` request.
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    /// `prompts/list` request.
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// `prompts/get` request.
    pub const PROMPTS_GET: &str = "prompts/get";
    /// `logging/setLevel`.
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    /// `notifications/message` log record.
    pub const NOTIFY_LOG_MESSAGE: &str = "notifications/message";
    /// `notifications/tools/list_changed`.
    pub const NOTIFY_TOOLS_CHANGED: &str = "notifications/tools/list_changed";
    /// `notifications/resources/list_changed`.
    pub const NOTIFY_RESOURCES_CHANGED: &str = "notifications/resources/list_changed";
    /// `notifications/resources/updated`.
    pub const NOTIFY_RESOURCE_UPDATED: &str = "notifications/resources/updated";
    /// `notifications/prompts/list_changed`.
    pub const NOTIFY_PROMPTS_CHANGED: &str = "notifications/prompts/list_changed";
}
