//! Tool discovery and invocation message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// `tools/list` request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListToolsRequest {
    /// Optional pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResponse {
    /// Registered tools in registration order.
    pub tools: Vec<Tool>,

    /// Cursor for the next page of results.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool name.
    pub name: String,

    /// What the tool does.
    pub description: String,

    /// JSON Schema for the tool's arguments.
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl Tool {
    /// Create a new tool definition without an input schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
        }
    }

    /// Attach an input schema to this tool.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// `tools/call` request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolRequest {
    /// Name of the tool to invoke.
    pub name: String,

    /// Arguments for the tool. An absent field is equivalent to `{}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `tools/call` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResponse {
    /// Output content blocks.
    #[serde(default)]
    pub content: Vec<Content>,

    /// Whether the content describes a failure. Omitted when false.
    #[serde(
        rename = "isError",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl CallToolResponse {
    /// Wrap a single text block into a successful response.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }
}

/// A content block in tool output or prompt messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Text content.
    Text {
        /// The text.
        text: String,
    },

    /// Image content.
    Image {
        /// Base64-encoded image data.
        data: String,

        /// MIME type, e.g. `image/png`.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// Embedded resource content.
    Resource {
        /// The referenced resource.
        resource: crate::messages::resources::ResourceContent,
    },
}

/// `notifications/tools/list_changed` parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolListChangedNotification {
    /// Additional metadata about the change.
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_tool_response_wire_shape() {
        let response = CallToolResponse::text("8");
        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire, json!({"content": [{"type": "text", "text": "8"}]}));
    }

    #[test]
    fn call_tool_request_without_arguments() {
        let request: CallToolRequest = serde_json::from_value(json!({"name": "add"})).unwrap();
        assert_eq!(request.name, "add");
        assert!(request.arguments.is_none());
    }

    #[test]
    fn tool_definition_wire_shape() {
        let tool = Tool::new("add", "Adds two numbers").with_input_schema(json!({
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        }));
        let wire = serde_json::to_value(&tool).unwrap();
        assert_eq!(wire["name"], "add");
        assert!(wire["inputSchema"]["required"].is_array());
    }

    #[test]
    fn is_error_omitted_when_false() {
        let wire = serde_json::to_value(CallToolResponse::text("ok")).unwrap();
        assert!(wire.get("isError").is_none());
    }
}
