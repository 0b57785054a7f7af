//! Prompt template discovery and generation message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::messages::tools::Content;

/// `prompts/list` request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPromptsRequest {
    /// Optional pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `prompts/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPromptsResponse {
    /// Registered prompts in registration order.
    pub prompts: Vec<Prompt>,

    /// Cursor for the next page of results.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Prompt definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Unique prompt name.
    pub name: String,

    /// What the prompt produces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

impl Prompt {
    /// Create a new prompt definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare an argument.
    pub fn with_argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.push(argument);
        self
    }
}

/// Declared argument of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,

    /// What the argument controls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the argument must be supplied.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
}

impl PromptArgument {
    /// Create an optional argument.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            required: false,
        }
    }

    /// Mark this argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// `prompts/get` request parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptRequest {
    /// Name of the prompt to generate.
    pub name: String,

    /// Arguments to substitute. An absent field is equivalent to `{}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// `prompts/get` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptResponse {
    /// Description of the generated prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Generated messages.
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

/// One message of a generated prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// Message role.
    pub role: MessageRole,

    /// Message content.
    pub content: Content,
}

impl PromptMessage {
    /// Create a user text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Content::Text { text: text.into() },
        }
    }

    /// Create an assistant text message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Content::Text { text: text.into() },
        }
    }
}

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Human input.
    User,
    /// Model output.
    Assistant,
}

/// `notifications/prompts/list_changed` parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptListChangedNotification {
    /// Additional metadata about the change.
    #[serde(flatten)]
    pub metadata: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_definition_wire_shape() {
        let prompt = Prompt::new("greeting")
            .with_description("Greets someone by name")
            .with_argument(PromptArgument::new("name").required());

        let wire = serde_json::to_value(&prompt).unwrap();
        assert_eq!(
            wire,
            json!({
                "name": "greeting",
                "description": "Greets someone by name",
                "arguments": [{"name": "name", "required": true}]
            })
        );
    }

    #[test]
    fn prompt_message_wire_shape() {
        let message = PromptMessage::user("Say hello to Ada");
        let wire = serde_json::to_value(&message).unwrap();
        assert_eq!(
            wire,
            json!({"role": "user", "content": {"type": "text", "text": "Say hello to Ada"}})
        );
    }

    #[test]
    fn get_prompt_response_roundtrip() {
        let response = GetPromptResponse {
            description: None,
            messages: vec![PromptMessage::assistant("Hello, Ada!")],
        };
        let wire = serde_json::to_value(&response).unwrap();
        let back: GetPromptResponse = serde_json::from_value(wire).unwrap();
        assert_eq!(back, response);
    }
}
