//! Handler traits and the insertion-ordered registries behind them.
//!
//! Registries are owned by the endpoint and scoped to it. Keys are unique:
//! re-registering a key replaces the prior entry (last writer wins) and the
//! replacement joins the end of the enumeration order, so `*/list` output
//! always equals the surviving registration history. Removal is idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::McpResult;
use crate::messages::prompts::GetPromptResponse;

/// Executes a registered tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with validated arguments.
    ///
    /// The returned value is wrapped into a text content block by the
    /// server: strings verbatim, anything else as serialized JSON.
    async fn call(&self, arguments: Value) -> McpResult<Value>;
}

/// Content produced by a resource handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    /// The resource text.
    pub text: String,
    /// MIME type; the registered definition or `text/plain` applies when
    /// absent.
    pub mime_type: Option<String>,
}

impl ResourceData {
    /// Plain text content with no declared MIME type.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mime_type: None,
        }
    }

    /// Set the MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Reads a registered resource.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Produce the resource content for the given URI.
    async fn read(&self, uri: &str) -> McpResult<ResourceData>;
}

/// Generates a registered prompt.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Produce the prompt messages for the given arguments.
    ///
    /// The handler's output is returned to the peer verbatim.
    async fn get(&self, arguments: Value) -> McpResult<GetPromptResponse>;
}

/// Wrap a plain function as a [`ToolHandler`].
pub fn tool_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value) -> McpResult<Value> + Send + Sync + 'static,
{
    struct FnTool<F>(F);

    #[async_trait]
    impl<F> ToolHandler for FnTool<F>
    where
        F: Fn(Value) -> McpResult<Value> + Send + Sync,
    {
        async fn call(&self, arguments: Value) -> McpResult<Value> {
            (self.0)(arguments)
        }
    }

    Arc::new(FnTool(f))
}

/// Wrap a plain function as a [`ResourceHandler`].
pub fn resource_fn<F>(f: F) -> Arc<dyn ResourceHandler>
where
    F: Fn(&str) -> McpResult<ResourceData> + Send + Sync + 'static,
{
    struct FnResource<F>(F);

    #[async_trait]
    impl<F> ResourceHandler for FnResource<F>
    where
        F: Fn(&str) -> McpResult<ResourceData> + Send + Sync,
    {
        async fn read(&self, uri: &str) -> McpResult<ResourceData> {
            (self.0)(uri)
        }
    }

    Arc::new(FnResource(f))
}

/// Wrap a plain function as a [`PromptHandler`].
pub fn prompt_fn<F>(f: F) -> Arc<dyn PromptHandler>
where
    F: Fn(Value) -> McpResult<GetPromptResponse> + Send + Sync + 'static,
{
    struct FnPrompt<F>(F);

    #[async_trait]
    impl<F> PromptHandler for FnPrompt<F>
    where
        F: Fn(Value) -> McpResult<GetPromptResponse> + Send + Sync,
    {
        async fn get(&self, arguments: Value) -> McpResult<GetPromptResponse> {
            (self.0)(arguments)
        }
    }

    Arc::new(FnPrompt(f))
}

/// An insertion-ordered registry pairing a definition with its handler.
pub(crate) struct Registry<D, H: ?Sized> {
    entries: Vec<Registered<D, H>>,
}

struct Registered<D, H: ?Sized> {
    key: String,
    definition: D,
    handler: Arc<H>,
}

impl<D: Clone, H: ?Sized> Registry<D, H> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register under `key`. A prior entry under the same key is replaced
    /// and the new entry joins the end of the enumeration order.
    pub(crate) fn insert(&mut self, key: impl Into<String>, definition: D, handler: Arc<H>) {
        let key = key.into();
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(Registered {
            key,
            definition,
            handler,
        });
    }

    /// Remove by key. Returns whether an entry existed; removing an absent
    /// key is a no-op.
    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.key != key);
        self.entries.len() != before
    }

    /// Definition and handler for `key`.
    pub(crate) fn get(&self, key: &str) -> Option<(D, Arc<H>)> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| (entry.definition.clone(), Arc::clone(&entry.handler)))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| entry.key == key)
    }

    /// Definitions in enumeration order.
    pub(crate) fn definitions(&self) -> Vec<D> {
        self.entries
            .iter()
            .map(|entry| entry.definition.clone())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<D: Clone, H: ?Sized> Default for Registry<D, H> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Tool;

    fn noop() -> Arc<dyn ToolHandler> {
        tool_fn(|_| Ok(Value::Null))
    }

    fn names(registry: &Registry<Tool, dyn ToolHandler>) -> Vec<String> {
        registry
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect()
    }

    #[test]
    fn enumeration_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.insert("c", Tool::new("c", ""), noop());
        registry.insert("a", Tool::new("a", ""), noop());
        registry.insert("b", Tool::new("b", ""), noop());
        assert_eq!(names(&registry), vec!["c", "a", "b"]);
    }

    #[test]
    fn reinsert_replaces_and_moves_to_end() {
        let mut registry = Registry::new();
        registry.insert("a", Tool::new("a", "first"), noop());
        registry.insert("b", Tool::new("b", ""), noop());
        registry.insert("a", Tool::new("a", "second"), noop());

        assert_eq!(names(&registry), vec!["b", "a"]);
        let (definition, _) = registry.get("a").unwrap();
        assert_eq!(definition.description, "second");
    }

    #[test]
    fn removal_is_idempotent() {
        let mut registry: Registry<Tool, dyn ToolHandler> = Registry::new();
        registry.insert("a", Tool::new("a", ""), noop());
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn random_histories_match_filtered_model() {
        // A deterministic pseudo-random walk of add/remove operations; the
        // registry must always equal the surviving registration history.
        let keys = ["a", "b", "c", "d"];
        let mut registry: Registry<Tool, dyn ToolHandler> = Registry::new();
        let mut model: Vec<String> = Vec::new();

        let mut seed: u64 = 0x9e3779b97f4a7c15;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let key = keys[(seed >> 33) as usize % keys.len()];
            if (seed >> 7) % 3 == 0 {
                registry.remove(key);
                model.retain(|k| k != key);
            } else {
                registry.insert(key, Tool::new(key, ""), noop());
                model.retain(|k| k != key);
                model.push(key.to_string());
            }
            assert_eq!(names(&registry), model);
        }
    }

    #[tokio::test]
    async fn fn_adapters_invoke_the_function() {
        let handler = tool_fn(|args| Ok(args));
        let echoed = handler.call(Value::String("hi".into())).await.unwrap();
        assert_eq!(echoed, Value::String("hi".into()));

        let resource = resource_fn(|uri| Ok(ResourceData::text(format!("read {uri}"))));
        let data = resource.read("memo://x").await.unwrap();
        assert_eq!(data.text, "read memo://x");
    }
}
