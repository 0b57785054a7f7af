//! Pre-dispatch hooks.
//!
//! Hooks form an ordered chain the server runs after a message is classified
//! and lifecycle-gated but before the method handler executes, on inbound
//! requests only, never on notifications or responses. A hook that returns
//! `Ok(())` lets dispatch continue; a hook that returns an error aborts the
//! request, and that error becomes the response.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::McpResult;
use crate::messages::RequestId;

/// Per-request context handed to every hook.
///
/// `metadata` is supplied by the embedder when the endpoint is built; this is
/// where header-like fields such as `authorization` travel for transports
/// that have no headers of their own.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identifier of the connection this request arrived on.
    pub session_id: String,
    /// JSON-RPC id of the request under dispatch.
    pub request_id: Option<RequestId>,
    /// Embedder-supplied metadata.
    pub metadata: HashMap<String, Value>,
}

impl RequestContext {
    /// Create a context with a fresh session id and no metadata.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            request_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Look up a metadata entry as a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub(crate) fn for_request(&self, request_id: RequestId) -> Self {
        Self {
            session_id: self.session_id.clone(),
            request_id: Some(request_id),
            metadata: self.metadata.clone(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A pluggable check that runs before method dispatch.
#[async_trait]
pub trait PreDispatchHook: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Permit or refuse the request.
    ///
    /// Returning an error aborts dispatch; the error is sent to the peer as
    /// the response for this request.
    async fn before_dispatch(
        &self,
        method: &str,
        params: Option<&Value>,
        context: &RequestContext,
    ) -> McpResult<()>;
}

/// An ordered chain of hooks, composed by iteration.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn PreDispatchHook>>,
}

impl HookChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook; hooks run in insertion order.
    pub fn push(&mut self, hook: Arc<dyn PreDispatchHook>) {
        self.hooks.push(hook);
    }

    /// Number of hooks in the chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in order; the first error aborts the chain.
    pub async fn run(
        &self,
        method: &str,
        params: Option<&Value>,
        context: &RequestContext,
    ) -> McpResult<()> {
        for hook in &self.hooks {
            if let Err(err) = hook.before_dispatch(method, params, context).await {
                tracing::debug!(hook = hook.name(), method, error = %err, "hook refused request");
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for HookChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::McpError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHook {
        calls: AtomicUsize,
        refuse: bool,
    }

    #[async_trait]
    impl PreDispatchHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        async fn before_dispatch(
            &self,
            _method: &str,
            _params: Option<&Value>,
            _context: &RequestContext,
        ) -> McpResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.refuse {
                Err(McpError::permission_denied("refused by test hook"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn hooks_run_in_order_until_first_error() {
        let first = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            refuse: false,
        });
        let second = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            refuse: true,
        });
        let third = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
            refuse: false,
        });

        let mut chain = HookChain::new();
        chain.push(first.clone());
        chain.push(second.clone());
        chain.push(third.clone());

        let context = RequestContext::new();
        let result = chain.run("tools/list", None, &context).await;

        assert!(matches!(result, Err(McpError::PermissionDenied { .. })));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_chain_permits_everything() {
        let chain = HookChain::new();
        let context = RequestContext::new();
        assert!(chain.run("anything", None, &context).await.is_ok());
    }

    #[test]
    fn context_carries_metadata() {
        let context =
            RequestContext::new().with_metadata("authorization", Value::String("Bearer k".into()));
        assert_eq!(context.metadata_str("authorization"), Some("Bearer k"));
        assert_eq!(context.metadata_str("missing"), None);
    }
}
