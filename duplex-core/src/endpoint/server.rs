//! Server endpoint: method dispatch, registries, and lifecycle gating.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::registry::Registry;
use super::{
    spawn_pump, EndpointConfig, EndpointCore, EndpointRole, EndpointState, PromptHandler,
    ResourceHandler, StatsSnapshot, ToolHandler,
};
use crate::error::{McpError, McpResult};
use crate::hook::{HookChain, PreDispatchHook, RequestContext};
use crate::messages::{
    methods, CallToolRequest, CallToolResponse, ClientCapabilities, GetPromptRequest,
    Implementation, InitializeRequest, InitializeResponse, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, ListPromptsResponse, ListResourcesResponse, ListToolsResponse, LogLevel,
    LogMessageNotification, Prompt, ReadResourceRequest, ReadResourceResponse, Resource,
    ResourceContent, ResourceUpdatedNotification, ServerCapabilities, SetLevelRequest,
    SubscribeRequest, Tool, UnsubscribeRequest, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::schema;
use crate::transport::ByteStreamTransport;

/// What the server learned about its peer during initialization.
#[derive(Debug, Clone)]
pub struct PeerInfo {
    /// Client implementation name and version.
    pub info: Implementation,
    /// Capabilities the client advertised.
    pub capabilities: ClientCapabilities,
    /// Protocol version the client asked for.
    pub requested_protocol_version: String,
}

/// Builds an [`McpServer`].
pub struct ServerBuilder {
    info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    config: EndpointConfig,
    hooks: HookChain,
    context: RequestContext,
}

impl ServerBuilder {
    fn new(info: Implementation) -> Self {
        Self {
            info,
            capabilities: ServerCapabilities::all(),
            instructions: None,
            config: EndpointConfig::default(),
            hooks: HookChain::new(),
            context: RequestContext::new(),
        }
    }

    /// Override the advertised capability set.
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Attach usage instructions returned from `initialize`.
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Override the endpoint configuration.
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a pre-dispatch hook; hooks run in the order they were added.
    pub fn hook(mut self, hook: Arc<dyn PreDispatchHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Attach a metadata entry to the request context hooks receive (e.g.
    /// an `authorization` credential the embedder extracted out-of-band).
    pub fn context_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context = self.context.with_metadata(key, value);
        self
    }

    /// Build the server in the Created state.
    pub fn build(self) -> McpServer {
        McpServer {
            inner: Arc::new(ServerInner {
                core: EndpointCore::new(self.config),
                info: self.info,
                capabilities: self.capabilities,
                instructions: self.instructions,
                hooks: self.hooks,
                base_context: self.context,
                tools: RwLock::new(Registry::new()),
                resources: RwLock::new(Registry::new()),
                prompts: RwLock::new(Registry::new()),
                subscriptions: RwLock::new(HashSet::new()),
                log_level: RwLock::new(LogLevel::Debug),
                peer: RwLock::new(None),
                pump: StdMutex::new(None),
            }),
        }
    }
}

/// The server half of the protocol.
///
/// Built with [`McpServer::builder`], populated through the registration
/// API, wired to a transport with [`start`](McpServer::start), and torn down
/// with [`shutdown`](McpServer::shutdown).
#[derive(Clone)]
pub struct McpServer {
    inner: Arc<ServerInner>,
}

/// Handle returned by [`McpServer::start`]; resolves when the endpoint's
/// inbound pump has finished.
pub struct ServerHandle {
    pump: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait until the endpoint stops processing inbound traffic.
    pub async fn closed(self) {
        let _ = self.pump.await;
    }
}

struct ServerInner {
    core: EndpointCore,
    info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    hooks: HookChain,
    base_context: RequestContext,
    tools: RwLock<Registry<Tool, dyn ToolHandler>>,
    resources: RwLock<Registry<Resource, dyn ResourceHandler>>,
    prompts: RwLock<Registry<Prompt, dyn PromptHandler>>,
    subscriptions: RwLock<HashSet<String>>,
    log_level: RwLock<LogLevel>,
    peer: RwLock<Option<PeerInfo>>,
    pump: StdMutex<Option<AbortHandle>>,
}

impl McpServer {
    /// Start building a server.
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(Implementation::new(name, version))
    }

    /// The server's implementation descriptor.
    pub fn info(&self) -> &Implementation {
        &self.inner.info
    }

    /// The advertised capability set.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.inner.capabilities
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> EndpointState {
        self.inner.core.state().await
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.core.stats.snapshot()
    }

    /// Requests currently awaiting a response from the peer.
    pub async fn pending_requests(&self) -> usize {
        self.inner.core.pending_count().await
    }

    /// Peer details once initialization has happened.
    pub async fn peer(&self) -> Option<PeerInfo> {
        self.inner.peer.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Registration API
    // ------------------------------------------------------------------

    /// Register a tool; a prior tool of the same name is replaced.
    pub async fn add_tool(&self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        let name = tool.name.clone();
        self.inner.tools.write().await.insert(name, tool, handler);
    }

    /// Remove a tool. Removing an unknown name is a no-op.
    pub async fn remove_tool(&self, name: &str) -> bool {
        self.inner.tools.write().await.remove(name)
    }

    /// Register a resource; a prior resource of the same URI is replaced.
    pub async fn add_resource(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) {
        let uri = resource.uri.clone();
        self.inner
            .resources
            .write()
            .await
            .insert(uri, resource, handler);
    }

    /// Remove a resource. Removing an unknown URI is a no-op.
    pub async fn remove_resource(&self, uri: &str) -> bool {
        self.inner.resources.write().await.remove(uri)
    }

    /// Register a prompt; a prior prompt of the same name is replaced.
    pub async fn add_prompt(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) {
        let name = prompt.name.clone();
        self.inner
            .prompts
            .write()
            .await
            .insert(name, prompt, handler);
    }

    /// Remove a prompt. Removing an unknown name is a no-op.
    pub async fn remove_prompt(&self, name: &str) -> bool {
        self.inner.prompts.write().await.remove(name)
    }

    /// Registered tool definitions, in registration order.
    pub async fn tools(&self) -> Vec<Tool> {
        self.inner.tools.read().await.definitions()
    }

    /// Registered resource definitions, in registration order.
    pub async fn resources(&self) -> Vec<Resource> {
        self.inner.resources.read().await.definitions()
    }

    /// Registered prompt definitions, in registration order.
    pub async fn prompts(&self) -> Vec<Prompt> {
        self.inner.prompts.read().await.definitions()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Wire the transport and begin serving.
    pub async fn start(&self, transport: ByteStreamTransport) -> McpResult<ServerHandle> {
        let (sender, events) = transport.into_parts();
        self.inner.core.start(sender).await?;
        info!(server = %self.inner.info.name, "server started");

        let pump = spawn_pump(Arc::clone(&self.inner), events);
        *self.inner.pump.lock().expect("pump lock") = Some(pump.abort_handle());
        Ok(ServerHandle { pump })
    }

    /// Serve on this process's stdin/stdout.
    pub async fn start_stdio(&self) -> McpResult<ServerHandle> {
        self.start(ByteStreamTransport::stdio()).await
    }

    /// Cooperatively shut down: refuse new requests, cancel pending outbound
    /// requests, drain in-flight handlers for the grace period, close.
    pub async fn shutdown(&self) {
        self.inner.core.shutdown().await;
        if let Some(pump) = self.inner.pump.lock().expect("pump lock").take() {
            pump.abort();
        }
    }

    // ------------------------------------------------------------------
    // Outbound traffic
    // ------------------------------------------------------------------

    /// Issue a raw request to the peer with the default timeout.
    pub async fn request(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let timeout = self.inner.core.config().request_timeout;
        self.inner.core.request(method, params, timeout).await
    }

    /// Tell the peer the tool list changed.
    pub async fn notify_tools_list_changed(&self) -> McpResult<()> {
        self.inner.core.notify(methods::NOTIFY_TOOLS_CHANGED, None).await
    }

    /// Tell the peer the resource list changed.
    pub async fn notify_resources_list_changed(&self) -> McpResult<()> {
        self.inner
            .core
            .notify(methods::NOTIFY_RESOURCES_CHANGED, None)
            .await
    }

    /// Tell the peer the prompt list changed.
    pub async fn notify_prompts_list_changed(&self) -> McpResult<()> {
        self.inner
            .core
            .notify(methods::NOTIFY_PROMPTS_CHANGED, None)
            .await
    }

    /// Tell the peer a resource changed, if it holds a subscription.
    ///
    /// Returns whether a notification went out.
    pub async fn notify_resource_updated(&self, uri: &str) -> McpResult<bool> {
        if !self.inner.subscriptions.read().await.contains(uri) {
            return Ok(false);
        }
        let params = ResourceUpdatedNotification {
            uri: uri.to_string(),
        };
        self.inner
            .core
            .notify(
                methods::NOTIFY_RESOURCE_UPDATED,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        Ok(true)
    }

    /// Send a log record to the peer, honoring the level the peer set via
    /// `logging/setLevel`.
    ///
    /// Returns whether the record passed the filter.
    pub async fn send_log_message(
        &self,
        level: LogLevel,
        logger: Option<&str>,
        data: Value,
    ) -> McpResult<bool> {
        if level < *self.inner.log_level.read().await {
            return Ok(false);
        }
        let params = LogMessageNotification {
            level,
            logger: logger.map(str::to_string),
            data,
        };
        self.inner
            .core
            .notify(
                methods::NOTIFY_LOG_MESSAGE,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        Ok(true)
    }

    /// The minimum level the peer asked to receive.
    pub async fn log_level(&self) -> LogLevel {
        *self.inner.log_level.read().await
    }
}

#[async_trait]
impl EndpointRole for ServerInner {
    fn core(&self) -> &EndpointCore {
        &self.core
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        match self.dispatch_request(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::error(id, err.to_wire()),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        if let Err(err) = self.dispatch_notification(&notification).await {
            warn!(
                method = %notification.method,
                error = %err,
                "notification handling failed"
            );
        }
    }
}

impl ServerInner {
    async fn dispatch_request(&self, request: JsonRpcRequest) -> McpResult<Value> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(McpError::invalid_request(format!(
                "unsupported jsonrpc version: {}",
                request.jsonrpc
            )));
        }

        match self.core.state().await {
            EndpointState::Started => {
                if request.method != methods::INITIALIZE && request.method != methods::PING {
                    return Err(McpError::initialization_failed(format!(
                        "'{}' requires initialization; send 'initialize' first",
                        request.method
                    )));
                }
            }
            EndpointState::Initialized => {}
            EndpointState::ShuttingDown | EndpointState::Closed => {
                return Err(McpError::internal("shutting down"));
            }
            EndpointState::Created => {
                return Err(McpError::internal("endpoint not started"));
            }
        }

        let context = self.base_context.for_request(request.id.clone());
        self.hooks
            .run(&request.method, request.params.as_ref(), &context)
            .await?;

        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(&request.params).await,
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => self.handle_tools_list().await,
            methods::TOOLS_CALL => self.handle_tools_call(&request.params).await,
            methods::RESOURCES_LIST => self.handle_resources_list().await,
            methods::RESOURCES_READ => self.handle_resources_read(&request.params).await,
            methods::RESOURCES_SUBSCRIBE => self.handle_subscribe(&request.params).await,
            methods::RESOURCES_UNSUBSCRIBE => self.handle_unsubscribe(&request.params).await,
            methods::PROMPTS_LIST => self.handle_prompts_list().await,
            methods::PROMPTS_GET => self.handle_prompts_get(&request.params).await,
            // Accepted as a request even though the wire treats it as a
            // notification elsewhere; answering costs nothing.
            methods::LOGGING_SET_LEVEL => {
                let params: SetLevelRequest = parse_params(&request.params)?;
                self.set_log_level(params.level).await;
                Ok(json!({}))
            }
            other => Err(McpError::method_not_found(other)),
        }
    }

    async fn dispatch_notification(&self, notification: &JsonRpcNotification) -> McpResult<()> {
        match notification.method.as_str() {
            methods::INITIALIZED => {
                if self.core.mark_initialized().await {
                    info!("endpoint initialized");
                } else {
                    warn!("'initialized' received outside the Started state; ignored");
                }
            }
            methods::LOGGING_SET_LEVEL => {
                match notification.params_as::<SetLevelRequest>() {
                    Ok(params) => self.set_log_level(params.level).await,
                    // Unknown levels are logged and ignored.
                    Err(err) => warn!(error = %err, "ignoring logging/setLevel with unknown level"),
                }
            }
            other => {
                debug!(method = other, "ignoring unknown notification");
            }
        }
        Ok(())
    }

    async fn handle_initialize(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: InitializeRequest = parse_params(params)?;

        if self.peer.read().await.is_some() {
            return Err(McpError::initialization_failed("already initialized"));
        }

        if params.protocol_version != PROTOCOL_VERSION {
            // The advertised version is echoed regardless of what the peer
            // asked for.
            warn!(
                requested = %params.protocol_version,
                supported = PROTOCOL_VERSION,
                "client requested a different protocol version"
            );
        }

        info!(client = %params.client_info.name, "initializing session");
        *self.peer.write().await = Some(PeerInfo {
            info: params.client_info,
            capabilities: params.capabilities,
            requested_protocol_version: params.protocol_version,
        });

        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_tools_list(&self) -> McpResult<Value> {
        let response = ListToolsResponse {
            tools: self.tools.read().await.definitions(),
            next_cursor: None,
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_tools_call(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: CallToolRequest = parse_params(params)?;
        debug!(tool = %params.name, "calling tool");

        let Some((definition, handler)) = self.tools.read().await.get(&params.name) else {
            return Err(McpError::method_not_found(format!(
                "tool '{}' not found",
                params.name
            )));
        };

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let arguments = match definition.input_schema.as_ref() {
            Some(input_schema) if !schema_is_empty(input_schema) => {
                schema::apply_defaults_and_validate(input_schema, &arguments)
                    .map_err(validation_error)?
            }
            _ => arguments,
        };

        let result = handler
            .call(arguments)
            .await
            .map_err(|err| McpError::tool_execution(err.to_string()))?;

        let text = match result {
            Value::String(text) => text,
            other => serde_json::to_string(&other)?,
        };
        Ok(serde_json::to_value(CallToolResponse::text(text))?)
    }

    async fn handle_resources_list(&self) -> McpResult<Value> {
        let response = ListResourcesResponse {
            resources: self.resources.read().await.definitions(),
            next_cursor: None,
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_resources_read(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: ReadResourceRequest = parse_params(params)?;
        debug!(uri = %params.uri, "reading resource");

        let Some((definition, handler)) = self.resources.read().await.get(&params.uri) else {
            return Err(McpError::resource_not_found(&params.uri));
        };

        let data = handler
            .read(&params.uri)
            .await
            .map_err(|err| McpError::internal(format!("resource handler failed: {err}")))?;

        let mime_type = data
            .mime_type
            .or(definition.mime_type)
            .unwrap_or_else(|| "text/plain".to_string());

        let response = ReadResourceResponse {
            contents: vec![ResourceContent {
                uri: params.uri,
                mime_type: Some(mime_type),
                text: Some(data.text),
                blob: None,
            }],
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_subscribe(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: SubscribeRequest = parse_params(params)?;
        if !self.resources.read().await.contains(&params.uri) {
            return Err(McpError::resource_not_found(&params.uri));
        }
        self.subscriptions.write().await.insert(params.uri);
        Ok(json!({}))
    }

    async fn handle_unsubscribe(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: UnsubscribeRequest = parse_params(params)?;
        self.subscriptions.write().await.remove(&params.uri);
        Ok(json!({}))
    }

    async fn handle_prompts_list(&self) -> McpResult<Value> {
        let response = ListPromptsResponse {
            prompts: self.prompts.read().await.definitions(),
            next_cursor: None,
        };
        Ok(serde_json::to_value(response)?)
    }

    async fn handle_prompts_get(&self, params: &Option<Value>) -> McpResult<Value> {
        let params: GetPromptRequest = parse_params(params)?;
        debug!(prompt = %params.name, "getting prompt");

        let Some((_, handler)) = self.prompts.read().await.get(&params.name) else {
            return Err(McpError::method_not_found(format!(
                "prompt '{}' not found",
                params.name
            )));
        };

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let response = handler
            .get(arguments)
            .await
            .map_err(|err| McpError::internal(format!("prompt handler failed: {err}")))?;

        Ok(serde_json::to_value(response)?)
    }

    async fn set_log_level(&self, level: LogLevel) {
        info!(%level, "log level set");
        *self.log_level.write().await = level;
    }
}

fn schema_is_empty(input_schema: &Value) -> bool {
    match input_schema {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn validation_error(violations: Vec<schema::SchemaViolation>) -> McpError {
    let reason = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    let instance_path = violations
        .first()
        .map(|violation| violation.instance_path.clone())
        .unwrap_or_default();
    McpError::Validation {
        instance_path,
        reason,
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: &Option<Value>) -> McpResult<T> {
    let value = params
        .clone()
        .ok_or_else(|| McpError::invalid_params("missing required parameters"))?;
    serde_json::from_value(value).map_err(|err| McpError::invalid_params(err.to_string()))
}
