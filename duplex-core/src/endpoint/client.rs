//! Client endpoint: initialization flow, typed operations, and notification
//! routing.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::{
    spawn_pump, EndpointConfig, EndpointCore, EndpointRole, EndpointState, StatsSnapshot,
};
use crate::error::{McpError, McpResult};
use crate::messages::{
    methods, CallToolRequest, CallToolResponse, ClientCapabilities, GetPromptRequest,
    GetPromptResponse, Implementation, InitializeRequest, InitializeResponse, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ListPromptsResponse, ListResourcesResponse,
    ListToolsResponse, LogLevel, LogMessageNotification, ReadResourceRequest,
    ReadResourceResponse, ResourceUpdatedNotification, RootsCapability, ServerCapabilities,
    SetLevelRequest, SubscribeRequest, UnsubscribeRequest, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use crate::transport::ByteStreamTransport;

/// Observer for server-initiated notifications.
///
/// Every method has a default that logs and moves on, so implementations
/// override only the events they care about.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// The server's tool list changed.
    async fn on_tools_list_changed(&self) {
        debug!("tool list changed");
    }

    /// The server's resource list changed.
    async fn on_resources_list_changed(&self) {
        debug!("resource list changed");
    }

    /// The server's prompt list changed.
    async fn on_prompts_list_changed(&self) {
        debug!("prompt list changed");
    }

    /// A subscribed resource changed.
    async fn on_resource_updated(&self, uri: String) {
        debug!(%uri, "resource updated");
    }

    /// The server sent a log record.
    async fn on_log_message(&self, record: LogMessageNotification) {
        debug!(level = %record.level, "server log: {}", record.data);
    }
}

/// Default handler: every notification is logged and otherwise ignored.
#[derive(Debug, Default)]
pub struct LoggingNotificationHandler;

#[async_trait]
impl NotificationHandler for LoggingNotificationHandler {}

/// What the client learned about the server during initialization.
#[derive(Debug, Clone)]
pub struct NegotiatedServer {
    /// Server implementation name and version.
    pub info: Implementation,
    /// Capabilities the server advertised.
    pub capabilities: ServerCapabilities,
    /// Protocol version the server selected.
    pub protocol_version: String,
}

/// Builds an [`McpClient`].
pub struct ClientBuilder {
    info: Implementation,
    capabilities: ClientCapabilities,
    config: EndpointConfig,
    handler: Arc<dyn NotificationHandler>,
}

impl ClientBuilder {
    fn new(info: Implementation) -> Self {
        Self {
            info,
            capabilities: ClientCapabilities {
                roots: Some(RootsCapability { list_changed: true }),
                sampling: None,
            },
            config: EndpointConfig::default(),
            handler: Arc::new(LoggingNotificationHandler),
        }
    }

    /// Override the advertised capability set.
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Override the endpoint configuration.
    pub fn config(mut self, config: EndpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a notification observer.
    pub fn notification_handler(mut self, handler: Arc<dyn NotificationHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Build the client in the Created state.
    pub fn build(self) -> McpClient {
        McpClient {
            inner: Arc::new(ClientInner {
                core: EndpointCore::new(self.config),
                info: self.info,
                capabilities: self.capabilities,
                handler: self.handler,
                server: RwLock::new(None),
                pump: StdMutex::new(None),
            }),
        }
    }
}

/// The client half of the protocol.
#[derive(Clone)]
pub struct McpClient {
    inner: Arc<ClientInner>,
}

/// Handle returned by [`McpClient::start`]; resolves when the endpoint's
/// inbound pump has finished.
pub struct ClientHandle {
    pump: JoinHandle<()>,
}

impl ClientHandle {
    /// Wait until the endpoint stops processing inbound traffic.
    pub async fn closed(self) {
        let _ = self.pump.await;
    }
}

struct ClientInner {
    core: EndpointCore,
    info: Implementation,
    capabilities: ClientCapabilities,
    handler: Arc<dyn NotificationHandler>,
    server: RwLock<Option<NegotiatedServer>>,
    pump: StdMutex<Option<AbortHandle>>,
}

impl McpClient {
    /// Start building a client.
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(Implementation::new(name, version))
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

    /// Server details once initialization has happened.
    pub async fn server(&self) -> Option<NegotiatedServer> {
        self.inner.server.read().await.clone()
    }

    /// Wire the transport and begin pumping inbound traffic.
    pub async fn start(&self, transport: ByteStreamTransport) -> McpResult<ClientHandle> {
        let (sender, events) = transport.into_parts();
        self.inner.core.start(sender).await?;
        debug!(client = %self.inner.info.name, "client started");

        let pump = spawn_pump(Arc::clone(&self.inner), events);
        *self.inner.pump.lock().expect("pump lock") = Some(pump.abort_handle());
        Ok(ClientHandle { pump })
    }

    /// Run the initialization handshake: send `initialize`, await the
    /// server's answer, then send the `initialized` notification.
    pub async fn initialize(&self) -> McpResult<NegotiatedServer> {
        if self.inner.core.state().await != EndpointState::Started {
            return Err(McpError::initialization_failed(
                "initialize requires a started, uninitialized client",
            ));
        }

        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.inner.capabilities.clone(),
            client_info: self.inner.info.clone(),
        };
        let timeout = self.inner.core.config().initialize_timeout;
        let result = self
            .inner
            .core
            .request(
                methods::INITIALIZE,
                Some(serde_json::to_value(request)?),
                timeout,
            )
            .await?;

        let response: InitializeResponse = serde_json::from_value(result)
            .map_err(|err| McpError::initialization_failed(format!("malformed result: {err}")))?;

        if response.protocol_version != PROTOCOL_VERSION {
            warn!(
                server = %response.protocol_version,
                supported = PROTOCOL_VERSION,
                "server negotiated a different protocol version"
            );
        }

        self.inner.core.notify(methods::INITIALIZED, None).await?;
        self.inner.core.mark_initialized().await;

        let negotiated = NegotiatedServer {
            info: response.server_info,
            capabilities: response.capabilities,
            protocol_version: response.protocol_version,
        };
        *self.inner.server.write().await = Some(negotiated.clone());
        info!(server = %negotiated.info.name, "session initialized");
        Ok(negotiated)
    }

    /// Cooperatively shut down: cancel pending requests and drain handlers.
    pub async fn shutdown(&self) {
        self.inner.core.shutdown().await;
        if let Some(pump) = self.inner.pump.lock().expect("pump lock").take() {
            pump.abort();
        }
    }

    /// Issue a raw request. `timeout` falls back to the configured default.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> McpResult<Value> {
        let timeout = timeout.unwrap_or(self.inner.core.config().request_timeout);
        self.inner.core.request(method, params, timeout).await
    }

    /// Health check.
    pub async fn ping(&self) -> McpResult<()> {
        self.request(methods::PING, None, None).await.map(|_| ())
    }

    /// List the server's tools.
    pub async fn list_tools(&self) -> McpResult<ListToolsResponse> {
        self.ensure_ready().await?;
        let result = self.request(methods::TOOLS_LIST, None, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Invoke a tool by name.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> McpResult<CallToolResponse> {
        self.ensure_ready().await?;
        let params = CallToolRequest {
            name: name.into(),
            arguments,
        };
        let result = self
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(params)?), None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// List the server's resources.
    pub async fn list_resources(&self) -> McpResult<ListResourcesResponse> {
        self.ensure_ready().await?;
        let result = self.request(methods::RESOURCES_LIST, None, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResponse> {
        self.ensure_ready().await?;
        let params = ReadResourceRequest { uri: uri.into() };
        let result = self
            .request(
                methods::RESOURCES_READ,
                Some(serde_json::to_value(params)?),
                None,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Subscribe to update notifications for a resource.
    pub async fn subscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        self.ensure_ready().await?;
        let params = SubscribeRequest { uri: uri.into() };
        self.request(
            methods::RESOURCES_SUBSCRIBE,
            Some(serde_json::to_value(params)?),
            None,
        )
        .await
        .map(|_| ())
    }

    /// Drop a resource subscription.
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        self.ensure_ready().await?;
        let params = UnsubscribeRequest { uri: uri.into() };
        self.request(
            methods::RESOURCES_UNSUBSCRIBE,
            Some(serde_json::to_value(params)?),
            None,
        )
        .await
        .map(|_| ())
    }

    /// List the server's prompts.
    pub async fn list_prompts(&self) -> McpResult<ListPromptsResponse> {
        self.ensure_ready().await?;
        let result = self.request(methods::PROMPTS_LIST, None, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Generate a prompt by name.
    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
    ) -> McpResult<GetPromptResponse> {
        self.ensure_ready().await?;
        let params = GetPromptRequest {
            name: name.into(),
            arguments,
        };
        let result = self
            .request(methods::PROMPTS_GET, Some(serde_json::to_value(params)?), None)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Ask the server to only send log records at `level` and above.
    ///
    /// Sent as a notification; the server applies it silently.
    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        self.ensure_ready().await?;
        let params = SetLevelRequest { level };
        self.inner
            .core
            .notify(
                methods::LOGGING_SET_LEVEL,
                Some(serde_json::to_value(params)?),
            )
            .await
    }

    async fn ensure_ready(&self) -> McpResult<()> {
        match self.inner.core.state().await {
            EndpointState::Initialized => Ok(()),
            state => Err(McpError::initialization_failed(format!(
                "client is not initialized (state {state:?})"
            ))),
        }
    }
}

#[async_trait]
impl EndpointRole for ClientInner {
    fn core(&self) -> &EndpointCore {
        &self.core
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        // The client's inbound method set is minimal: it health-checks and
        // refuses everything else.
        let id = request.id.clone();
        if request.jsonrpc != JSONRPC_VERSION {
            return JsonRpcResponse::error(
                id,
                McpError::invalid_request(format!(
                    "unsupported jsonrpc version: {}",
                    request.jsonrpc
                ))
                .to_wire(),
            );
        }
        match request.method.as_str() {
            methods::PING => JsonRpcResponse::success(id, json!({})),
            other => JsonRpcResponse::error(id, McpError::method_not_found(other).to_wire()),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            methods::NOTIFY_TOOLS_CHANGED => self.handler.on_tools_list_changed().await,
            methods::NOTIFY_RESOURCES_CHANGED => self.handler.on_resources_list_changed().await,
            methods::NOTIFY_PROMPTS_CHANGED => self.handler.on_prompts_list_changed().await,
            methods::NOTIFY_RESOURCE_UPDATED => {
                match notification.params_as::<ResourceUpdatedNotification>() {
                    Ok(params) => self.handler.on_resource_updated(params.uri).await,
                    Err(err) => warn!(error = %err, "malformed resources/updated notification"),
                }
            }
            methods::NOTIFY_LOG_MESSAGE => {
                match notification.params_as::<LogMessageNotification>() {
                    Ok(record) => self.handler.on_log_message(record).await,
                    Err(err) => warn!(error = %err, "malformed log notification"),
                }
            }
            other => {
                debug!(method = other, "ignoring unknown notification");
            }
        }
    }
}
