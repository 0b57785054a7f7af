//! Endpoint core shared by the server and client roles.
//!
//! Both roles run the same machinery: a pending-request table correlating
//! outbound requests with inbound responses by id, a monotone numeric id
//! generator, a lifecycle state machine, and an inbound pump that classifies
//! arriving messages and dispatches each request in its own task so slow
//! handlers never stall the pump. The roles differ only in the method sets
//! they dispatch.

mod client;
mod registry;
mod server;

pub use client::{
    ClientBuilder, ClientHandle, LoggingNotificationHandler, McpClient, NegotiatedServer,
    NotificationHandler,
};
pub use registry::{
    prompt_fn, resource_fn, tool_fn, PromptHandler, ResourceData, ResourceHandler, ToolHandler,
};
pub use server::{McpServer, PeerInfo, ServerBuilder, ServerHandle};

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{McpError, McpResult};
use crate::messages::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};
use crate::transport::{TransportEvent, TransportSender};

/// Lifecycle state of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Built; registries may be populated; no I/O yet.
    Created,
    /// Transport wired; only the initialization handshake is accepted.
    Started,
    /// Handshake complete; the full method set is accepted.
    Initialized,
    /// Draining; new requests are refused, pending requests cancelled.
    ShuttingDown,
    /// Terminal.
    Closed,
}

/// Tuning knobs shared by both endpoint roles.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Default deadline for outbound requests.
    pub request_timeout: Duration,

    /// Deadline for the initialization handshake (client role).
    pub initialize_timeout: Duration,

    /// How long in-flight handlers may drain during shutdown.
    pub shutdown_grace: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(30_000),
            initialize_timeout: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

/// Point-in-time snapshot of endpoint counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Outbound requests issued.
    pub requests_sent: u64,
    /// Responses delivered to waiters.
    pub responses_received: u64,
    /// Inbound requests dispatched.
    pub requests_received: u64,
    /// Outbound notifications.
    pub notifications_sent: u64,
    /// Inbound notifications.
    pub notifications_received: u64,
    /// Unparseable or unclassifiable inbound lines.
    pub protocol_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct EndpointStats {
    requests_sent: AtomicU64,
    responses_received: AtomicU64,
    requests_received: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_received: AtomicU64,
    protocol_errors: AtomicU64,
}

impl EndpointStats {
    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            responses_received: self.responses_received.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
        }
    }
}

/// Counts handler tasks so shutdown can drain them for a bounded grace
/// period.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlightTracker {
    inner: Arc<InFlightInner>,
}

#[derive(Debug, Default)]
struct InFlightInner {
    count: AtomicUsize,
    notify: Notify,
}

pub(crate) struct InFlightGuard {
    inner: Arc<InFlightInner>,
}

impl InFlightTracker {
    pub(crate) fn enter(&self) -> InFlightGuard {
        self.inner.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Resolve once no handler tasks remain.
    pub(crate) async fn drained(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before the count check so a guard dropped in between
            // still wakes this waiter.
            notified.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

type PendingTable = Mutex<HashMap<RequestId, oneshot::Sender<McpResult<Value>>>>;

/// Mechanics shared by both roles: pending table, id generation, state, and
/// the outbound path.
pub(crate) struct EndpointCore {
    outbound: OnceLock<TransportSender>,
    state: RwLock<EndpointState>,
    pending: PendingTable,
    next_request_id: AtomicI64,
    config: EndpointConfig,
    pub(crate) in_flight: InFlightTracker,
    pub(crate) stats: EndpointStats,
}

impl EndpointCore {
    pub(crate) fn new(config: EndpointConfig) -> Self {
        Self {
            outbound: OnceLock::new(),
            state: RwLock::new(EndpointState::Created),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicI64::new(1),
            config,
            in_flight: InFlightTracker::default(),
            stats: EndpointStats::default(),
        }
    }

    pub(crate) fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub(crate) async fn state(&self) -> EndpointState {
        *self.state.read().await
    }

    /// Created -> Started, wiring the transport sender.
    pub(crate) async fn start(&self, sender: TransportSender) -> McpResult<()> {
        let mut state = self.state.write().await;
        if *state != EndpointState::Created {
            return Err(McpError::internal(format!(
                "endpoint cannot start from state {state:?}"
            )));
        }
        self.outbound
            .set(sender)
            .map_err(|_| McpError::internal("transport already attached"))?;
        *state = EndpointState::Started;
        Ok(())
    }

    /// Started -> Initialized. Returns false if the endpoint was in any other
    /// state.
    pub(crate) async fn mark_initialized(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == EndpointState::Started {
            *state = EndpointState::Initialized;
            true
        } else {
            false
        }
    }

    fn sender(&self) -> McpResult<&TransportSender> {
        self.outbound
            .get()
            .ok_or_else(|| McpError::internal("transport not connected"))
    }

    pub(crate) async fn send_message(&self, message: JsonRpcMessage) -> McpResult<()> {
        self.sender()?.send(&message).await?;
        Ok(())
    }

    /// Send a notification (fire and forget).
    pub(crate) async fn notify(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.send_message(JsonRpcMessage::Notification(notification))
            .await?;
        self.stats.notifications_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Issue an outbound request and await its outcome.
    ///
    /// Exactly one of three things resolves the call: the matching response
    /// arrives, the deadline fires, or the endpoint shuts down. In every
    /// case the pending entry is removed; a response arriving after the
    /// deadline is logged and dropped by [`resolve_response`].
    ///
    /// [`resolve_response`]: Self::resolve_response
    pub(crate) async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> McpResult<Value> {
        {
            let state = self.state.read().await;
            if matches!(*state, EndpointState::ShuttingDown | EndpointState::Closed) {
                return Err(McpError::shutting_down());
            }
        }

        let id = RequestId::Number(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let (resolver, mut waiter) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), resolver);

        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.clone(),
            method: method.to_string(),
            params,
        };

        if let Err(err) = self.send_message(JsonRpcMessage::Request(request)).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }
        self.stats.requests_sent.fetch_add(1, Ordering::Relaxed);

        tokio::select! {
            outcome = &mut waiter => match outcome {
                Ok(result) => result,
                // The resolver was dropped without a value; shutdown drained it.
                Err(_) => Err(McpError::shutting_down()),
            },
            () = tokio::time::sleep(timeout) => {
                self.pending.lock().await.remove(&id);
                // The response may have been delivered in the same instant
                // the timer fired; prefer it over reporting a timeout.
                if let Ok(result) = waiter.try_recv() {
                    return result;
                }
                debug!(%id, method, ?timeout, "outbound request timed out");
                Err(McpError::request_timeout(method, timeout))
            }
        }
    }

    /// Route an inbound response to its waiter; unmatched responses are
    /// logged and dropped.
    pub(crate) async fn resolve_response(&self, response: JsonRpcResponse) {
        let resolver = self.pending.lock().await.remove(&response.id);
        match resolver {
            Some(resolver) => {
                self.stats
                    .responses_received
                    .fetch_add(1, Ordering::Relaxed);
                let outcome = match (response.result, response.error) {
                    (Some(result), None) => Ok(result),
                    (None, Some(error)) => Err(McpError::from_wire(error)),
                    // Unreachable for wire-decoded responses; guards locally
                    // constructed ones.
                    _ => Err(McpError::invalid_request(
                        "response must carry exactly one of result and error",
                    )),
                };
                let _ = resolver.send(outcome);
            }
            None => {
                warn!(id = %response.id, "dropping response with no pending request");
            }
        }
    }

    /// Number of requests currently awaiting a response.
    pub(crate) async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Move to ShuttingDown, cancel every pending request, drain in-flight
    /// handlers for the grace period, then close.
    ///
    /// Idempotent: later calls return immediately.
    pub(crate) async fn shutdown(&self) {
        {
            let mut state = self.state.write().await;
            if matches!(*state, EndpointState::ShuttingDown | EndpointState::Closed) {
                return;
            }
            *state = EndpointState::ShuttingDown;
        }

        let drained: Vec<_> = {
            let mut pending = self.pending.lock().await;
            pending.drain().collect()
        };
        for (id, resolver) in drained {
            debug!(%id, "cancelling pending request on shutdown");
            let _ = resolver.send(Err(McpError::shutting_down()));
        }

        if tokio::time::timeout(self.config.shutdown_grace, self.in_flight.drained())
            .await
            .is_err()
        {
            warn!(
                remaining = self.in_flight.count(),
                "handlers still running after shutdown grace period"
            );
        }

        if let Some(sender) = self.outbound.get() {
            sender.close().await;
        }
        *self.state.write().await = EndpointState::Closed;
    }
}

impl std::fmt::Debug for EndpointCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointCore")
            .field("connected", &self.outbound.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Role-specific half of an endpoint: what to do with inbound requests and
/// notifications once the shared pump has classified them.
#[async_trait]
pub(crate) trait EndpointRole: Send + Sync + 'static {
    fn core(&self) -> &EndpointCore;

    /// Dispatch one inbound request, producing exactly one response.
    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse;

    /// Dispatch one inbound notification. Never produces a response; failures
    /// are logged by the implementation.
    async fn handle_notification(&self, notification: JsonRpcNotification);
}

/// The shared inbound pump.
///
/// Classification follows the wire rules: responses resolve the pending
/// table; each request dispatches in its own task so slow handlers never
/// stall the pump; notifications run inline so protocol state transitions
/// stay ordered relative to the requests behind them; unclassifiable
/// envelopes with an id are answered with InvalidRequest and everything else
/// malformed is logged. Transport closure triggers the shutdown transition.
pub(crate) fn spawn_pump<R: EndpointRole>(
    role: Arc<R>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Message(JsonRpcMessage::Response(response)) => {
                    role.core().resolve_response(response).await;
                }
                TransportEvent::Message(JsonRpcMessage::Request(request)) => {
                    role.core()
                        .stats
                        .requests_received
                        .fetch_add(1, Ordering::Relaxed);
                    let guard = role.core().in_flight.enter();
                    let role = Arc::clone(&role);
                    tokio::spawn(async move {
                        let response = role.handle_request(request).await;
                        if let Err(err) = role
                            .core()
                            .send_message(JsonRpcMessage::Response(response))
                            .await
                        {
                            warn!(error = %err, "failed to send response");
                        }
                        drop(guard);
                    });
                }
                TransportEvent::Message(JsonRpcMessage::Notification(notification)) => {
                    role.core()
                        .stats
                        .notifications_received
                        .fetch_add(1, Ordering::Relaxed);
                    // Notifications run inline: lifecycle transitions like
                    // `initialized` must be ordered before any request that
                    // arrives after them.
                    role.handle_notification(notification).await;
                }
                TransportEvent::ParseFailure { id, detail } => {
                    role.core()
                        .stats
                        .protocol_errors
                        .fetch_add(1, Ordering::Relaxed);
                    match id {
                        Some(id) => {
                            warn!(%id, %detail, "answering unclassifiable envelope");
                            let response = JsonRpcResponse::error(
                                id,
                                McpError::invalid_request(detail).to_wire(),
                            );
                            if let Err(err) = role
                                .core()
                                .send_message(JsonRpcMessage::Response(response))
                                .await
                            {
                                warn!(error = %err, "failed to send invalid-request response");
                            }
                        }
                        None => {
                            warn!(%detail, "dropping unparseable line");
                        }
                    }
                }
                TransportEvent::Closed => {
                    debug!("transport closed, shutting endpoint down");
                    break;
                }
            }
        }
        role.core().shutdown().await;
    })
}
