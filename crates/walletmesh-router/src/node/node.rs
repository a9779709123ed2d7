//! Symmetric JSON-RPC Node
//!
//! One node per transport endpoint, used identically on the provider side,
//! the router's dApp side, and each router-to-wallet link. The node owns
//! request/response correlation, method dispatch through the middleware
//! chain, and notification delivery.
//!
//! # Concurrency
//!
//! Inbound frames arrive on the transport's single pump task. Requests are
//! dispatched on their own tasks so a handler awaiting a wallet or a user
//! approval never blocks the pump; responses and notifications are handled
//! inline, which keeps notification delivery in arrival order.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use crate::error::{WmError, WmResult};
use crate::node::middleware::{Middleware, Next, RequestContext, RpcHandler};
use crate::node::pending::{PendingCall, PendingGuard, RequestIdGenerator};
use crate::protocol::constants::defaults;
use crate::protocol::transport::{MessageContext, MessageHandler, Transport, TransportError};
use crate::protocol::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, RequestId};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Deadline applied to outbound requests that do not carry their own
    pub default_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(defaults::REQUEST_TIMEOUT_MS),
        }
    }
}

type NotificationCallback = Arc<dyn Fn(Option<Value>) + Send + Sync>;
type AnyNotificationCallback = Arc<dyn Fn(&str, Option<Value>) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&WmError) + Send + Sync>;

/// Subscription bookkeeping: per-method listeners plus a catch-all list
struct Subscriptions {
    next_token: AtomicU64,
    by_method: DashMap<String, Vec<(u64, NotificationCallback)>>,
    catch_all: RwLock<Vec<(u64, AnyNotificationCallback)>>,
    /// token -> subscribed method; `None` marks a catch-all subscription
    token_index: DashMap<u64, Option<String>>,
}

impl Subscriptions {
    fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            by_method: DashMap::new(),
            catch_all: RwLock::new(Vec::new()),
            token_index: DashMap::new(),
        }
    }
}

/// Symmetric JSON-RPC endpoint over a single transport
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use futures::FutureExt;
/// use serde_json::json;
/// use walletmesh_router::node::{JsonRpcNode, NodeConfig, RequestContext};
/// use walletmesh_router::transport::InProcessTransport;
///
/// # async fn example() -> Result<(), walletmesh_router::error::WmError> {
/// let (left, right) = InProcessTransport::pair("a", "b");
/// let server = JsonRpcNode::bind(right, NodeConfig::default());
/// server.register_method(
///     "ping",
///     |_ctx: RequestContext, _params: Option<serde_json::Value>| {
///         async { Ok(json!("pong")) }.boxed()
///     },
/// )?;
///
/// let client = JsonRpcNode::bind(left, NodeConfig::default());
/// let pong = client.request("ping", None, None).await?;
/// assert_eq!(pong, json!("pong"));
/// # Ok(())
/// # }
/// ```
pub struct JsonRpcNode {
    transport: Arc<dyn Transport>,
    methods: DashMap<String, Arc<dyn RpcHandler>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    pending: Arc<DashMap<RequestId, PendingCall>>,
    id_generator: RequestIdGenerator,
    subscriptions: Subscriptions,
    error_listeners: RwLock<Vec<ErrorCallback>>,
    config: NodeConfig,
}

impl JsonRpcNode {
    /// Bind a node to a transport and start receiving
    pub fn bind(transport: Arc<dyn Transport>, config: NodeConfig) -> Arc<Self> {
        let node = Arc::new(Self {
            transport: Arc::clone(&transport),
            methods: DashMap::new(),
            middleware: RwLock::new(Vec::new()),
            pending: Arc::new(DashMap::new()),
            id_generator: RequestIdGenerator::new(),
            subscriptions: Subscriptions::new(),
            error_listeners: RwLock::new(Vec::new()),
            config,
        });
        transport.set_message_handler(Arc::new(NodeMessageHandler {
            node: Arc::downgrade(&node),
        }));
        node
    }

    /// Register a method handler
    ///
    /// # Errors
    ///
    /// Duplicate registration is a configuration error.
    pub fn register_method<H>(&self, name: &str, handler: H) -> WmResult<()>
    where
        H: RpcHandler + 'static,
    {
        if self.methods.contains_key(name) {
            return Err(WmError::internal(format!(
                "handler for method '{name}' already registered"
            )));
        }
        self.methods.insert(name.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Append a middleware; middlewares run in registration order
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        if let Ok(mut chain) = self.middleware.write() {
            chain.push(middleware);
        }
    }

    /// Send a request and await the correlated response
    ///
    /// # Errors
    ///
    /// [`WmError::Timeout`] when the deadline passes first; transport and
    /// wire errors otherwise. The pending slot is freed on every path,
    /// including the caller dropping this future early.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> WmResult<Value> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let id = self.id_generator.next_id();
        let (sender, receiver) = oneshot::channel();

        self.pending.insert(id.clone(), PendingCall::new(sender, method));
        let mut guard = PendingGuard::new(Arc::clone(&self.pending), id.clone());

        let frame = JsonRpcMessage::request(method, params, id.clone());
        self.transport.send(frame).await?;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(outcome)) => {
                guard.disarm();
                outcome
            }
            Ok(Err(_closed)) => {
                guard.disarm();
                Err(WmError::internal("response channel closed"))
            }
            Err(_elapsed) => {
                debug!(%id, method, "outbound request timed out");
                Err(WmError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Send a fire-and-forget notification
    ///
    /// # Errors
    ///
    /// Only transport failures; there is no response to wait for.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> WmResult<()> {
        self.transport
            .send(JsonRpcMessage::notification(method, params))
            .await
            .map_err(WmError::from)
    }

    /// Subscribe to a named notification; returns an unsubscribe token
    pub fn on<F>(&self, method: &str, callback: F) -> u64
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        let token = self.subscriptions.next_token.fetch_add(1, Ordering::SeqCst);
        self.subscriptions
            .by_method
            .entry(method.to_string())
            .or_default()
            .push((token, Arc::new(callback)));
        self.subscriptions
            .token_index
            .insert(token, Some(method.to_string()));
        token
    }

    /// Subscribe to every notification; returns an unsubscribe token
    pub fn on_any<F>(&self, callback: F) -> u64
    where
        F: Fn(&str, Option<Value>) + Send + Sync + 'static,
    {
        let token = self.subscriptions.next_token.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut list) = self.subscriptions.catch_all.write() {
            list.push((token, Arc::new(callback)));
        }
        self.subscriptions.token_index.insert(token, None);
        token
    }

    /// Remove a subscription; returns whether the token was known
    ///
    /// A listener removed before an emission is not called for it; removal
    /// after an emission does not retract the delivery.
    pub fn unsubscribe(&self, token: u64) -> bool {
        match self.subscriptions.token_index.remove(&token) {
            Some((_, Some(method))) => {
                if let Some(mut entry) = self.subscriptions.by_method.get_mut(&method) {
                    entry.retain(|(t, _)| *t != token);
                }
                true
            }
            Some((_, None)) => {
                if let Ok(mut list) = self.subscriptions.catch_all.write() {
                    list.retain(|(t, _)| *t != token);
                }
                true
            }
            None => false,
        }
    }

    /// Register a listener for transport-level faults
    ///
    /// These are errors with no request to reject: framing failures, broken
    /// pipes, unattributable I/O faults. Per-request failures still arrive
    /// as rejected results on their callers.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&WmError) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.error_listeners.write() {
            listeners.push(Arc::new(callback));
        }
    }

    fn emit_error(&self, error: &WmError) {
        let listeners: Vec<ErrorCallback> = match self.error_listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => Vec::new(),
        };
        for listener in listeners {
            listener(error);
        }
    }

    /// Complete one pending request with an error; returns whether it existed
    pub fn cancel(&self, id: &RequestId, error: WmError) -> bool {
        match self.pending.remove(id) {
            Some((_, call)) => {
                let _ = call.sender.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Complete every pending request with copies of the same error
    pub fn cancel_all(&self, error: &WmError) {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.cancel(&id, error.clone());
        }
    }

    /// Number of requests currently awaiting responses
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Close the underlying transport and fail the pending table
    pub async fn close(&self) -> WmResult<()> {
        self.transport.close().await?;
        self.cancel_all(&WmError::transport("node closed"));
        Ok(())
    }

    /// Feed one inbound frame into the node
    pub async fn receive(self: &Arc<Self>, message: JsonRpcMessage, context: MessageContext) {
        match message {
            JsonRpcMessage::Request(request) => {
                let node = Arc::clone(self);
                let ctx = RequestContext::new(context.origin(), Some(request.id.clone()));
                tokio::spawn(async move {
                    node.dispatch_request(request, ctx).await;
                });
            }
            JsonRpcMessage::Response(response) => self.correlate(response),
            JsonRpcMessage::Notification(notification) => {
                self.deliver_notification(&notification.method, notification.params);
            }
        }
    }

    async fn dispatch_request(&self, request: JsonRpcRequest, context: RequestContext) {
        let id = request.id.clone();
        let response = match self.run_chain(&context, &request).await {
            Ok(value) => JsonRpcResponse::success(value, id),
            Err(error) => {
                debug!(method = %request.method, %error, "request failed");
                JsonRpcResponse::error(error.to_error_object(), Some(id))
            }
        };
        if let Err(error) = self.transport.send(JsonRpcMessage::Response(response)).await {
            warn!(%error, "failed to send response");
        }
    }

    async fn run_chain(
        &self,
        context: &RequestContext,
        request: &JsonRpcRequest,
    ) -> WmResult<Value> {
        let handler = self
            .methods
            .get(&request.method)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| WmError::MethodNotFound {
                method: request.method.clone(),
            })?;
        let chain: Vec<Arc<dyn Middleware>> = match self.middleware.read() {
            Ok(guard) => guard.clone(),
            Err(_) => return Err(WmError::internal("middleware lock poisoned")),
        };
        let next = Next {
            chain: &chain,
            endpoint: handler.as_ref(),
        };
        next.run(context, request).await
    }

    fn correlate(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.clone() else {
            debug!("response without id discarded");
            return;
        };
        match self.pending.remove(&id) {
            Some((_, call)) => {
                let outcome = match (response.result, response.error) {
                    (_, Some(error)) => Err(WmError::from_error_object(&error)),
                    (Some(value), None) => Ok(value),
                    (None, None) => Ok(Value::Null),
                };
                if call.sender.send(outcome).is_err() {
                    debug!(%id, method = %call.method, "caller no longer awaiting");
                }
            }
            None => debug!(%id, "late or unknown response discarded"),
        }
    }

    fn deliver_notification(&self, method: &str, params: Option<Value>) {
        // Snapshot listeners so callbacks never run under a map guard.
        let named: Vec<NotificationCallback> = self
            .subscriptions
            .by_method
            .get(method)
            .map(|entry| entry.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        let any: Vec<AnyNotificationCallback> = match self.subscriptions.catch_all.read() {
            Ok(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => Vec::new(),
        };

        if named.is_empty() && any.is_empty() {
            trace!(method, "notification with no subscribers");
            return;
        }
        for callback in named {
            callback(params.clone());
        }
        for callback in any {
            callback(method, params.clone());
        }
    }
}

/// Bridges the transport's handler callbacks into the node
///
/// Holds a weak reference; the transport never keeps its node alive.
struct NodeMessageHandler {
    node: Weak<JsonRpcNode>,
}

#[async_trait]
impl MessageHandler for NodeMessageHandler {
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext) {
        if let Some(node) = self.node.upgrade() {
            node.receive(message, context).await;
        }
    }

    async fn handle_error(&self, error: TransportError) {
        debug!(%error, "transport-level error");
        if let Some(node) = self.node.upgrade() {
            node.emit_error(&WmError::from(error));
        }
    }

    async fn handle_close(&self) {
        if let Some(node) = self.node.upgrade() {
            node.cancel_all(&WmError::transport("transport closed"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InProcessTransport;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn linked_nodes() -> (Arc<JsonRpcNode>, Arc<JsonRpcNode>) {
        let (left, right) = InProcessTransport::pair("left", "right");
        (
            JsonRpcNode::bind(left, NodeConfig::default()),
            JsonRpcNode::bind(right, NodeConfig::default()),
        )
    }

    #[tokio::test]
    async fn request_response_round_trip() {
        let (client, server) = linked_nodes();
        server
            .register_method("echo", |_ctx: RequestContext, params: Option<Value>| {
                async move { Ok(params.unwrap_or(Value::Null)) }.boxed()
            })
            .unwrap();

        let result = client
            .request("echo", Some(json!({"x": 1})), None)
            .await
            .unwrap();
        assert_eq!(result, json!({"x": 1}));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (client, _server) = linked_nodes();
        let error = client.request("nope", None, None).await.unwrap_err();
        assert!(matches!(error, WmError::MethodNotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let (_client, server) = linked_nodes();
        let handler = |_ctx: RequestContext, _params: Option<Value>| async { Ok(Value::Null) }.boxed();
        server.register_method("m", handler).unwrap();
        assert!(server.register_method("m", handler).is_err());
    }

    #[tokio::test]
    async fn timeout_frees_the_pending_slot() {
        let (client, server) = linked_nodes();
        server
            .register_method("slow", |_ctx: RequestContext, _params: Option<Value>| {
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Value::Null)
                }
                .boxed()
            })
            .unwrap();

        let error = client
            .request("slow", None, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(error, WmError::Timeout { .. }));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn overlapping_requests_correlate_independently() {
        let (client, server) = linked_nodes();
        server
            .register_method("first", |_ctx: RequestContext, _params: Option<Value>| {
                async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(json!("first"))
                }
                .boxed()
            })
            .unwrap();
        server
            .register_method("second", |_ctx: RequestContext, _params: Option<Value>| {
                async { Ok(json!("second")) }.boxed()
            })
            .unwrap();

        let slow = client.request("first", None, None);
        let fast = client.request("second", None, None);
        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow.unwrap(), json!("first"));
        assert_eq!(fast.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn notifications_reach_subscribers_in_order() {
        let (client, server) = linked_nodes();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        server.on("tick", move |params| {
            if let Ok(mut list) = sink.lock() {
                list.push(params);
            }
        });

        for n in 0..3 {
            client.notify("tick", Some(json!(n))).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        let list = seen.lock().unwrap();
        assert_eq!(*list, vec![Some(json!(0)), Some(json!(1)), Some(json!(2))]);
    }

    #[tokio::test]
    async fn unsubscribe_before_emission_prevents_delivery() {
        let (client, server) = linked_nodes();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&hits);
        let token = server.on("evt", move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        client.notify("evt", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(server.unsubscribe(token));
        client.notify("evt", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn catch_all_sees_every_notification() {
        let (client, server) = linked_nodes();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        server.on_any(move |method, _params| {
            if let Ok(mut list) = sink.lock() {
                list.push(method.to_string());
            }
        });

        client.notify("a", None).await.unwrap();
        client.notify("b", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn cancel_all_completes_pending_requests() {
        let (client, server) = linked_nodes();
        server
            .register_method("hang", |_ctx: RequestContext, _params: Option<Value>| {
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Value::Null)
                }
                .boxed()
            })
            .unwrap();

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.request("hang", None, None).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        client.cancel_all(&WmError::WalletNotAvailable {
            chain_id: "eip155:137".to_string(),
        });

        let outcome = pending.await.unwrap();
        assert!(matches!(outcome, Err(WmError::WalletNotAvailable { .. })));
        assert_eq!(client.pending_count(), 0);
    }
}
