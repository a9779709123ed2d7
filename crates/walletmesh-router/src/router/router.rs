//! Wallet Router
//!
//! The broker at the center of the mesh. One dApp-facing node runs the
//! meta-protocol behind a session, permission, and approval middleware
//! chain; allowed inner calls are forwarded to the wallet registered for
//! their chain, and wallet-side notifications are mirrored back upstream
//! as `wm_walletStateChanged`.

// Layer 1: Standard library imports
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::config::RouterConfig;
use super::middleware::{map_session_error, PermissionMiddleware, SessionMiddleware};
use super::wallets::WalletHandle;
use crate::approval::{ApprovalMiddleware, ApprovalQueue, ApprovalQueueConfig};
use crate::error::{WmError, WmResult};
use crate::node::{JsonRpcNode, NodeConfig, RequestContext, RpcHandler};
use crate::permissions::PermissionManager;
use crate::protocol::constants::{methods, notifications};
use crate::protocol::{
    granted_permissions, BulkCallParams, CallParams, ChainId, ChainPermissions, ConnectParams,
    ConnectResult, DisconnectParams, GetPermissionsParams, GetSupportedMethodsParams,
    HumanReadablePermissions, MethodCall, PermissionDescriptor, ReconnectParams, ReconnectResult,
    SupportedMethods, Transport, UpdatePermissionsParams, WalletStateChanged,
};
use crate::session::{InMemorySessionStore, SessionStore};

/// Multi-chain JSON-RPC router
///
/// Owns the session store, the permission manager, the approval queue, and
/// one transport handle per wallet. Wallets can be added and removed while
/// requests are in flight; in-flight calls for a removed chain terminate
/// with `walletNotAvailable`.
pub struct WalletRouter {
    node: Arc<JsonRpcNode>,
    wallets: Arc<DashMap<ChainId, WalletHandle>>,
    sessions: Arc<dyn SessionStore>,
    permissions: Arc<dyn PermissionManager>,
    approvals: ApprovalQueue,
    session_tokens: Arc<DashMap<String, CancellationToken>>,
    forward: mpsc::UnboundedSender<WalletStateChanged>,
    config: RouterConfig,
}

impl WalletRouter {
    /// Build a router over a dApp-facing transport
    ///
    /// `wallets` seeds the registry; more can be added later with
    /// [`WalletRouter::add_wallet`]. When `session_store` is `None` an
    /// in-memory store is created from the config.
    ///
    /// # Errors
    ///
    /// Fails only on duplicate chain ids in `wallets`.
    pub fn new(
        transport: Arc<dyn Transport>,
        wallets: Vec<(ChainId, Arc<dyn Transport>)>,
        permissions: Arc<dyn PermissionManager>,
        session_store: Option<Arc<dyn SessionStore>>,
        config: RouterConfig,
    ) -> WmResult<Arc<Self>> {
        let node = JsonRpcNode::bind(
            transport,
            NodeConfig {
                default_timeout: config.request_timeout,
            },
        );
        let sessions = session_store
            .unwrap_or_else(|| Arc::new(InMemorySessionStore::new(config.session.clone())));
        let approvals = ApprovalQueue::new(ApprovalQueueConfig {
            default_timeout: config.approval_timeout,
        });
        let (forward, forward_rx) = mpsc::unbounded_channel();

        let router = Arc::new(Self {
            node: Arc::clone(&node),
            wallets: Arc::new(DashMap::new()),
            sessions: Arc::clone(&sessions),
            permissions: Arc::clone(&permissions),
            approvals: approvals.clone(),
            session_tokens: Arc::new(DashMap::new()),
            forward,
            config: config.clone(),
        });

        node.add_middleware(Arc::new(SessionMiddleware::new(sessions)));
        node.add_middleware(Arc::new(PermissionMiddleware::new(permissions)));
        node.add_middleware(Arc::new(ApprovalMiddleware::new(
            approvals,
            config.dangerous_methods.clone(),
            Some(config.approval_timeout),
        )));
        router.register_methods()?;

        tokio::spawn(forward_notifications(forward_rx, Arc::clone(&node)));

        for (chain_id, wallet_transport) in wallets {
            router.add_wallet(chain_id, wallet_transport)?;
        }
        Ok(router)
    }

    /// The queue UIs resolve approvals through
    pub fn approval_queue(&self) -> &ApprovalQueue {
        &self.approvals
    }

    /// The session store this router owns
    pub fn session_store(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Chains currently served by a wallet
    pub fn chains(&self) -> Vec<ChainId> {
        self.wallets.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Register a wallet for a chain
    ///
    /// # Errors
    ///
    /// Registering a chain twice is a configuration error; remove the old
    /// wallet first.
    pub fn add_wallet(&self, chain_id: ChainId, transport: Arc<dyn Transport>) -> WmResult<()> {
        if self.wallets.contains_key(&chain_id) {
            return Err(WmError::invalid_request(format!(
                "wallet already registered for chain {chain_id}"
            )));
        }
        let handle = WalletHandle::bind(
            chain_id.clone(),
            transport,
            NodeConfig {
                default_timeout: self.config.request_timeout,
            },
            self.forward.clone(),
        );
        debug!(chain = %chain_id, "wallet added");
        self.wallets.insert(chain_id, handle);
        Ok(())
    }

    /// Remove a chain's wallet
    ///
    /// In-flight calls for the chain terminate with `walletNotAvailable`;
    /// so do all future calls until a wallet is registered again.
    ///
    /// # Errors
    ///
    /// [`WmError::UnknownChain`] when no wallet serves the chain.
    pub async fn remove_wallet(&self, chain_id: &ChainId) -> WmResult<()> {
        let Some((_, handle)) = self.wallets.remove(chain_id) else {
            return Err(WmError::UnknownChain {
                chain_id: chain_id.to_string(),
            });
        };
        debug!(chain = %chain_id, "wallet removed");
        handle
            .teardown(&WmError::WalletNotAvailable {
                chain_id: chain_id.to_string(),
            })
            .await;
        Ok(())
    }

    /// Reject pending approvals, drop every wallet, and close the node
    pub async fn shutdown(&self) {
        self.approvals.cleanup_all();
        let chains = self.chains();
        for chain_id in chains {
            let _ = self.remove_wallet(&chain_id).await;
        }
        if let Err(error) = self.node.close().await {
            debug!(%error, "dApp transport already closed");
        }
    }

    fn register_methods(self: &Arc<Self>) -> WmResult<()> {
        self.node.register_method(
            methods::CONNECT,
            self.handler(|router, ctx, params| {
                async move { router.handle_connect(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::RECONNECT,
            self.handler(|router, ctx, params| {
                async move { router.handle_reconnect(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::DISCONNECT,
            self.handler(|router, ctx, params| {
                async move { router.handle_disconnect(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::CALL,
            self.handler(|router, ctx, params| {
                async move { router.handle_call(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::BULK_CALL,
            self.handler(|router, ctx, params| {
                async move { router.handle_bulk_call(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::GET_PERMISSIONS,
            self.handler(|router, ctx, params| {
                async move { router.handle_get_permissions(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::UPDATE_PERMISSIONS,
            self.handler(|router, ctx, params| {
                async move { router.handle_update_permissions(ctx, params).await }.boxed()
            }),
        )?;
        self.node.register_method(
            methods::GET_SUPPORTED_METHODS,
            self.handler(|router, ctx, params| {
                async move { router.handle_get_supported_methods(ctx, params).await }.boxed()
            }),
        )?;
        Ok(())
    }

    /// Wrap a handler body with the weak upgrade dance
    ///
    /// Handlers hold only a weak reference; the node's method map never
    /// keeps the router alive.
    fn handler<F>(self: &Arc<Self>, body: F) -> impl RpcHandler
    where
        F: Fn(
                Arc<WalletRouter>,
                RequestContext,
                Option<Value>,
            ) -> BoxFuture<'static, WmResult<Value>>
            + Send
            + Sync
            + Clone
            + 'static,
    {
        let weak: Weak<WalletRouter> = Arc::downgrade(self);
        move |context: RequestContext, params: Option<Value>| {
            let weak = weak.clone();
            let body = body.clone();
            async move {
                let router = weak
                    .upgrade()
                    .ok_or_else(|| WmError::internal("router no longer running"))?;
                body(router, context, params).await
            }
            .boxed()
        }
    }

    async fn handle_connect(
        &self,
        context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: ConnectParams = parse_params(params)?;
        if params.session_id.is_some() {
            return Err(WmError::invalid_request(
                "wm_connect must not carry a sessionId",
            ));
        }

        let granted_view = self.permissions.approve(&context, &params.permissions).await?;
        let granted = granted_permissions(&granted_view);
        if granted.is_empty() {
            return Err(WmError::insufficient_permissions("denied"));
        }

        let session = self
            .sessions
            .create(&context.origin, granted)
            .await
            .map_err(map_session_error)?;
        self.session_tokens
            .insert(session.id.clone(), CancellationToken::new());

        self.emit(
            notifications::CONNECTED,
            json!({ "sessionId": session.id.clone() }),
        )
        .await;
        to_wire(ConnectResult {
            session_id: session.id,
            permissions: granted_view,
        })
    }

    async fn handle_reconnect(
        &self,
        context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: ReconnectParams = parse_params(params)?;
        // Reconnect re-binds an existing session; the grant prompt does not
        // run again.
        let session = self
            .sessions
            .validate_and_refresh(&params.session_id, &context.origin)
            .await
            .map_err(map_session_error)?;
        self.session_tokens
            .entry(session.id.clone())
            .or_insert_with(CancellationToken::new);

        to_wire(ReconnectResult {
            permissions: project_granted(&session.permissions),
        })
    }

    async fn handle_disconnect(
        &self,
        _context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: DisconnectParams = parse_params(params)?;
        self.sessions
            .delete(&params.session_id)
            .await
            .map_err(map_session_error)?;
        if let Some((_, token)) = self.session_tokens.remove(&params.session_id) {
            token.cancel();
        }
        self.permissions.revoke_session(&params.session_id).await;

        self.emit(
            notifications::DISCONNECTED,
            json!({ "sessionId": params.session_id }),
        )
        .await;
        Ok(json!("ok"))
    }

    async fn handle_call(&self, _context: RequestContext, params: Option<Value>) -> WmResult<Value> {
        let params: CallParams = parse_params(params)?;
        self.forward_call(&params.chain_id, &params.session_id, &params.call)
            .await
    }

    async fn handle_bulk_call(
        &self,
        _context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: BulkCallParams = parse_params(params)?;
        let mut results = Vec::with_capacity(params.calls.len());
        for call in &params.calls {
            // Strictly in order; the first failure aborts the batch and no
            // partial results leak to the caller.
            let result = self
                .forward_call(&params.chain_id, &params.session_id, call)
                .await?;
            results.push(result);
        }
        Ok(Value::Array(results))
    }

    async fn handle_get_permissions(
        &self,
        _context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: GetPermissionsParams = parse_params_or_default(params)?;
        let view = self.permissions.get_permissions(params.chain_ids.as_deref()).await;
        to_wire(view)
    }

    async fn handle_update_permissions(
        &self,
        context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: UpdatePermissionsParams = parse_params(params)?;
        let granted_view = self.permissions.approve(&context, &params.permissions).await?;
        let granted = granted_permissions(&granted_view);
        self.sessions
            .update_permissions(&params.session_id, &context.origin, granted)
            .await
            .map_err(map_session_error)?;

        self.emit(
            notifications::PERMISSIONS_CHANGED,
            json!({ "sessionId": params.session_id, "permissions": granted_view.clone() }),
        )
        .await;
        to_wire(granted_view)
    }

    async fn handle_get_supported_methods(
        &self,
        _context: RequestContext,
        params: Option<Value>,
    ) -> WmResult<Value> {
        let params: GetSupportedMethodsParams = parse_params_or_default(params)?;
        let targets = match params.chain_ids {
            Some(chain_ids) => chain_ids,
            None => self.chains(),
        };

        let mut supported = SupportedMethods::new();
        for chain_id in targets {
            let wallet_node = {
                let Some(handle) = self.wallets.get(&chain_id) else {
                    return Err(WmError::UnknownChain {
                        chain_id: chain_id.to_string(),
                    });
                };
                Arc::clone(&handle.node)
            };
            let raw = wallet_node
                .request(methods::GET_SUPPORTED_METHODS, None, None)
                .await
                .map_err(|error| map_wallet_error(error, &chain_id, methods::GET_SUPPORTED_METHODS))?;
            let methods: Vec<String> = serde_json::from_value(raw)
                .map_err(|error| WmError::internal(format!("malformed method list: {error}")))?;
            supported.insert(chain_id, methods);
        }
        to_wire(supported)
    }

    /// Forward one inner call, racing removal and session teardown
    async fn forward_call(
        &self,
        chain_id: &ChainId,
        session_id: &str,
        call: &MethodCall,
    ) -> WmResult<Value> {
        let (wallet_node, removal) = {
            let Some(handle) = self.wallets.get(chain_id) else {
                return Err(WmError::UnknownChain {
                    chain_id: chain_id.to_string(),
                });
            };
            (Arc::clone(&handle.node), handle.removal.clone())
        };
        let session_token = self
            .session_tokens
            .entry(session_id.to_string())
            .or_insert_with(CancellationToken::new)
            .clone();

        tokio::select! {
            result = wallet_node.request(&call.method, call.params.clone(), Some(self.config.request_timeout)) => {
                result.map_err(|error| map_wallet_error(error, chain_id, &call.method))
            }
            _ = session_token.cancelled() => {
                Err(WmError::invalid_session("session deleted during call"))
            }
            _ = removal.cancelled() => {
                Err(WmError::WalletNotAvailable {
                    chain_id: chain_id.to_string(),
                })
            }
        }
    }

    async fn emit(&self, notification: &str, payload: Value) {
        if let Err(error) = self.node.notify(notification, Some(payload)).await {
            warn!(notification, %error, "failed to emit notification");
        }
    }
}

/// Pump mirroring wallet events upstream, preserving arrival order
async fn forward_notifications(
    mut updates: mpsc::UnboundedReceiver<WalletStateChanged>,
    node: Arc<JsonRpcNode>,
) {
    while let Some(update) = updates.recv().await {
        match serde_json::to_value(&update) {
            Ok(payload) => {
                if let Err(error) = node
                    .notify(notifications::WALLET_STATE_CHANGED, Some(payload))
                    .await
                {
                    debug!(%error, "dropping wallet state change, dApp side gone");
                }
            }
            Err(error) => warn!(%error, "unserializable wallet state change"),
        }
    }
}

/// Project a granted set as all-allowed wire permissions
fn project_granted(granted: &ChainPermissions) -> HumanReadablePermissions {
    let mut view = HumanReadablePermissions::new();
    for (chain_id, methods) in granted {
        let entries: BTreeMap<String, PermissionDescriptor> = methods
            .iter()
            .map(|method| (method.clone(), PermissionDescriptor::new(true, "allow")))
            .collect();
        view.insert(chain_id.clone(), entries);
    }
    view
}

/// Map wallet-side failures to the router's taxonomy
///
/// A wallet that does not know the method surfaces as
/// `methodNotSupported`; transport faults as `walletNotAvailable`; all
/// other wallet errors forward verbatim.
fn map_wallet_error(error: WmError, chain_id: &ChainId, method: &str) -> WmError {
    match error {
        WmError::MethodNotFound { .. } => WmError::MethodNotSupported {
            method: method.to_string(),
        },
        WmError::Transport { .. } => WmError::WalletNotAvailable {
            chain_id: chain_id.to_string(),
        },
        other => other,
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> WmResult<T> {
    let value = params.ok_or_else(|| WmError::invalid_request("missing params"))?;
    serde_json::from_value(value).map_err(|error| WmError::invalid_request(error.to_string()))
}

fn parse_params_or_default<T: DeserializeOwned>(params: Option<Value>) -> WmResult<T> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|error| WmError::invalid_request(error.to_string()))
}

fn to_wire<T: serde::Serialize>(value: T) -> WmResult<Value> {
    serde_json::to_value(value).map_err(|error| WmError::internal(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_method_not_found_becomes_method_not_supported() {
        let error = map_wallet_error(
            WmError::MethodNotFound {
                method: "x".to_string(),
            },
            &ChainId::new("eip155:1"),
            "eth_fancy",
        );
        assert!(matches!(error, WmError::MethodNotSupported { method } if method == "eth_fancy"));
    }

    #[test]
    fn wallet_transport_faults_become_wallet_not_available() {
        let error = map_wallet_error(
            WmError::transport("pipe broke"),
            &ChainId::new("eip155:137"),
            "eth_accounts",
        );
        assert!(matches!(error, WmError::WalletNotAvailable { .. }));
    }

    #[test]
    fn wallet_domain_errors_forward_verbatim() {
        let original = WmError::Wallet {
            code: 4001,
            message: "user rejected".to_string(),
            data: None,
        };
        let mapped = map_wallet_error(original.clone(), &ChainId::new("eip155:1"), "eth_sign");
        assert_eq!(mapped, original);
    }

    #[test]
    fn project_granted_marks_everything_allowed() {
        let mut granted = ChainPermissions::new();
        granted.insert(
            ChainId::new("eip155:1"),
            std::collections::BTreeSet::from(["eth_accounts".to_string()]),
        );
        let view = project_granted(&granted);
        assert!(view[&ChainId::new("eip155:1")]["eth_accounts"].allowed);
    }
}
