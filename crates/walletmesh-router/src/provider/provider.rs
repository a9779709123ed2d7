//! Provider Facade
//!
//! The dApp-side client: a typed wrapper over a JSON-RPC node that speaks
//! the meta-protocol, caches the session id, runs the per-method
//! serializer registry, and surfaces router notifications as events.

// Layer 1: Standard library imports
use std::sync::{Arc, RwLock};
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::de::DeserializeOwned;
use serde_json::Value;

// Layer 3: Internal module imports
use super::builder::ChainCallBuilder;
use super::serializer::SerializerRegistry;
use crate::error::{WmError, WmResult};
use crate::node::{JsonRpcNode, NodeConfig};
use crate::protocol::constants::{defaults, methods};
use crate::protocol::{
    BulkCallParams, CallParams, ChainId, ChainPermissions, ConnectParams, ConnectResult,
    GetPermissionsParams, GetSupportedMethodsParams, HumanReadablePermissions, MethodCall,
    ReconnectParams, ReconnectResult, SupportedMethods, Transport, UpdatePermissionsParams,
};

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Deadline for meta-protocol requests without their own timeout
    pub default_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(defaults::REQUEST_TIMEOUT_MS),
        }
    }
}

/// dApp-side client for a WalletMesh router
///
/// After [`WalletProvider::connect`] succeeds the session id is cached and
/// attached to every subsequent call automatically.
pub struct WalletProvider {
    node: Arc<JsonRpcNode>,
    session_id: RwLock<Option<String>>,
    serializers: SerializerRegistry,
    config: ProviderConfig,
}

impl WalletProvider {
    /// Build a provider over a router-facing transport
    pub fn new(transport: Arc<dyn Transport>, config: ProviderConfig) -> Self {
        let node = JsonRpcNode::bind(
            transport,
            NodeConfig {
                default_timeout: config.default_timeout,
            },
        );
        Self {
            node,
            session_id: RwLock::new(None),
            serializers: SerializerRegistry::new(),
            config,
        }
    }

    /// The per-method serializer registry
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// The cached session id, if connected
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().ok().and_then(|guard| guard.clone())
    }

    /// Establish a session with the requested permissions
    ///
    /// # Errors
    ///
    /// `insufficientPermissions` when the user grants nothing; transport
    /// and timeout errors otherwise.
    pub async fn connect(
        &self,
        permissions: ChainPermissions,
        timeout: Option<Duration>,
    ) -> WmResult<ConnectResult> {
        let params = ConnectParams {
            permissions,
            session_id: None,
        };
        let result: ConnectResult = self
            .request_typed(methods::CONNECT, to_wire(params)?, timeout)
            .await?;
        self.store_session(Some(result.session_id.clone()));
        Ok(result)
    }

    /// Re-bind a session from a previous run
    ///
    /// # Errors
    ///
    /// `invalidSession` when the id is unknown, expired, or owned by a
    /// different origin.
    pub async fn reconnect(
        &self,
        session_id: impl Into<String>,
        timeout: Option<Duration>,
    ) -> WmResult<ReconnectResult> {
        let session_id = session_id.into();
        let params = ReconnectParams {
            session_id: session_id.clone(),
        };
        let result: ReconnectResult = self
            .request_typed(methods::RECONNECT, to_wire(params)?, timeout)
            .await?;
        self.store_session(Some(session_id));
        Ok(result)
    }

    /// Forward a single wallet call
    ///
    /// Registered serializers run on the params before sending and on the
    /// result before returning.
    ///
    /// # Errors
    ///
    /// Router taxonomy errors, or wallet errors forwarded verbatim.
    pub async fn call(
        &self,
        chain_id: &ChainId,
        call: MethodCall,
        timeout: Option<Duration>,
    ) -> WmResult<Value> {
        let session_id = self.require_session()?;
        let method = call.method;
        let params = self.serializers.serialize_params(&method, call.params)?;
        let wire = CallParams {
            chain_id: chain_id.clone(),
            session_id,
            call: MethodCall {
                method: method.clone(),
                params,
            },
        };
        let raw = self
            .node
            .request(methods::CALL, Some(to_wire(wire)?), timeout)
            .await?;
        self.serializers.deserialize_result(&method, raw)
    }

    /// Forward an ordered batch as one `wm_bulkCall`
    ///
    /// # Errors
    ///
    /// The first inner failure aborts the batch; no partial results are
    /// returned.
    pub async fn bulk_call(
        &self,
        chain_id: &ChainId,
        calls: Vec<MethodCall>,
        timeout: Option<Duration>,
    ) -> WmResult<Vec<Value>> {
        let session_id = self.require_session()?;
        let methods_in_order: Vec<String> =
            calls.iter().map(|call| call.method.clone()).collect();
        let mut wire_calls = Vec::with_capacity(calls.len());
        for call in calls {
            let params = self.serializers.serialize_params(&call.method, call.params)?;
            wire_calls.push(MethodCall {
                method: call.method,
                params,
            });
        }
        let wire = BulkCallParams {
            chain_id: chain_id.clone(),
            session_id,
            calls: wire_calls,
        };
        let raw = self
            .node
            .request(methods::BULK_CALL, Some(to_wire(wire)?), timeout)
            .await?;
        let results: Vec<Value> = serde_json::from_value(raw)
            .map_err(|error| WmError::internal(format!("malformed bulk result: {error}")))?;

        results
            .into_iter()
            .zip(methods_in_order)
            .map(|(result, method)| self.serializers.deserialize_result(&method, result))
            .collect()
    }

    /// Start a fluent operation against one chain
    pub fn chain(&self, chain_id: impl Into<ChainId>) -> ChainCallBuilder<'_> {
        ChainCallBuilder::new(self, chain_id.into())
    }

    /// Current permission projection from the router
    ///
    /// # Errors
    ///
    /// `invalidSession` when not connected.
    pub async fn get_permissions(
        &self,
        chain_ids: Option<Vec<ChainId>>,
        timeout: Option<Duration>,
    ) -> WmResult<HumanReadablePermissions> {
        let params = GetPermissionsParams {
            chain_ids,
            session_id: Some(self.require_session()?),
        };
        self.request_typed(methods::GET_PERMISSIONS, to_wire(params)?, timeout)
            .await
    }

    /// Request a permission update; re-runs the user grant flow
    ///
    /// # Errors
    ///
    /// `invalidSession` when not connected; `insufficientPermissions` when
    /// the user denies the update.
    pub async fn update_permissions(
        &self,
        permissions: ChainPermissions,
        timeout: Option<Duration>,
    ) -> WmResult<HumanReadablePermissions> {
        let params = UpdatePermissionsParams {
            permissions,
            session_id: self.require_session()?,
        };
        self.request_typed(methods::UPDATE_PERMISSIONS, to_wire(params)?, timeout)
            .await
    }

    /// Per-chain method discovery; works before connecting
    ///
    /// # Errors
    ///
    /// `unknownChain` for chains without a wallet.
    pub async fn get_supported_methods(
        &self,
        chain_ids: Option<Vec<ChainId>>,
        timeout: Option<Duration>,
    ) -> WmResult<SupportedMethods> {
        let params = GetSupportedMethodsParams { chain_ids };
        self.request_typed(methods::GET_SUPPORTED_METHODS, to_wire(params)?, timeout)
            .await
    }

    /// Tear down the session
    ///
    /// The cached session id is cleared even when the router call fails.
    ///
    /// # Errors
    ///
    /// `invalidSession` when not connected; transport errors otherwise.
    pub async fn disconnect(&self, timeout: Option<Duration>) -> WmResult<()> {
        let session_id = self.require_session()?;
        self.store_session(None);
        self.node
            .request(
                methods::DISCONNECT,
                Some(serde_json::json!({ "sessionId": session_id })),
                timeout,
            )
            .await?;
        Ok(())
    }

    /// Subscribe to a router notification; returns an unsubscribe token
    pub fn on<F>(&self, notification: &str, callback: F) -> u64
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.node.on(notification, callback)
    }

    /// Remove a subscription made with [`WalletProvider::on`]
    pub fn unsubscribe(&self, token: u64) -> bool {
        self.node.unsubscribe(token)
    }

    /// Register a listener for transport-level faults
    ///
    /// Request failures reject their callers; this covers errors with no
    /// caller to reject.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&WmError) + Send + Sync + 'static,
    {
        self.node.on_error(callback);
    }

    /// Default timeout applied when a call site passes `None`
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    fn require_session(&self) -> WmResult<String> {
        self.session_id()
            .ok_or_else(|| WmError::invalid_session("not connected"))
    }

    fn store_session(&self, session_id: Option<String>) {
        if let Ok(mut guard) = self.session_id.write() {
            *guard = session_id;
        }
    }

    async fn request_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> WmResult<T> {
        let raw = self.node.request(method, Some(params), timeout).await?;
        serde_json::from_value(raw)
            .map_err(|error| WmError::internal(format!("malformed {method} result: {error}")))
    }
}

fn to_wire<T: serde::Serialize>(value: T) -> WmResult<Value> {
    serde_json::to_value(value).map_err(|error| WmError::internal(error.to_string()))
}
