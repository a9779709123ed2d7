//! Session and Permission Middleware
//!
//! The first two links of the router's dispatch chain. Session validation
//! runs for every method that cites a session; permission checks apply to
//! the two forwarding methods. The approval gate follows as the third link
//! (see [`crate::approval::ApprovalMiddleware`]).

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde_json::Value;
use tracing::error;

// Layer 3: Internal module imports
use crate::error::{WmError, WmResult};
use crate::node::{Middleware, Next, RequestContext};
use crate::permissions::PermissionManager;
use crate::protocol::constants::methods;
use crate::protocol::{BulkCallParams, CallParams, JsonRpcRequest};
use crate::session::{SessionError, SessionStore};

/// Convert a store failure, logging backend faults as internal
pub(crate) fn map_session_error(error: SessionError) -> WmError {
    if matches!(error, SessionError::Storage { .. }) {
        error!(%error, "session backend fault");
    }
    WmError::from(error)
}

/// Validates the session cited by each request and refreshes its lifetime
///
/// `wm_connect` has no session yet, `wm_reconnect` validates its own, and
/// `wm_getSupportedMethods` is pre-connect discovery; everything else must
/// cite a live session owned by the calling origin.
pub struct SessionMiddleware {
    sessions: Arc<dyn SessionStore>,
}

impl SessionMiddleware {
    /// Create the middleware
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    fn is_exempt(method: &str) -> bool {
        matches!(
            method,
            methods::CONNECT | methods::RECONNECT | methods::GET_SUPPORTED_METHODS
        )
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn handle(
        &self,
        context: &RequestContext,
        request: &JsonRpcRequest,
        next: Next<'_>,
    ) -> WmResult<Value> {
        if Self::is_exempt(&request.method) {
            return next.run(context, request).await;
        }

        let session_id = request
            .params
            .as_ref()
            .and_then(|params| params.get("sessionId"))
            .and_then(Value::as_str)
            .ok_or_else(|| WmError::invalid_request("missing sessionId"))?;

        self.sessions
            .validate_and_refresh(session_id, &context.origin)
            .await
            .map_err(map_session_error)?;

        next.run(context, request).await
    }
}

/// Applies the permission policy to `wm_call` and `wm_bulkCall`
pub struct PermissionMiddleware {
    permissions: Arc<dyn PermissionManager>,
}

impl PermissionMiddleware {
    /// Create the middleware
    pub fn new(permissions: Arc<dyn PermissionManager>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl Middleware for PermissionMiddleware {
    async fn handle(
        &self,
        context: &RequestContext,
        request: &JsonRpcRequest,
        next: Next<'_>,
    ) -> WmResult<Value> {
        let permitted = match request.method.as_str() {
            methods::CALL => {
                let params: CallParams = parse(request.params.as_ref())?;
                self.permissions
                    .check_call(context, &params.chain_id, &params.call)
                    .await?
            }
            methods::BULK_CALL => {
                let params: BulkCallParams = parse(request.params.as_ref())?;
                self.permissions
                    .check_bulk_call(context, &params.chain_id, &params.calls)
                    .await?
            }
            _ => return next.run(context, request).await,
        };

        if permitted {
            next.run(context, request).await
        } else {
            Err(WmError::insufficient_permissions("denied"))
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(params: Option<&Value>) -> WmResult<T> {
    let value = params.ok_or_else(|| WmError::invalid_request("missing params"))?;
    serde_json::from_value(value.clone()).map_err(|error| WmError::invalid_request(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissivePermissions;
    use crate::protocol::{ChainId, ChainPermissions, MethodCall, RequestId};
    use crate::session::{InMemorySessionStore, SessionStoreConfig};
    use futures::FutureExt;
    use serde_json::json;

    fn passthrough() -> impl crate::node::RpcHandler {
        |_ctx: RequestContext, _params: Option<Value>| async { Ok(json!("ok")) }.boxed()
    }

    #[tokio::test]
    async fn calls_with_a_live_session_pass() {
        let store = Arc::new(InMemorySessionStore::new(SessionStoreConfig::default()));
        let session = store.create("dapp", ChainPermissions::new()).await.unwrap();
        let gate = SessionMiddleware::new(Arc::clone(&store) as Arc<dyn SessionStore>);
        let handler = passthrough();

        let params = CallParams {
            chain_id: ChainId::new("eip155:1"),
            session_id: session.id,
            call: MethodCall::new("eth_accounts", None),
        };
        let request = JsonRpcRequest::new(
            methods::CALL,
            Some(serde_json::to_value(params).unwrap()),
            RequestId::new_number(1),
        );
        let context = RequestContext::new("dapp", Some(RequestId::new_number(1)));
        let next = Next {
            chain: &[],
            endpoint: &handler,
        };
        assert!(gate.handle(&context, &request, next).await.is_ok());
    }

    #[tokio::test]
    async fn foreign_origin_is_rejected() {
        let store = Arc::new(InMemorySessionStore::new(SessionStoreConfig::default()));
        let session = store.create("dapp", ChainPermissions::new()).await.unwrap();
        let gate = SessionMiddleware::new(Arc::clone(&store) as Arc<dyn SessionStore>);
        let handler = passthrough();

        let request = JsonRpcRequest::new(
            methods::DISCONNECT,
            Some(json!({"sessionId": session.id})),
            RequestId::new_number(1),
        );
        let context = RequestContext::new("intruder", Some(RequestId::new_number(1)));
        let next = Next {
            chain: &[],
            endpoint: &handler,
        };
        let error = gate.handle(&context, &request, next).await.unwrap_err();
        assert!(matches!(error, WmError::InvalidSession { .. }));
    }

    #[tokio::test]
    async fn connect_is_exempt_from_session_validation() {
        let store = Arc::new(InMemorySessionStore::new(SessionStoreConfig::default()));
        let gate = SessionMiddleware::new(store as Arc<dyn SessionStore>);
        let handler = passthrough();

        let request = JsonRpcRequest::new(
            methods::CONNECT,
            Some(json!({"permissions": {}})),
            RequestId::new_number(1),
        );
        let context = RequestContext::new("dapp", Some(RequestId::new_number(1)));
        let next = Next {
            chain: &[],
            endpoint: &handler,
        };
        assert!(gate.handle(&context, &request, next).await.is_ok());
    }

    #[tokio::test]
    async fn permission_middleware_ignores_meta_methods() {
        let gate = PermissionMiddleware::new(Arc::new(PermissivePermissions::new()));
        let handler = passthrough();
        let request = JsonRpcRequest::new(
            methods::GET_PERMISSIONS,
            Some(json!({"sessionId": "s"})),
            RequestId::new_number(1),
        );
        let context = RequestContext::new("dapp", Some(RequestId::new_number(1)));
        let next = Next {
            chain: &[],
            endpoint: &handler,
        };
        assert!(gate.handle(&context, &request, next).await.is_ok());
    }
}
