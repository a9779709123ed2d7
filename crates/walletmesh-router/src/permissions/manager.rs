//! Permission Manager Contract
//!
//! The policy object the router queries on every `wm_call` and
//! `wm_bulkCall`, and the approval entry point used by `wm_connect` and
//! `wm_updatePermissions`. Two implementations ship with the crate: the
//! development-only [`crate::permissions::PermissivePermissions`] and the
//! three-state [`crate::permissions::AllowAskDenyPermissions`].

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use futures::future::BoxFuture;

// Layer 3: Internal module imports
use crate::error::WmResult;
use crate::node::RequestContext;
use crate::protocol::{ChainId, ChainPermissions, HumanReadablePermissions, MethodCall};

/// Interactive grant callback
///
/// Invoked on `wm_connect` and `wm_updatePermissions` with the requesting
/// origin and the permissions being asked for; intended to drive a UI
/// prompt. Returning an empty map denies everything.
pub type ApproveCallback = Arc<
    dyn Fn(String, ChainPermissions) -> BoxFuture<'static, WmResult<HumanReadablePermissions>>
        + Send
        + Sync,
>;

/// Interactive per-call callback for methods whose policy state is ASK
///
/// Receives the origin, the target chain, and every method the decision
/// covers (one for a single call, possibly several for a batch).
pub type AskCallback =
    Arc<dyn Fn(String, ChainId, Vec<String>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Best-effort cleanup callback invoked when a session disconnects
pub type RevokeCallback = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Policy object owned by the router
#[async_trait]
pub trait PermissionManager: Send + Sync {
    /// Decide a single inner call; `Ok(false)` means denied
    async fn check_call(
        &self,
        context: &RequestContext,
        chain_id: &ChainId,
        call: &MethodCall,
    ) -> WmResult<bool>;

    /// Decide a batch as one unit, fail-closed
    async fn check_bulk_call(
        &self,
        context: &RequestContext,
        chain_id: &ChainId,
        calls: &[MethodCall],
    ) -> WmResult<bool>;

    /// Run the interactive grant flow for requested permissions
    async fn approve(
        &self,
        context: &RequestContext,
        requested: &ChainPermissions,
    ) -> WmResult<HumanReadablePermissions>;

    /// Project current policy in the wire form, optionally filtered by chain
    async fn get_permissions(&self, chain_ids: Option<&[ChainId]>) -> HumanReadablePermissions;

    /// Best-effort cleanup when a session ends
    async fn revoke_session(&self, session_id: &str);
}
