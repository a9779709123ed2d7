//! Three-State Permission Manager
//!
//! Holds a policy table mapping chain and method to ALLOW, ASK, or DENY,
//! with two interactive callbacks: a grant prompt for `wm_connect` and
//! `wm_updatePermissions`, and a per-call prompt for ASK entries. Methods
//! absent from the table default to ASK (configurable).
//!
//! Checking never mutates the table; "remember this choice" flows go
//! through [`AllowAskDenyPermissions::set_state`] explicitly.

// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

// Layer 3: Internal module imports
use super::manager::{ApproveCallback, AskCallback, PermissionManager, RevokeCallback};
use crate::error::WmResult;
use crate::node::RequestContext;
use crate::protocol::{
    ChainId, ChainPermissions, HumanReadablePermissions, MethodCall, PermissionDescriptor,
};

/// Per-method policy state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Permit without asking
    Allow,
    /// Ask the user for this call
    Ask,
    /// Refuse without asking
    Deny,
}

impl PermissionState {
    /// The short label used in the human-readable projection
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionState::Allow => "allow",
            PermissionState::Ask => "ask",
            PermissionState::Deny => "deny",
        }
    }
}

/// Policy table: per chain, per method, a state
pub type PolicyTable = BTreeMap<ChainId, BTreeMap<String, PermissionState>>;

/// Manager configuration
#[derive(Debug, Clone)]
pub struct AllowAskDenyConfig {
    /// State assumed for methods absent from the table
    pub default_state: PermissionState,
}

impl Default for AllowAskDenyConfig {
    fn default() -> Self {
        Self {
            default_state: PermissionState::Ask,
        }
    }
}

/// Three-state permission manager
pub struct AllowAskDenyPermissions {
    policy: RwLock<PolicyTable>,
    config: AllowAskDenyConfig,
    approve_cb: ApproveCallback,
    ask_cb: AskCallback,
    revoke_cb: Option<RevokeCallback>,
}

impl AllowAskDenyPermissions {
    /// Create a manager with an empty policy table
    pub fn new(approve_cb: ApproveCallback, ask_cb: AskCallback) -> Self {
        Self {
            policy: RwLock::new(PolicyTable::new()),
            config: AllowAskDenyConfig::default(),
            approve_cb,
            ask_cb,
            revoke_cb: None,
        }
    }

    /// Create a manager with a pre-populated policy table
    pub fn with_policy(
        policy: PolicyTable,
        config: AllowAskDenyConfig,
        approve_cb: ApproveCallback,
        ask_cb: AskCallback,
    ) -> Self {
        Self {
            policy: RwLock::new(policy),
            config,
            approve_cb,
            ask_cb,
            revoke_cb: None,
        }
    }

    /// Attach a best-effort session cleanup callback
    pub fn with_revoke_callback(mut self, revoke_cb: RevokeCallback) -> Self {
        self.revoke_cb = Some(revoke_cb);
        self
    }

    /// The state recorded for a method, or the configured default
    pub async fn state_of(&self, chain_id: &ChainId, method: &str) -> PermissionState {
        self.policy
            .read()
            .await
            .get(chain_id)
            .and_then(|methods| methods.get(method))
            .copied()
            .unwrap_or(self.config.default_state)
    }

    /// Record a state; the "remember this choice" path
    pub async fn set_state(&self, chain_id: ChainId, method: String, state: PermissionState) {
        self.policy
            .write()
            .await
            .entry(chain_id)
            .or_default()
            .insert(method, state);
    }

    /// Fold an approval result into the policy table
    async fn absorb_grants(&self, granted: &HumanReadablePermissions) {
        let mut policy = self.policy.write().await;
        for (chain_id, methods) in granted {
            let chain = policy.entry(chain_id.clone()).or_default();
            for (method, descriptor) in methods {
                let state = if descriptor.allowed {
                    PermissionState::Allow
                } else {
                    PermissionState::Deny
                };
                chain.insert(method.clone(), state);
            }
        }
    }
}

#[async_trait]
impl PermissionManager for AllowAskDenyPermissions {
    async fn check_call(
        &self,
        context: &RequestContext,
        chain_id: &ChainId,
        call: &MethodCall,
    ) -> WmResult<bool> {
        match self.state_of(chain_id, &call.method).await {
            PermissionState::Allow => Ok(true),
            PermissionState::Deny => Ok(false),
            PermissionState::Ask => {
                let decision = (self.ask_cb)(
                    context.origin.clone(),
                    chain_id.clone(),
                    vec![call.method.clone()],
                )
                .await;
                Ok(decision)
            }
        }
    }

    async fn check_bulk_call(
        &self,
        context: &RequestContext,
        chain_id: &ChainId,
        calls: &[MethodCall],
    ) -> WmResult<bool> {
        if calls.is_empty() {
            return Ok(false);
        }

        let mut needs_ask = Vec::new();
        for call in calls {
            match self.state_of(chain_id, &call.method).await {
                // Any DENY fails the whole batch.
                PermissionState::Deny => return Ok(false),
                PermissionState::Ask => needs_ask.push(call.method.clone()),
                PermissionState::Allow => {}
            }
        }
        if needs_ask.is_empty() {
            return Ok(true);
        }

        // One prompt covers every ASK entry in the batch.
        let decision = (self.ask_cb)(context.origin.clone(), chain_id.clone(), needs_ask).await;
        Ok(decision)
    }

    async fn approve(
        &self,
        context: &RequestContext,
        requested: &ChainPermissions,
    ) -> WmResult<HumanReadablePermissions> {
        let granted = (self.approve_cb)(context.origin.clone(), requested.clone()).await?;
        self.absorb_grants(&granted).await;
        Ok(granted)
    }

    async fn get_permissions(&self, chain_ids: Option<&[ChainId]>) -> HumanReadablePermissions {
        let policy = self.policy.read().await;
        let mut projection = HumanReadablePermissions::new();
        for (chain_id, methods) in policy.iter() {
            if let Some(filter) = chain_ids {
                if !filter.contains(chain_id) {
                    continue;
                }
            }
            let entries: BTreeMap<String, PermissionDescriptor> = methods
                .iter()
                .map(|(method, state)| {
                    (
                        method.clone(),
                        PermissionDescriptor::new(*state != PermissionState::Deny, state.as_str()),
                    )
                })
                .collect();
            projection.insert(chain_id.clone(), entries);
        }
        projection
    }

    async fn revoke_session(&self, session_id: &str) {
        debug!(session_id, "revoking session grants");
        if let Some(revoke_cb) = &self.revoke_cb {
            revoke_cb(session_id.to_string()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn grant_all() -> ApproveCallback {
        Arc::new(|_origin, requested: ChainPermissions| {
            async move {
                let mut granted = HumanReadablePermissions::new();
                for (chain_id, methods) in requested {
                    let entries = methods
                        .into_iter()
                        .map(|method| (method, PermissionDescriptor::new(true, "allow")))
                        .collect();
                    granted.insert(chain_id, entries);
                }
                Ok(granted)
            }
            .boxed()
        })
    }

    fn ask_returning(answer: bool, hits: Arc<AtomicUsize>) -> AskCallback {
        Arc::new(move |_origin, _chain, _methods| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                answer
            }
            .boxed()
        })
    }

    fn context() -> RequestContext {
        RequestContext::new("https://dapp.example", Some(RequestId::new_number(1)))
    }

    fn manager_with(
        states: &[(&str, PermissionState)],
        answer: bool,
        hits: Arc<AtomicUsize>,
    ) -> AllowAskDenyPermissions {
        let mut policy = PolicyTable::new();
        let mut methods = BTreeMap::new();
        for (method, state) in states {
            methods.insert((*method).to_string(), *state);
        }
        policy.insert(ChainId::new("eip155:1"), methods);
        AllowAskDenyPermissions::with_policy(
            policy,
            AllowAskDenyConfig::default(),
            grant_all(),
            ask_returning(answer, hits),
        )
    }

    #[tokio::test]
    async fn allow_permits_without_asking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(
            &[("eth_accounts", PermissionState::Allow)],
            false,
            Arc::clone(&hits),
        );
        let allowed = manager
            .check_call(
                &context(),
                &ChainId::new("eip155:1"),
                &MethodCall::new("eth_accounts", None),
            )
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deny_refuses_without_asking() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(
            &[("personal_sign", PermissionState::Deny)],
            true,
            Arc::clone(&hits),
        );
        let allowed = manager
            .check_call(
                &context(),
                &ChainId::new("eip155:1"),
                &MethodCall::new("personal_sign", None),
            )
            .await
            .unwrap();
        assert!(!allowed);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn absent_methods_default_to_ask() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(&[], true, Arc::clone(&hits));
        let allowed = manager
            .check_call(
                &context(),
                &ChainId::new("eip155:1"),
                &MethodCall::new("eth_gasPrice", None),
            )
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ask_does_not_mutate_the_table() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(&[], true, Arc::clone(&hits));
        let chain = ChainId::new("eip155:1");
        let call = MethodCall::new("eth_gasPrice", None);

        manager.check_call(&context(), &chain, &call).await.unwrap();
        manager.check_call(&context(), &chain, &call).await.unwrap();
        // Still ASK; the user is prompted again.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state_of(&chain, "eth_gasPrice").await, PermissionState::Ask);
    }

    #[tokio::test]
    async fn empty_batch_is_denied() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(&[], true, hits);
        let allowed = manager
            .check_bulk_call(&context(), &ChainId::new("eip155:1"), &[])
            .await
            .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn one_deny_fails_the_whole_batch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(
            &[
                ("eth_accounts", PermissionState::Allow),
                ("personal_sign", PermissionState::Deny),
            ],
            true,
            Arc::clone(&hits),
        );
        let calls = [
            MethodCall::new("eth_accounts", None),
            MethodCall::new("personal_sign", None),
        ];
        let allowed = manager
            .check_bulk_call(&context(), &ChainId::new("eip155:1"), &calls)
            .await
            .unwrap();
        assert!(!allowed);
        // Fail-closed: the prompt never fires once a DENY is present.
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_with_asks_gets_a_single_prompt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(
            &[("eth_accounts", PermissionState::Allow)],
            true,
            Arc::clone(&hits),
        );
        let calls = [
            MethodCall::new("eth_accounts", None),
            MethodCall::new("eth_sign", None),
            MethodCall::new("eth_sendTransaction", None),
        ];
        let allowed = manager
            .check_bulk_call(&context(), &ChainId::new("eip155:1"), &calls)
            .await
            .unwrap();
        assert!(allowed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn approve_folds_grants_into_the_table() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(&[], false, hits);
        let mut requested = ChainPermissions::new();
        requested.insert(
            ChainId::new("eip155:1"),
            std::collections::BTreeSet::from(["eth_accounts".to_string()]),
        );

        manager.approve(&context(), &requested).await.unwrap();
        assert_eq!(
            manager.state_of(&ChainId::new("eip155:1"), "eth_accounts").await,
            PermissionState::Allow
        );
    }

    #[tokio::test]
    async fn projection_marks_deny_as_not_allowed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let manager = manager_with(
            &[
                ("eth_accounts", PermissionState::Allow),
                ("personal_sign", PermissionState::Deny),
                ("eth_sign", PermissionState::Ask),
            ],
            true,
            hits,
        );
        let projection = manager.get_permissions(None).await;
        let chain = &projection[&ChainId::new("eip155:1")];
        assert!(chain["eth_accounts"].allowed);
        assert!(!chain["personal_sign"].allowed);
        assert!(chain["eth_sign"].allowed);
        assert_eq!(chain["eth_sign"].short_desc, "ask");
    }

    #[tokio::test]
    async fn revoke_invokes_the_cleanup_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let manager = manager_with(&[], true, hits).with_revoke_callback(Arc::new(move |_id| {
            let flag = Arc::clone(&flag);
            async move {
                flag.store(true, Ordering::SeqCst);
            }
            .boxed()
        }));

        manager.revoke_session("session-1").await;
        assert!(fired.load(Ordering::SeqCst));
    }
}
