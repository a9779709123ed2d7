//! Approval-gate scenarios: concurrent dangerous calls, timeouts, and UI
//! resolution through the queue.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{ask_always, grant_requested, mesh, policy_manager, request_permissions, CHAIN};
use walletmesh_router::error::WmError;
use walletmesh_router::permissions::PermissionState;
use walletmesh_router::protocol::{ChainId, MethodCall};
use walletmesh_router::router::RouterConfig;

const DANGEROUS: &str = "aztec_wmExecuteTx";

fn dangerous_config(approval_timeout: Duration) -> RouterConfig {
    let mut config = RouterConfig::default().with_dangerous_methods([DANGEROUS]);
    config.approval_timeout = approval_timeout;
    config
}

fn allowed_manager() -> Arc<walletmesh_router::permissions::AllowAskDenyPermissions> {
    policy_manager(
        &[(DANGEROUS, PermissionState::Allow)],
        grant_requested(),
        ask_always(false),
    )
}

#[tokio::test]
async fn concurrent_dangerous_calls_need_independent_confirmations() {
    let mesh = mesh(allowed_manager(), dangerous_config(Duration::from_secs(5)));
    mesh.provider
        .connect(request_permissions(&[DANGEROUS]), None)
        .await
        .unwrap();

    let first = {
        let provider = Arc::clone(&mesh.provider);
        tokio::spawn(async move {
            provider
                .call(&ChainId::new(CHAIN), MethodCall::new(DANGEROUS, None), None)
                .await
        })
    };
    let second = {
        let provider = Arc::clone(&mesh.provider);
        tokio::spawn(async move {
            provider
                .call(&ChainId::new(CHAIN), MethodCall::new(DANGEROUS, None), None)
                .await
        })
    };

    // Both entries queue under their own outer ids.
    let queue = mesh.router.approval_queue().clone();
    let mut waited = 0;
    while queue.pending_count() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
        assert!(waited < 100, "both approvals should be pending");
    }
    assert_eq!(mesh.wallet.tx_calls.load(Ordering::SeqCst), 0);

    let pending = queue.get_all_pending();
    assert_eq!(pending.len(), 2);
    assert_ne!(pending[0].request_id, pending[1].request_id);
    assert_eq!(pending[0].method, DANGEROUS);

    // Approve the first; the second stays pending.
    queue.resolve(&pending[0].request_id, true).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(queue.has_pending(&pending[1].request_id));
    assert_eq!(mesh.wallet.tx_calls.load(Ordering::SeqCst), 1);

    // Deny the second.
    queue.resolve(&pending[1].request_id, false).unwrap();

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let approved = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let denied = outcomes
        .iter()
        .filter(|outcome| {
            matches!(outcome, Err(WmError::InsufficientPermissions { reason }) if reason == "denied")
        })
        .count();
    assert_eq!(approved, 1);
    assert_eq!(denied, 1);
    // Exactly one call reached the wallet.
    assert_eq!(mesh.wallet.tx_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unanswered_approval_times_out_with_reason() {
    let mesh = mesh(allowed_manager(), dangerous_config(Duration::from_millis(100)));
    mesh.provider
        .connect(request_permissions(&[DANGEROUS]), None)
        .await
        .unwrap();

    let started = std::time::Instant::now();
    let error = mesh
        .provider
        .call(&ChainId::new(CHAIN), MethodCall::new(DANGEROUS, None), None)
        .await
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(100));
    match error {
        WmError::InsufficientPermissions { reason } => assert_eq!(reason, "timeout"),
        other => panic!("expected insufficientPermissions, got {other:?}"),
    }
    // The queue entry is gone and the wallet never saw the call.
    assert_eq!(mesh.router.approval_queue().pending_count(), 0);
    assert_eq!(mesh.wallet.tx_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn queued_listener_sees_the_context_as_the_ui_would() {
    let mesh = mesh(allowed_manager(), dangerous_config(Duration::from_secs(5)));
    mesh.provider
        .connect(request_permissions(&[DANGEROUS]), None)
        .await
        .unwrap();
    let session_id = mesh.provider.session_id().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let queue = mesh.router.approval_queue().clone();
    let resolver = queue.clone();
    queue.on_queued(move |context| {
        if let Ok(mut list) = sink.lock() {
            list.push(context.clone());
        }
        // Approve immediately, as an auto-approving UI would.
        let _ = resolver.resolve(&context.request_id, true);
    });

    let result = mesh
        .provider
        .call(
            &ChainId::new(CHAIN),
            MethodCall::new(DANGEROUS, Some(serde_json::json!({"nonce": 1}))),
            None,
        )
        .await
        .unwrap();
    assert_eq!(result, serde_json::json!("0xtxhash"));

    let contexts = seen.lock().unwrap();
    assert_eq!(contexts.len(), 1);
    let context = &contexts[0];
    assert_eq!(context.method, DANGEROUS);
    assert_eq!(context.chain_id, ChainId::new(CHAIN));
    assert_eq!(context.origin, common::DAPP_ORIGIN);
    assert_eq!(context.session_id, session_id);
    assert_eq!(context.params, Some(serde_json::json!({"nonce": 1})));
    assert!(!context.tx_status_id.is_empty());
}

#[tokio::test]
async fn safe_methods_are_not_gated() {
    let manager = policy_manager(
        &[
            (DANGEROUS, PermissionState::Allow),
            ("eth_accounts", PermissionState::Allow),
        ],
        grant_requested(),
        ask_always(false),
    );
    let mesh = mesh(manager, dangerous_config(Duration::from_secs(5)));
    mesh.provider
        .connect(request_permissions(&["eth_accounts"]), None)
        .await
        .unwrap();

    // No listener resolves anything, yet the safe call returns promptly.
    let result = tokio::time::timeout(
        Duration::from_secs(1),
        mesh.provider
            .call(&ChainId::new(CHAIN), MethodCall::new("eth_accounts", None), None),
    )
    .await
    .unwrap();
    assert!(result.is_ok());
    assert_eq!(mesh.router.approval_queue().pending_count(), 0);
}

#[tokio::test]
async fn shutdown_rejects_pending_approvals() {
    let mesh = mesh(allowed_manager(), dangerous_config(Duration::from_secs(30)));
    mesh.provider
        .connect(request_permissions(&[DANGEROUS]), None)
        .await
        .unwrap();

    let inflight = {
        let provider = Arc::clone(&mesh.provider);
        tokio::spawn(async move {
            provider
                .call(&ChainId::new(CHAIN), MethodCall::new(DANGEROUS, None), None)
                .await
        })
    };
    let queue = mesh.router.approval_queue().clone();
    let mut waited = 0;
    while queue.pending_count() < 1 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
        assert!(waited < 100, "approval should be pending");
    }

    queue.cleanup_all();
    let outcome = inflight.await.unwrap();
    assert!(outcome.is_err());
    assert_eq!(queue.pending_count(), 0);
    assert_eq!(mesh.wallet.tx_calls.load(Ordering::SeqCst), 0);
}
