//! Shared harness: an in-process mesh of provider, router, and one mock
//! wallet, plus permission-manager fixtures.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};

use walletmesh_router::error::WmError;
use walletmesh_router::node::{JsonRpcNode, NodeConfig, RequestContext};
use walletmesh_router::permissions::{
    AllowAskDenyConfig, AllowAskDenyPermissions, ApproveCallback, AskCallback, PermissionManager,
    PermissionState, PolicyTable,
};
use walletmesh_router::protocol::{
    ChainId, ChainPermissions, HumanReadablePermissions, PermissionDescriptor, Transport,
};
use walletmesh_router::provider::{ProviderConfig, WalletProvider};
use walletmesh_router::router::{RouterConfig, WalletRouter};
use walletmesh_router::session::SessionStore;
use walletmesh_router::transport::InProcessTransport;

pub const DAPP_ORIGIN: &str = "https://dapp.example";
pub const CHAIN: &str = "eip155:1";

/// A wallet backend living on the far end of a transport pair
pub struct MockWallet {
    pub node: Arc<JsonRpcNode>,
    /// Times the dangerous method was actually executed
    pub tx_calls: Arc<AtomicUsize>,
    /// Times `count_me` was actually executed
    pub counted_calls: Arc<AtomicUsize>,
}

impl MockWallet {
    pub fn bind(transport: Arc<dyn Transport>) -> Self {
        let node = JsonRpcNode::bind(transport, NodeConfig::default());
        let tx_calls = Arc::new(AtomicUsize::new(0));
        let counted_calls = Arc::new(AtomicUsize::new(0));

        node.register_method("eth_accounts", |_ctx: RequestContext, _params: Option<Value>| {
            async { Ok(json!(["0xabc0000000000000000000000000000000000001"])) }.boxed()
        })
        .unwrap();
        node.register_method("eth_chainId", |_ctx: RequestContext, _params: Option<Value>| {
            async { Ok(json!("0x1")) }.boxed()
        })
        .unwrap();
        node.register_method("eth_blockNumber", |_ctx: RequestContext, _params: Option<Value>| {
            async { Ok(json!("0x10d4f")) }.boxed()
        })
        .unwrap();
        node.register_method("echo_params", |_ctx: RequestContext, params: Option<Value>| {
            async move { Ok(params.unwrap_or(Value::Null)) }.boxed()
        })
        .unwrap();
        node.register_method("eth_fail", |_ctx: RequestContext, _params: Option<Value>| {
            async {
                Err(WmError::Wallet {
                    code: -32000,
                    message: "execution reverted".to_string(),
                    data: None,
                })
            }
            .boxed()
        })
        .unwrap();
        node.register_method("slow_sleep", |_ctx: RequestContext, _params: Option<Value>| {
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!("done"))
            }
            .boxed()
        })
        .unwrap();

        let tx_counter = Arc::clone(&tx_calls);
        node.register_method(
            "aztec_wmExecuteTx",
            move |_ctx: RequestContext, _params: Option<Value>| {
                let tx_counter = Arc::clone(&tx_counter);
                async move {
                    tx_counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!("0xtxhash"))
                }
                .boxed()
            },
        )
        .unwrap();

        let counted = Arc::clone(&counted_calls);
        node.register_method("count_me", move |_ctx: RequestContext, _params: Option<Value>| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(json!("counted"))
            }
            .boxed()
        })
        .unwrap();

        node.register_method(
            "wm_getSupportedMethods",
            |_ctx: RequestContext, _params: Option<Value>| {
                async {
                    Ok(json!([
                        "eth_accounts",
                        "eth_chainId",
                        "eth_blockNumber",
                        "aztec_wmExecuteTx",
                    ]))
                }
                .boxed()
            },
        )
        .unwrap();

        Self {
            node,
            tx_calls,
            counted_calls,
        }
    }
}

/// One provider, one router, one wallet on CHAIN, wired in-process
pub struct Mesh {
    pub router: Arc<WalletRouter>,
    pub provider: Arc<WalletProvider>,
    pub wallet: MockWallet,
}

pub fn mesh(manager: Arc<dyn PermissionManager>, config: RouterConfig) -> Mesh {
    mesh_with_store(manager, config, None)
}

pub fn mesh_with_store(
    manager: Arc<dyn PermissionManager>,
    config: RouterConfig,
    store: Option<Arc<dyn SessionStore>>,
) -> Mesh {
    let (dapp_side, router_side) = InProcessTransport::pair("walletmesh:router", DAPP_ORIGIN);
    let (router_wallet_side, wallet_backend_side) =
        InProcessTransport::pair("walletmesh:router", "wallet:eip155:1");

    let wallet = MockWallet::bind(wallet_backend_side);
    let wallet_transport: Arc<dyn Transport> = router_wallet_side;
    let router = WalletRouter::new(
        router_side,
        vec![(ChainId::new(CHAIN), wallet_transport)],
        manager,
        store,
        config,
    )
    .unwrap();
    let provider = Arc::new(WalletProvider::new(dapp_side, ProviderConfig::default()));

    Mesh {
        router,
        provider,
        wallet,
    }
}

/// Approve callback granting exactly what was requested
pub fn grant_requested() -> ApproveCallback {
    Arc::new(|_origin, requested: ChainPermissions| {
        async move {
            let mut granted = HumanReadablePermissions::new();
            for (chain_id, methods) in requested {
                let entries: BTreeMap<String, PermissionDescriptor> = methods
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

/// Approve callback granting nothing at all
pub fn grant_nothing() -> ApproveCallback {
    Arc::new(|_origin, _requested| async { Ok(HumanReadablePermissions::new()) }.boxed())
}

/// Ask callback with a fixed answer
pub fn ask_always(answer: bool) -> AskCallback {
    Arc::new(move |_origin, _chain, _methods| async move { answer }.boxed())
}

/// Three-state manager with a fixed policy for CHAIN
pub fn policy_manager(
    states: &[(&str, PermissionState)],
    approve: ApproveCallback,
    ask: AskCallback,
) -> Arc<AllowAskDenyPermissions> {
    let mut methods = BTreeMap::new();
    for (method, state) in states {
        methods.insert((*method).to_string(), *state);
    }
    let mut policy = PolicyTable::new();
    policy.insert(ChainId::new(CHAIN), methods);
    Arc::new(AllowAskDenyPermissions::with_policy(
        policy,
        AllowAskDenyConfig::default(),
        approve,
        ask,
    ))
}

/// Permission request for `methods` on CHAIN
pub fn request_permissions(methods: &[&str]) -> ChainPermissions {
    let mut permissions = ChainPermissions::new();
    permissions.insert(
        ChainId::new(CHAIN),
        methods.iter().map(|m| (*m).to_string()).collect::<BTreeSet<_>>(),
    );
    permissions
}
