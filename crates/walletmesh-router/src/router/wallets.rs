//! Wallet Registry Entry
//!
//! One handle per registered chain. The handle owns the wallet's node and
//! transport; wallet-to-router eventing goes through a forwarding channel
//! registered as a catch-all subscription, never a back-pointer, so there
//! is no ownership cycle to break on removal.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// Layer 3: Internal module imports
use crate::node::{JsonRpcNode, NodeConfig};
use crate::protocol::{ChainId, Transport, WalletStateChanged, WalletStateChanges};

/// A registered wallet backend
pub struct WalletHandle {
    /// The router-to-wallet JSON-RPC node
    pub node: Arc<JsonRpcNode>,

    /// The owned transport, closed on removal
    pub transport: Arc<dyn Transport>,

    /// Cancelled on removal; in-flight forwards race against it
    pub removal: CancellationToken,

    /// Catch-all subscription token, unregistered before teardown
    pub subscription: u64,
}

impl WalletHandle {
    /// Bind a node to the wallet transport and wire event forwarding
    ///
    /// Every notification the wallet emits is pushed onto `forward` tagged
    /// with the chain id; a single pump on the router side re-emits them
    /// upstream in arrival order.
    pub fn bind(
        chain_id: ChainId,
        transport: Arc<dyn Transport>,
        node_config: NodeConfig,
        forward: mpsc::UnboundedSender<WalletStateChanged>,
    ) -> Self {
        let node = JsonRpcNode::bind(Arc::clone(&transport), node_config);
        let subscription = node.on_any(move |event, payload| {
            let update = WalletStateChanged {
                chain_id: chain_id.clone(),
                changes: WalletStateChanges {
                    event: event.to_string(),
                    data: payload,
                },
            };
            let _ = forward.send(update);
        });
        Self {
            node,
            transport,
            removal: CancellationToken::new(),
            subscription,
        }
    }

    /// Tear the handle down: unsubscribe first, then cancel and close
    pub async fn teardown(self, error: &crate::error::WmError) {
        self.node.unsubscribe(self.subscription);
        self.removal.cancel();
        self.node.cancel_all(error);
        let _ = self.transport.close().await;
    }
}
