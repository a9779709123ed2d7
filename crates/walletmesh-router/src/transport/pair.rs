//! In-Process Transport Pair
//!
//! Two linked endpoints over unbounded channels, for wiring a provider to a
//! router (or a router to a wallet) inside one process. This is the framing
//! used by the browser-extension deployment, where every hop is a port in
//! the same runtime, and by the integration tests.
//!
//! Each endpoint is created with the origin it attests for its peer: frames
//! delivered to the left endpoint's handler are stamped with the origin
//! configured for traffic coming from the right, and vice versa. Messages
//! sent before a handler is registered are buffered in the channel and
//! delivered once delivery starts.

// Layer 1: Standard library imports
use std::sync::{Arc, Mutex};

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

// Layer 3: Internal module imports
use crate::protocol::transport::{MessageContext, MessageHandler, Transport, TransportError};
use crate::protocol::JsonRpcMessage;

/// One side of an in-process transport pair
pub struct InProcessTransport {
    /// Frames going to the peer
    outbound: Mutex<Option<mpsc::UnboundedSender<JsonRpcMessage>>>,

    /// Frames coming from the peer; taken by the pump on handler registration
    inbound: Mutex<Option<mpsc::UnboundedReceiver<JsonRpcMessage>>>,

    /// Origin stamped on every frame delivered to this side's handler
    peer_origin: String,
}

impl InProcessTransport {
    /// Create a connected pair
    ///
    /// `left_sees` is the origin the left endpoint attests for the right
    /// peer's traffic; `right_sees` the reverse. A router-facing endpoint is
    /// typically built with the dApp's origin on the router side:
    ///
    /// ```rust
    /// use walletmesh_router::transport::InProcessTransport;
    ///
    /// let (dapp_side, router_side) =
    ///     InProcessTransport::pair("walletmesh:router", "https://dapp.example");
    /// # let _ = (dapp_side, router_side);
    /// ```
    pub fn pair(
        left_sees: impl Into<String>,
        right_sees: impl Into<String>,
    ) -> (Arc<InProcessTransport>, Arc<InProcessTransport>) {
        let (to_right, from_left) = mpsc::unbounded_channel();
        let (to_left, from_right) = mpsc::unbounded_channel();

        let left = Arc::new(InProcessTransport {
            outbound: Mutex::new(Some(to_right)),
            inbound: Mutex::new(Some(from_right)),
            peer_origin: left_sees.into(),
        });
        let right = Arc::new(InProcessTransport {
            outbound: Mutex::new(Some(to_left)),
            inbound: Mutex::new(Some(from_left)),
            peer_origin: right_sees.into(),
        });
        (left, right)
    }

    fn take_sender(&self) -> Option<mpsc::UnboundedSender<JsonRpcMessage>> {
        match self.outbound.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        let sender = match self.outbound.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(message).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    fn set_message_handler(&self, handler: Arc<dyn MessageHandler>) {
        let receiver = match self.inbound.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(mut receiver) = receiver else {
            warn!("message handler already registered for this endpoint, ignoring");
            return;
        };

        let origin = self.peer_origin.clone();
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                handler
                    .handle_message(message, MessageContext::new(origin.clone()))
                    .await;
            }
            handler.handle_close().await;
        });
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Dropping the sender ends the peer's pump, which fires handle_close.
        drop(self.take_sender());
        Ok(())
    }
}
