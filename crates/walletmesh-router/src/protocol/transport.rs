//! Transport Abstraction
//!
//! Event-driven message channel underneath every JSON-RPC node. A transport
//! delivers whole [`JsonRpcMessage`] frames; any framing that can do that is
//! acceptable (postMessage bridges, WebSockets, extension ports, in-process
//! pairs). The transport is also the authority on *origin*: it stamps every
//! inbound message with the originator it observed, and the session layer
//! trusts that stamp.
//!
//! # Design
//!
//! - **Event-driven**: inbound traffic arrives through [`MessageHandler`]
//!   callbacks instead of a blocking receive loop.
//! - **Separation of concerns**: the transport moves frames; the node bound
//!   to it owns correlation, dispatch, and events.
//! - **Origin-bearing**: [`MessageContext`] carries the originator string,
//!   defaulting to `"unknown"` when the transport cannot attest one.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// Layer 3: Internal module imports
use super::constants::defaults;
use super::message::JsonRpcMessage;

/// Transport-level error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-related errors
    #[error("connection error: {message}")]
    Connection {
        /// What went wrong with the connection
        message: String,
    },

    /// I/O operation errors
    #[error("i/o error: {source}")]
    Io {
        /// Underlying I/O failure
        #[from]
        source: std::io::Error,
    },

    /// Message serialization/deserialization errors
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serde failure
        #[from]
        source: serde_json::Error,
    },

    /// The transport has been closed
    #[error("transport closed")]
    Closed,

    /// Anything else
    #[error("transport error: {message}")]
    Other {
        /// Description of the failure
        message: String,
    },
}

/// Context attached to every inbound message
///
/// The origin is set by the transport, never by the peer's payload; a
/// request cannot claim an origin the transport did not observe.
#[derive(Debug, Clone)]
pub struct MessageContext {
    origin: String,
    received_at: DateTime<Utc>,
}

impl MessageContext {
    /// Context for a message from a known originator
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            received_at: Utc::now(),
        }
    }

    /// Context for a message whose originator could not be attested
    pub fn unknown() -> Self {
        Self::new(defaults::UNKNOWN_ORIGIN)
    }

    /// The originator the transport observed
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// When the transport received the message
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// Event-driven receiver side of a transport
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// An inbound frame arrived
    async fn handle_message(&self, message: JsonRpcMessage, context: MessageContext);

    /// The transport hit an error it could not attribute to a frame
    async fn handle_error(&self, error: TransportError);

    /// The transport closed; no further messages will be delivered
    async fn handle_close(&self);
}

/// Bidirectional message channel
///
/// One handler per transport; setting a second one is a configuration error
/// and is ignored with a warning by implementations.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a frame to the peer
    async fn send(&self, message: JsonRpcMessage) -> Result<(), TransportError>;

    /// Register the receiver; inbound delivery starts after this call
    fn set_message_handler(&self, handler: Arc<dyn MessageHandler>);

    /// Close the channel; pending outbound frames may be dropped
    async fn close(&self) -> Result<(), TransportError>;
}
