//! Protocol Layer
//!
//! JSON-RPC 2.0 framing, the `wm_*` meta-protocol wire types, and the
//! transport abstraction every node sits on.

pub mod constants;
pub mod message;
pub mod transport;
pub mod types;

pub use message::{
    JsonRpcMessage, JsonRpcMessageTrait, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId, RpcErrorObject,
};
pub use transport::{MessageContext, MessageHandler, Transport, TransportError};
pub use types::{
    granted_permissions, BulkCallParams, CallParams, ChainId, ChainPermissions, ConnectParams,
    ConnectResult, DisconnectParams, GetPermissionsParams, GetSupportedMethodsParams,
    HumanReadablePermissions, MethodCall, PermissionDescriptor, ReconnectParams, ReconnectResult,
    SupportedMethods, UpdatePermissionsParams, WalletStateChanged, WalletStateChanges,
};
