//! Provider Layer
//!
//! The dApp-facing client: typed meta-protocol calls, the fluent operation
//! builder, and the per-method serializer registry.

pub mod builder;
pub mod provider;
pub mod serializer;

pub use builder::{BatchOperation, ChainCallBuilder, SingleOperation};
pub use provider::{ProviderConfig, WalletProvider};
pub use serializer::{CodecFn, MethodSerializer, SerializerRegistry, ValueCodec};
