//! Per-Method Serializer Registry
//!
//! Some chain SDKs use parameter and result types that do not survive
//! plain JSON. The registry maps exact method names to codec pairs applied
//! by the provider before sending and after receiving; absence means
//! pass-through. The same registry shape runs on the wallet side in the
//! mirror direction, keeping the wire symmetric.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use serde_json::Value;

// Layer 3: Internal module imports
use crate::error::WmResult;

/// A single value transformation
pub type CodecFn = Arc<dyn Fn(Value) -> WmResult<Value> + Send + Sync>;

/// Paired transform for one direction of a method's traffic
#[derive(Clone)]
pub struct ValueCodec {
    /// Applied before the value leaves this side
    pub serialize: CodecFn,
    /// Applied after a value arrives on this side
    pub deserialize: CodecFn,
}

impl ValueCodec {
    /// Create a codec from the two directions
    pub fn new(serialize: CodecFn, deserialize: CodecFn) -> Self {
        Self {
            serialize,
            deserialize,
        }
    }
}

/// Codecs registered for one method
#[derive(Clone, Default)]
pub struct MethodSerializer {
    /// Codec for the params value
    pub params: Option<ValueCodec>,
    /// Codec for the result value
    pub result: Option<ValueCodec>,
}

/// Exact-name registry of method serializers
#[derive(Default)]
pub struct SerializerRegistry {
    entries: DashMap<String, MethodSerializer>,
}

impl SerializerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a serializer for a method, replacing any previous one
    pub fn register(&self, method: impl Into<String>, serializer: MethodSerializer) {
        self.entries.insert(method.into(), serializer);
    }

    /// Remove a method's serializer
    pub fn unregister(&self, method: &str) {
        self.entries.remove(method);
    }

    /// Whether a method has a serializer
    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Transform outgoing params; identity when unregistered
    ///
    /// # Errors
    ///
    /// Whatever the registered codec returns.
    pub fn serialize_params(&self, method: &str, params: Option<Value>) -> WmResult<Option<Value>> {
        let codec = self
            .entries
            .get(method)
            .and_then(|entry| entry.params.clone());
        match (codec, params) {
            (Some(codec), Some(value)) => Ok(Some((codec.serialize)(value)?)),
            (_, params) => Ok(params),
        }
    }

    /// Transform an incoming result; identity when unregistered
    ///
    /// # Errors
    ///
    /// Whatever the registered codec returns.
    pub fn deserialize_result(&self, method: &str, result: Value) -> WmResult<Value> {
        match self
            .entries
            .get(method)
            .and_then(|entry| entry.result.clone())
        {
            Some(codec) => (codec.deserialize)(result),
            None => Ok(result),
        }
    }

    /// Transform incoming params; the wallet-side mirror of
    /// [`SerializerRegistry::serialize_params`]
    ///
    /// # Errors
    ///
    /// Whatever the registered codec returns.
    pub fn deserialize_params(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> WmResult<Option<Value>> {
        let codec = self
            .entries
            .get(method)
            .and_then(|entry| entry.params.clone());
        match (codec, params) {
            (Some(codec), Some(value)) => Ok(Some((codec.deserialize)(value)?)),
            (_, params) => Ok(params),
        }
    }

    /// Transform an outgoing result; the wallet-side mirror of
    /// [`SerializerRegistry::deserialize_result`]
    ///
    /// # Errors
    ///
    /// Whatever the registered codec returns.
    pub fn serialize_result(&self, method: &str, result: Value) -> WmResult<Value> {
        match self
            .entries
            .get(method)
            .and_then(|entry| entry.result.clone())
        {
            Some(codec) => (codec.serialize)(result),
            None => Ok(result),
        }
    }
}
