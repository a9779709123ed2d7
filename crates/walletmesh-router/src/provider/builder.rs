//! Chain Operation Builder
//!
//! Fluent accumulation of inner calls against one chain. The builder is
//! typestate: one call executes as `wm_call` and returns a scalar, a
//! second call upgrades the operation to a batch whose `execute` returns
//! the results in submitted order through `wm_bulkCall`. The scalar/list
//! distinction is made at compile time.
//!
//! ```rust,no_run
//! # use walletmesh_router::provider::WalletProvider;
//! # use serde_json::json;
//! # async fn example(provider: &WalletProvider) -> Result<(), walletmesh_router::error::WmError> {
//! // Single call: a scalar result.
//! let accounts = provider
//!     .chain("eip155:1")
//!     .call("eth_accounts", None)
//!     .execute(None)
//!     .await?;
//!
//! // Batch: results in submitted order.
//! let results = provider
//!     .chain("eip155:1")
//!     .call("eth_chainId", None)
//!     .call("eth_blockNumber", None)
//!     .execute(None)
//!     .await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::provider::WalletProvider;
use crate::error::WmResult;
use crate::protocol::{ChainId, MethodCall};

/// Entry point returned by [`WalletProvider::chain`]
pub struct ChainCallBuilder<'a> {
    provider: &'a WalletProvider,
    chain_id: ChainId,
}

impl<'a> ChainCallBuilder<'a> {
    pub(crate) fn new(provider: &'a WalletProvider, chain_id: ChainId) -> Self {
        Self { provider, chain_id }
    }

    /// Add the first call
    pub fn call(self, method: impl Into<String>, params: Option<Value>) -> SingleOperation<'a> {
        SingleOperation {
            provider: self.provider,
            chain_id: self.chain_id,
            call: MethodCall::new(method, params),
        }
    }
}

/// An operation holding exactly one call
pub struct SingleOperation<'a> {
    provider: &'a WalletProvider,
    chain_id: ChainId,
    call: MethodCall,
}

impl<'a> SingleOperation<'a> {
    /// Add a second call, turning the operation into a batch
    pub fn call(self, method: impl Into<String>, params: Option<Value>) -> BatchOperation<'a> {
        BatchOperation {
            provider: self.provider,
            chain_id: self.chain_id,
            calls: vec![self.call, MethodCall::new(method, params)],
        }
    }

    /// Execute as a single `wm_call`
    ///
    /// # Errors
    ///
    /// Whatever the underlying call returns.
    pub async fn execute(self, timeout: Option<Duration>) -> WmResult<Value> {
        self.provider.call(&self.chain_id, self.call, timeout).await
    }
}

/// An operation holding two or more calls
pub struct BatchOperation<'a> {
    provider: &'a WalletProvider,
    chain_id: ChainId,
    calls: Vec<MethodCall>,
}

impl BatchOperation<'_> {
    /// Add another call to the batch
    pub fn call(mut self, method: impl Into<String>, params: Option<Value>) -> Self {
        self.calls.push(MethodCall::new(method, params));
        self
    }

    /// Execute as one `wm_bulkCall`; results arrive in submitted order
    ///
    /// # Errors
    ///
    /// The first inner failure aborts the batch.
    pub async fn execute(self, timeout: Option<Duration>) -> WmResult<Vec<Value>> {
        self.provider
            .bulk_call(&self.chain_id, self.calls, timeout)
            .await
    }
}
