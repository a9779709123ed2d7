//! Permissive Manager
//!
//! Accepts everything and projects a wildcard grant. Development only;
//! never wire this into anything user-facing.

// Layer 1: Standard library imports
use std::collections::BTreeMap;

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use super::manager::PermissionManager;
use crate::error::WmResult;
use crate::node::RequestContext;
use crate::protocol::{
    ChainId, ChainPermissions, HumanReadablePermissions, MethodCall, PermissionDescriptor,
};

/// Accept-all permission manager
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissivePermissions;

impl PermissivePermissions {
    /// Create the manager
    pub fn new() -> Self {
        Self
    }

    fn wildcard() -> HumanReadablePermissions {
        let mut methods = BTreeMap::new();
        methods.insert("*".to_string(), PermissionDescriptor::new(true, "allow"));
        let mut permissions = HumanReadablePermissions::new();
        permissions.insert(ChainId::new("*"), methods);
        permissions
    }
}

#[async_trait]
impl PermissionManager for PermissivePermissions {
    async fn check_call(
        &self,
        _context: &RequestContext,
        _chain_id: &ChainId,
        _call: &MethodCall,
    ) -> WmResult<bool> {
        Ok(true)
    }

    async fn check_bulk_call(
        &self,
        _context: &RequestContext,
        _chain_id: &ChainId,
        _calls: &[MethodCall],
    ) -> WmResult<bool> {
        Ok(true)
    }

    async fn approve(
        &self,
        _context: &RequestContext,
        _requested: &ChainPermissions,
    ) -> WmResult<HumanReadablePermissions> {
        Ok(Self::wildcard())
    }

    async fn get_permissions(&self, _chain_ids: Option<&[ChainId]>) -> HumanReadablePermissions {
        Self::wildcard()
    }

    async fn revoke_session(&self, _session_id: &str) {}
}
