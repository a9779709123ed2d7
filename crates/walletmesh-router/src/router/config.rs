//! Router Configuration

// Layer 1: Standard library imports
use std::collections::HashSet;
use std::time::Duration;

// Layer 3: Internal module imports
use crate::approval::ApprovalQueueConfig;
use crate::protocol::constants::defaults;
use crate::session::SessionStoreConfig;

/// Configuration for a [`crate::router::WalletRouter`]
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Deadline for requests the router forwards to wallets
    pub request_timeout: Duration,

    /// Deadline for user approval of dangerous calls
    pub approval_timeout: Duration,

    /// Inner methods requiring per-call user approval
    pub dangerous_methods: HashSet<String>,

    /// Session store configuration, used when no store is supplied
    pub session: SessionStoreConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_millis(defaults::REQUEST_TIMEOUT_MS),
            approval_timeout: Duration::from_millis(defaults::APPROVAL_TIMEOUT_MS),
            dangerous_methods: HashSet::new(),
            session: SessionStoreConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Defaults, with `WM_APPROVAL_TIMEOUT_MS` and `WM_SESSION_LIFETIME_MS`
    /// honored when set
    pub fn from_env() -> Self {
        Self {
            approval_timeout: ApprovalQueueConfig::from_env().default_timeout,
            session: SessionStoreConfig::from_env(),
            ..Self::default()
        }
    }

    /// Mark a set of inner methods as requiring approval
    pub fn with_dangerous_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dangerous_methods = methods.into_iter().map(Into::into).collect();
        self
    }
}
