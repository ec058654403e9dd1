use crate::config::Config;
use crate::gateway::UpstreamClient;
use crate::routing::PermissionResolver;
use crate::session::AuthSessionService;
use crate::store::TokenLedger;
use std::sync::Arc;

/// Application context containing shared dependencies
/// Everything in here is read-only after startup; the ledger carries its own locking
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub sessions: Arc<AuthSessionService>,
    pub resolver: Arc<PermissionResolver>,
    pub upstream: Arc<UpstreamClient>,
    pub ledger: Arc<dyn TokenLedger>,
}

impl AppContext {
    /// Creates a new application context
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<AuthSessionService>,
        resolver: Arc<PermissionResolver>,
        upstream: Arc<UpstreamClient>,
    ) -> Self {
        let ledger = sessions.ledger().clone();
        Self {
            config,
            sessions,
            resolver,
            upstream,
            ledger,
        }
    }
}
