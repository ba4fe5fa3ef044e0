use std::sync::Arc;

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::identity::IdentityResolver;
use crate::notify::NotificationService;
use crate::shared::config::AppConfig;
use crate::shared::error::DeskError;
use crate::shared::models::User;
use crate::store::{DeskStore, MemoryStore};
use crate::sync::SyncBridge;
use crate::tickets::TicketService;

/// Header carrying the authenticated session's user id. Stands in for
/// the auth session provider; full authentication is out of scope.
pub const ACTOR_HEADER: &str = "x-desk-user";

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn DeskStore>,
    pub bridge: SyncBridge,
    pub identity: IdentityResolver,
    pub tickets: TicketService,
    pub notify: NotificationService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let bridge = SyncBridge::new();
        let store: Arc<dyn DeskStore> = Arc::new(MemoryStore::new(bridge.clone()));
        Self::with_store(config, store, bridge)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn DeskStore>, bridge: SyncBridge) -> Self {
        let identity = IdentityResolver::new(store.clone(), &config);
        let audit = AuditRecorder::new(store.clone());
        let notify = NotificationService::new(store.clone());
        let tickets = TicketService::new(store.clone(), audit, notify.clone());
        Self {
            config,
            store,
            bridge,
            identity,
            tickets,
            notify,
        }
    }

    /// Resolves the acting user from the session header. Deactivated
    /// accounts are rejected here, before any handler logic runs.
    pub async fn require_actor(&self, headers: &HeaderMap) -> Result<User, DeskError> {
        let raw = headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DeskError::Unauthorized("missing session header".to_string()))?;
        let id: Uuid = raw
            .parse()
            .map_err(|_| DeskError::Unauthorized("malformed session header".to_string()))?;
        let user = self
            .store
            .get_profile(id)
            .await?
            .ok_or_else(|| DeskError::Unauthorized("unknown session user".to_string()))?;
        if !user.is_active {
            return Err(DeskError::AccountDeactivated);
        }
        Ok(user)
    }
}
