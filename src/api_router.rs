//! Combines the per-module routers into the unified API surface served
//! by `main.rs`.

use axum::Router;
use std::sync::Arc;

use crate::shared::state::AppState;

pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::notify::configure_notification_routes())
        .merge(crate::identity::configure_identity_routes())
}
