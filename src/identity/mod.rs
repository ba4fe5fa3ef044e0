//! Identity resolver.
//!
//! Turns an authenticated session into a full profile: self-heals a
//! missing row on first contact, applies the one-way bootstrap admin
//! promotion, and refuses to resolve deactivated accounts. The role of a
//! freshly created profile is always USER; client-supplied input never
//! sets role.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::shared::config::AppConfig;
use crate::shared::error::DeskError;
use crate::shared::models::{Role, User};
use crate::shared::state::AppState;
use crate::store::DeskStore;

#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn DeskStore>,
    bootstrap_admins: Vec<String>,
    bootstrap_prefixes: Vec<String>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn DeskStore>, config: &AppConfig) -> Self {
        Self {
            store,
            bootstrap_admins: config.bootstrap_admins.clone(),
            bootstrap_prefixes: config.bootstrap_prefixes.clone(),
        }
    }

    /// Resolves a session into a profile, creating the row if it is
    /// missing. Safe under at-least-once retry: a duplicate-insert
    /// conflict from a racing first-contact is treated as "profile
    /// already exists" and re-read.
    pub async fn resolve(
        &self,
        session_user_id: Uuid,
        session_email: &str,
        display_name_hint: Option<&str>,
    ) -> Result<User, DeskError> {
        let mut user = match self.store.get_profile(session_user_id).await? {
            Some(user) => user,
            None => {
                self.heal_missing_profile(session_user_id, session_email, display_name_hint)
                    .await?
            }
        };

        if !user.is_active {
            return Err(DeskError::AccountDeactivated);
        }

        if self.is_bootstrap_admin(&user.email) && user.role != Role::Admin {
            tracing::info!(email = %user.email, "bootstrap rule promoting account to ADMIN");
            user.role = Role::Admin;
            self.store.update_profile(user.clone()).await?;
        }

        Ok(user)
    }

    async fn heal_missing_profile(
        &self,
        id: Uuid,
        email: &str,
        display_name_hint: Option<&str>,
    ) -> Result<User, DeskError> {
        let name = display_name_hint
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());

        let user = User {
            id,
            name,
            email: email.to_string(),
            // Enforced default, never taken from client input.
            role: Role::User,
            is_active: true,
        };

        tracing::info!(user_id = %id, "profile missing for authenticated user, creating");
        match self.store.insert_profile(user.clone()).await {
            Ok(()) => Ok(user),
            Err(DeskError::Conflict(_)) => self
                .store
                .get_profile(id)
                .await?
                .ok_or_else(|| DeskError::NotFound(format!("profile {id}"))),
            Err(e) => Err(e),
        }
    }

    /// Promotion only; the rule never demotes, and reapplying it to an
    /// existing admin is a no-op.
    fn is_bootstrap_admin(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        if self.bootstrap_admins.iter().any(|a| *a == email) {
            return true;
        }
        let local = email.split('@').next().unwrap_or(&email);
        self.bootstrap_prefixes
            .iter()
            .any(|p| !p.is_empty() && local.starts_with(p.as_str()))
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, DeskError> {
        require_admin(actor)?;
        self.store.list_profiles().await
    }

    /// Explicit promotion/demotion, distinct from the bootstrap rule.
    pub async fn set_role(&self, actor: &User, user_id: Uuid, role: Role) -> Result<User, DeskError> {
        require_admin(actor)?;
        let mut user = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("profile {user_id}")))?;
        user.role = role;
        self.store.update_profile(user.clone()).await?;
        Ok(user)
    }

    /// Soft delete and reinstatement. Profiles are never hard-deleted.
    pub async fn set_active(
        &self,
        actor: &User,
        user_id: Uuid,
        is_active: bool,
    ) -> Result<User, DeskError> {
        require_admin(actor)?;
        let mut user = self
            .store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("profile {user_id}")))?;
        user.is_active = is_active;
        self.store.update_profile(user.clone()).await?;
        Ok(user)
    }
}

fn require_admin(actor: &User) -> Result<(), DeskError> {
    if !actor.is_admin() {
        return Err(DeskError::Unauthorized(
            "staff role required".to_string(),
        ));
    }
    Ok(())
}

// ----- HTTP surface -----

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

async fn resolve_identity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<User>, DeskError> {
    let user = state
        .identity
        .resolve(req.user_id, &req.email, req.display_name.as_deref())
        .await?;
    Ok(Json(user))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<Json<Vec<User>>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.identity.list_users(&actor).await?))
}

async fn set_user_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<User>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.identity.set_role(&actor, id, req.role).await?))
}

async fn set_user_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<User>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(
        state.identity.set_active(&actor, id, req.is_active).await?,
    ))
}

pub fn configure_identity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/identity/resolve", post(resolve_identity))
        .route("/api/users", get(list_users))
        .route("/api/users/:id/role", put(set_user_role))
        .route("/api/users/:id/active", put(set_user_active))
}
