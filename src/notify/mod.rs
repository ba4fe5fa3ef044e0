//! Notification fan-out.
//!
//! Computes the recipient set for each ticket event and writes one
//! notification row per recipient. Zero recipients is a legal no-op.
//! Fan-out runs only after the primary mutation and its audit entry are
//! durable, and it is best-effort: a failure is logged and swallowed so
//! a notification outage never blocks ticket operations.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::shared::error::DeskError;
use crate::shared::models::{Comment, Notification, Role, Ticket, User};
use crate::shared::state::AppState;
use crate::store::DeskStore;

/// Events that fan out to notification rows.
#[derive(Debug, Clone)]
pub enum TicketEvent {
    Created { ticket: Ticket, actor: User },
    Commented { ticket: Ticket, comment: Comment },
    StatusChanged { ticket: Ticket, actor: User },
}

#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn DeskStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn DeskStore>) -> Self {
        Self { store }
    }

    /// Computes recipients and persists one row each. Returns the rows
    /// written so callers (and tests) can observe the fan-out.
    pub async fn fan_out(&self, event: TicketEvent) -> Result<Vec<Notification>, DeskError> {
        let rows = match event {
            TicketEvent::Created { ticket, actor } => {
                let recipients = self.active_admins().await?;
                build_rows(
                    recipients.iter().map(|u| u.id),
                    "New ticket created",
                    format!("{} opened a new ticket: {}", actor.name, ticket.title),
                    ticket.id,
                )
            }
            TicketEvent::Commented { ticket, comment } => {
                if comment.author_role == Role::Admin {
                    // Staff replied: tell the requester, unless they are
                    // the one commenting.
                    let recipients =
                        std::iter::once(ticket.requester_id).filter(|id| *id != comment.author_id);
                    build_rows(
                        recipients,
                        &format!("Update on ticket #{}", ticket.ticket_number),
                        format!(
                            "{} replied on ticket \"{}\"",
                            comment.author_name, ticket.title
                        ),
                        ticket.id,
                    )
                } else {
                    let recipients = self.active_admins().await?;
                    build_rows(
                        recipients.iter().map(|u| u.id),
                        &format!("New reply on ticket #{}", ticket.ticket_number),
                        format!(
                            "{} replied on ticket \"{}\"",
                            comment.author_name, ticket.title
                        ),
                        ticket.id,
                    )
                }
            }
            TicketEvent::StatusChanged { ticket, actor } => {
                let recipients =
                    std::iter::once(ticket.requester_id).filter(|id| *id != actor.id);
                build_rows(
                    recipients,
                    &format!("Ticket #{} updated", ticket.ticket_number),
                    format!(
                        "Your ticket \"{}\" is now {}",
                        ticket.title,
                        ticket.status.as_str()
                    ),
                    ticket.id,
                )
            }
        };

        self.store.insert_notifications(rows.clone()).await?;
        Ok(rows)
    }

    /// Best-effort wrapper used by the ticket service after the audit
    /// entry is durable.
    pub async fn fan_out_best_effort(&self, event: TicketEvent) {
        if let Err(e) = self.fan_out(event).await {
            tracing::warn!(error = %e, "notification fan-out failed, ticket data unaffected");
        }
    }

    async fn active_admins(&self) -> Result<Vec<User>, DeskError> {
        Ok(self
            .store
            .list_profiles()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Admin && u.is_active)
            .collect())
    }

    // ----- recipient-side operations -----

    pub async fn list_for(&self, user: &User) -> Result<Vec<Notification>, DeskError> {
        self.store.list_notifications(user.id).await
    }

    pub async fn mark_read(&self, user: &User, id: Uuid) -> Result<(), DeskError> {
        self.store.mark_notification_read(user.id, id).await
    }

    pub async fn mark_all_read(&self, user: &User) -> Result<(), DeskError> {
        self.store.mark_all_notifications_read(user.id).await
    }

    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), DeskError> {
        self.store.delete_notification(user.id, id).await
    }
}

fn build_rows(
    recipients: impl Iterator<Item = Uuid>,
    title: &str,
    message: String,
    ticket_id: Uuid,
) -> Vec<Notification> {
    let now = Utc::now();
    recipients
        .map(|user_id| Notification {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.clone(),
            is_read: false,
            ticket_id: Some(ticket_id),
            created_at: now,
        })
        .collect()
}

// ----- HTTP surface -----

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.notify.list_for(&actor).await?))
}

async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    state.notify.mark_read(&actor, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    state.notify.mark_all_read(&actor).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    state.notify.delete(&actor, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub fn configure_notification_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", put(mark_all_notifications_read))
        .route("/api/notifications/:id/read", put(mark_notification_read))
        .route("/api/notifications/:id", delete(delete_notification))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shared::models::{CommentSource, TicketPriority, TicketStatus};
    use crate::store::MemoryStore;
    use crate::sync::SyncBridge;

    struct Fixture {
        service: NotificationService,
        store: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new(SyncBridge::new()));
        Fixture {
            service: NotificationService::new(store.clone()),
            store,
        }
    }

    fn user(name: &str, role: Role, is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@anycorp.com", name.to_lowercase()),
            role,
            is_active,
        }
    }

    fn ticket(requester: &User, status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            ticket_number: 42,
            title: "VPN down".to_string(),
            description: "cannot connect".to_string(),
            requester_id: requester.id,
            requester_name: requester.name.clone(),
            priority: TicketPriority::High,
            status,
            category: "Network".to_string(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
            attachments: Vec::new(),
        }
    }

    fn comment(ticket: &Ticket, author: &User) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            author_id: author.id,
            author_name: author.name.clone(),
            author_role: author.role,
            body: "on it".to_string(),
            source: CommentSource::Web,
            created_at: Utc::now(),
        }
    }

    async fn seed(store: &MemoryStore, users: &[&User]) {
        for u in users {
            store.insert_profile((*u).clone()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn created_notifies_every_active_admin() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        let bo = user("Bo", Role::Admin, true);
        let cy = user("Cy", Role::Admin, true);
        let gone = user("Gone", Role::Admin, false);
        seed(&f.store, &[&ana, &bo, &cy, &gone]).await;

        let t = ticket(&ana, TicketStatus::Open);
        let rows = f
            .service
            .fan_out(TicketEvent::Created {
                ticket: t.clone(),
                actor: ana.clone(),
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        let mut recipients: Vec<Uuid> = rows.iter().map(|n| n.user_id).collect();
        recipients.sort();
        let mut expected = vec![bo.id, cy.id];
        expected.sort();
        assert_eq!(recipients, expected);
        assert!(rows[0].message.contains("VPN down"));
        assert!(rows.iter().all(|n| n.ticket_id == Some(t.id)));
    }

    #[tokio::test]
    async fn created_with_no_admins_is_a_silent_noop() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        seed(&f.store, &[&ana]).await;

        let rows = f
            .service
            .fan_out(TicketEvent::Created {
                ticket: ticket(&ana, TicketStatus::Open),
                actor: ana,
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn staff_comment_notifies_requester_only() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        let bo = user("Bo", Role::Admin, true);
        seed(&f.store, &[&ana, &bo]).await;

        let t = ticket(&ana, TicketStatus::InProgress);
        let rows = f
            .service
            .fan_out(TicketEvent::Commented {
                ticket: t.clone(),
                comment: comment(&t, &bo),
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, ana.id);
    }

    #[tokio::test]
    async fn requester_comment_notifies_active_admins() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        let bo = user("Bo", Role::Admin, true);
        seed(&f.store, &[&ana, &bo]).await;

        let t = ticket(&ana, TicketStatus::Open);
        let rows = f
            .service
            .fan_out(TicketEvent::Commented {
                ticket: t.clone(),
                comment: comment(&t, &ana),
            })
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, bo.id);
    }

    #[tokio::test]
    async fn admin_requester_commenting_on_own_ticket_gets_nothing() {
        let f = fixture();
        let bo = user("Bo", Role::Admin, true);
        seed(&f.store, &[&bo]).await;

        // Bo is both requester and commenting staff member.
        let t = ticket(&bo, TicketStatus::Open);
        let rows = f
            .service
            .fan_out(TicketEvent::Commented {
                ticket: t.clone(),
                comment: comment(&t, &bo),
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn status_change_notifies_requester_but_not_the_actor() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        let bo = user("Bo", Role::Admin, true);
        seed(&f.store, &[&ana, &bo]).await;

        let mut t = ticket(&ana, TicketStatus::Resolved);
        t.resolved_at = Some(Utc::now());
        let rows = f
            .service
            .fan_out(TicketEvent::StatusChanged {
                ticket: t.clone(),
                actor: bo.clone(),
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, ana.id);
        assert!(rows[0].message.contains("RESOLVED"));

        // Requester changing their own ticket gets no self-notification.
        let own = ticket(&bo, TicketStatus::Resolved);
        let rows = f
            .service
            .fan_out(TicketEvent::StatusChanged {
                ticket: own,
                actor: bo,
            })
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn recipient_operations_are_scoped_to_self() {
        let f = fixture();
        let ana = user("Ana", Role::User, true);
        let bo = user("Bo", Role::Admin, true);
        seed(&f.store, &[&ana, &bo]).await;

        let t = ticket(&ana, TicketStatus::Open);
        f.service
            .fan_out(TicketEvent::Created {
                ticket: t,
                actor: ana.clone(),
            })
            .await
            .unwrap();

        let inbox = f.service.list_for(&bo).await.unwrap();
        assert_eq!(inbox.len(), 1);

        // Ana cannot touch Bo's notification.
        let err = f.service.mark_read(&ana, inbox[0].id).await.unwrap_err();
        assert!(matches!(err, DeskError::NotFound(_)));

        f.service.mark_read(&bo, inbox[0].id).await.unwrap();
        assert!(f.service.list_for(&bo).await.unwrap()[0].is_read);

        f.service.delete(&bo, inbox[0].id).await.unwrap();
        assert!(f.service.list_for(&bo).await.unwrap().is_empty());
    }
}
