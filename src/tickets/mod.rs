//! Ticket service: create/edit/transition/delete/comment, visibility
//! listing, and dashboard stats.
//!
//! Every mutating operation runs the same awaited sequence: persist the
//! mutation, then append the audit entry, then attempt notification
//! fan-out. A failed mutation aborts everything; a failed audit write is
//! fatal even though the mutation is durable; a failed fan-out is logged
//! and swallowed.

pub mod lifecycle;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::authz;
use crate::notify::{NotificationService, TicketEvent};
use crate::shared::error::DeskError;
use crate::shared::models::{
    AuditAction, AuditLogEntry, Comment, CommentSource, Ticket, TicketPriority, TicketStats,
    TicketStatus, User,
};
use crate::shared::state::AppState;
use crate::store::DeskStore;

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub category: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditTicketRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TicketPriority>,
    pub category: Option<String>,
    pub attachments: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub body: String,
    #[serde(default)]
    pub source: Option<CommentSource>,
}

#[derive(Debug, Serialize)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub comments: Vec<Comment>,
    pub logs: Vec<AuditLogEntry>,
}

#[derive(Clone)]
pub struct TicketService {
    store: Arc<dyn DeskStore>,
    audit: AuditRecorder,
    notify: NotificationService,
}

impl TicketService {
    pub fn new(store: Arc<dyn DeskStore>, audit: AuditRecorder, notify: NotificationService) -> Self {
        Self {
            store,
            audit,
            notify,
        }
    }

    pub async fn create_ticket(
        &self,
        actor: &User,
        req: CreateTicketRequest,
    ) -> Result<Ticket, DeskError> {
        if req.title.trim().is_empty() {
            return Err(DeskError::Validation("title is required".to_string()));
        }
        if req.description.trim().is_empty() {
            return Err(DeskError::Validation("description is required".to_string()));
        }

        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            ticket_number: 0, // assigned by the store
            title: req.title,
            description: req.description,
            requester_id: actor.id,
            requester_name: actor.name.clone(),
            priority: req.priority,
            status: TicketStatus::Open,
            category: req.category,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            attachments: req.attachments,
        };

        let ticket = self
            .store
            .insert_ticket(ticket)
            .await
            .map_err(|e| DeskError::MutationFailed(e.to_string()))?;

        self.audit
            .record(
                ticket.id,
                Some(actor.id),
                AuditAction::Created,
                format!("Ticket created with priority {}", ticket.priority.as_str()),
                now,
            )
            .await?;

        self.notify
            .fan_out_best_effort(TicketEvent::Created {
                ticket: ticket.clone(),
                actor: actor.clone(),
            })
            .await;

        tracing::info!(ticket = ticket.ticket_number, requester = %actor.name, "ticket created");
        Ok(ticket)
    }

    pub async fn edit_ticket(
        &self,
        actor: &User,
        id: Uuid,
        req: EditTicketRequest,
    ) -> Result<Ticket, DeskError> {
        let mut ticket = self.load(id).await?;
        if !authz::can_edit(&ticket, actor) {
            return Err(DeskError::Unauthorized(
                "not allowed to edit this ticket".to_string(),
            ));
        }
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(DeskError::Validation("title cannot be empty".to_string()));
            }
        }

        let now = Utc::now();
        if let Some(title) = req.title {
            ticket.title = title;
        }
        if let Some(description) = req.description {
            ticket.description = description;
        }
        if let Some(priority) = req.priority {
            ticket.priority = priority;
        }
        if let Some(category) = req.category {
            ticket.category = category;
        }
        if let Some(attachments) = req.attachments {
            ticket.attachments = attachments;
        }
        ticket.updated_at = now;

        self.store
            .update_ticket(ticket.clone())
            .await
            .map_err(|e| DeskError::MutationFailed(e.to_string()))?;

        self.audit
            .record(
                ticket.id,
                Some(actor.id),
                AuditAction::Edited,
                "Ticket details edited",
                now,
            )
            .await?;

        Ok(ticket)
    }

    /// Staff-only. Validates the requested status before any write, then
    /// applies the lifecycle state machine.
    pub async fn transition_status(
        &self,
        actor: &User,
        id: Uuid,
        requested: &str,
    ) -> Result<Ticket, DeskError> {
        let requested = TicketStatus::parse(requested)?;
        if !authz::can_transition(actor) {
            return Err(DeskError::Unauthorized(
                "only staff may change ticket status".to_string(),
            ));
        }
        let mut ticket = self.load(id).await?;

        let now = Utc::now();
        let change = lifecycle::transition(&ticket, requested, now);
        lifecycle::apply(&mut ticket, &change, now);

        self.store
            .update_ticket(ticket.clone())
            .await
            .map_err(|e| DeskError::MutationFailed(e.to_string()))?;

        self.audit
            .record(
                ticket.id,
                Some(actor.id),
                AuditAction::StatusChange,
                change.details.clone(),
                now,
            )
            .await?;

        self.notify
            .fan_out_best_effort(TicketEvent::StatusChanged {
                ticket: ticket.clone(),
                actor: actor.clone(),
            })
            .await;

        tracing::info!(ticket = ticket.ticket_number, status = ticket.status.as_str(),
            "ticket status changed");
        Ok(ticket)
    }

    /// Cascades to the ticket's comments, audit entries, and
    /// notifications at the store layer.
    pub async fn delete_ticket(&self, actor: &User, id: Uuid) -> Result<(), DeskError> {
        let ticket = self.load(id).await?;
        if !authz::can_delete(&ticket, actor) {
            return Err(DeskError::Unauthorized(
                "not allowed to delete this ticket".to_string(),
            ));
        }
        self.store
            .delete_ticket(id)
            .await
            .map_err(|e| DeskError::MutationFailed(e.to_string()))?;
        tracing::info!(ticket = ticket.ticket_number, "ticket deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        actor: &User,
        ticket_id: Uuid,
        req: AddCommentRequest,
    ) -> Result<Comment, DeskError> {
        if req.body.trim().is_empty() {
            return Err(DeskError::Validation("comment cannot be empty".to_string()));
        }
        let mut ticket = self.load(ticket_id).await?;
        if !authz::can_view(&ticket, actor) {
            return Err(DeskError::Unauthorized(
                "not allowed to comment on this ticket".to_string(),
            ));
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            ticket_id,
            author_id: actor.id,
            author_name: actor.name.clone(),
            author_role: actor.role,
            body: req.body,
            source: req.source.unwrap_or(CommentSource::Web),
            created_at: now,
        };

        // Bump the ticket first: if it was deleted between load and here,
        // this fails NotFound before any comment row exists, so a failure
        // never leaves a durable orphaned comment behind.
        ticket.updated_at = now;
        self.store
            .update_ticket(ticket.clone())
            .await
            .map_err(|e| match e {
                DeskError::NotFound(_) => e,
                other => DeskError::MutationFailed(other.to_string()),
            })?;

        self.store
            .insert_comment(comment.clone())
            .await
            .map_err(|e| DeskError::MutationFailed(e.to_string()))?;

        self.notify
            .fan_out_best_effort(TicketEvent::Commented {
                ticket,
                comment: comment.clone(),
            })
            .await;

        Ok(comment)
    }

    /// Admin sees all tickets; a user sees exactly their own.
    pub async fn list_visible(&self, actor: &User) -> Result<Vec<Ticket>, DeskError> {
        let tickets = self.store.list_tickets().await?;
        Ok(authz::visible(tickets, actor))
    }

    pub async fn get_detail(&self, actor: &User, id: Uuid) -> Result<TicketDetail, DeskError> {
        let ticket = self.load(id).await?;
        if !authz::can_view(&ticket, actor) {
            return Err(DeskError::Unauthorized(
                "not allowed to view this ticket".to_string(),
            ));
        }
        let comments = self.store.list_comments(id).await?;
        let logs = self.audit.history(id).await?;
        Ok(TicketDetail {
            ticket,
            comments,
            logs,
        })
    }

    pub async fn stats(&self, actor: &User) -> Result<TicketStats, DeskError> {
        let tickets = self.list_visible(actor).await?;
        Ok(TicketStats {
            total: tickets.len() as i64,
            open: tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Open)
                .count() as i64,
            critical: tickets
                .iter()
                .filter(|t| t.priority == TicketPriority::Critical)
                .count() as i64,
            resolved: tickets
                .iter()
                .filter(|t| t.status.is_terminal())
                .count() as i64,
        })
    }

    async fn load(&self, id: Uuid) -> Result<Ticket, DeskError> {
        self.store
            .get_ticket(id)
            .await?
            .ok_or_else(|| DeskError::NotFound(format!("ticket {id}")))
    }
}

// ----- HTTP surface -----

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateTicketRequest>,
) -> Result<Json<Ticket>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.create_ticket(&actor, req).await?))
}

async fn list_tickets(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Ticket>>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.list_visible(&actor).await?))
}

async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TicketDetail>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.get_detail(&actor, id).await?))
}

async fn edit_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<EditTicketRequest>,
) -> Result<Json<Ticket>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.edit_ticket(&actor, id, req).await?))
}

async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Ticket>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(
        state
            .tickets
            .transition_status(&actor, id, &req.status)
            .await?,
    ))
}

async fn delete_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    state.tickets.delete_ticket(&actor, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<AddCommentRequest>,
) -> Result<Json<Comment>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.add_comment(&actor, id, req).await?))
}

async fn list_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<Comment>>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.get_detail(&actor, id).await?.comments))
}

async fn list_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditLogEntry>>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.get_detail(&actor, id).await?.logs))
}

async fn ticket_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TicketStats>, DeskError> {
    let actor = state.require_actor(&headers).await?;
    Ok(Json(state.tickets.stats(&actor).await?))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/stats", get(ticket_stats))
        .route(
            "/api/tickets/:id",
            get(get_ticket).put(edit_ticket).delete(delete_ticket),
        )
        .route("/api/tickets/:id/status", put(change_status))
        .route("/api/tickets/:id/comments", get(list_comments).post(add_comment))
        .route("/api/tickets/:id/logs", get(list_logs))
}
