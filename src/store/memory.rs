use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::error::DeskError;
use crate::shared::models::{AuditLogEntry, Comment, Notification, Ticket, User};
use crate::sync::{ChangeEvent, ChangeOp, EntityKind, SyncBridge};

use super::DeskStore;

/// In-memory store for tests and single-node runs. Publishes a change
/// event on the sync bridge after every successful mutation, which is
/// what a hosted store's change-data-capture channel would deliver.
pub struct MemoryStore {
    profiles: Arc<RwLock<HashMap<Uuid, User>>>,
    tickets: Arc<RwLock<HashMap<Uuid, Ticket>>>,
    comments: Arc<RwLock<Vec<Comment>>>,
    audit_logs: Arc<RwLock<Vec<AuditLogEntry>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
    ticket_seq: AtomicI64,
    bridge: SyncBridge,
}

impl MemoryStore {
    pub fn new(bridge: SyncBridge) -> Self {
        Self {
            profiles: Arc::new(RwLock::new(HashMap::new())),
            tickets: Arc::new(RwLock::new(HashMap::new())),
            comments: Arc::new(RwLock::new(Vec::new())),
            audit_logs: Arc::new(RwLock::new(Vec::new())),
            notifications: Arc::new(RwLock::new(Vec::new())),
            ticket_seq: AtomicI64::new(0),
            bridge,
        }
    }

    fn publish(
        &self,
        entity: EntityKind,
        op: ChangeOp,
        row_id: Uuid,
        ticket_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) {
        self.bridge.publish(ChangeEvent {
            entity,
            op,
            row_id,
            ticket_id,
            user_id,
        });
    }
}

#[async_trait]
impl DeskStore for MemoryStore {
    async fn get_profile(&self, id: Uuid) -> Result<Option<User>, DeskError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }

    async fn insert_profile(&self, user: User) -> Result<(), DeskError> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&user.id) {
            return Err(DeskError::Conflict(format!(
                "profile {} already exists",
                user.id
            )));
        }
        let id = user.id;
        profiles.insert(id, user);
        drop(profiles);
        self.publish(EntityKind::Profiles, ChangeOp::Insert, id, None, Some(id));
        Ok(())
    }

    async fn update_profile(&self, user: User) -> Result<(), DeskError> {
        let mut profiles = self.profiles.write().await;
        if !profiles.contains_key(&user.id) {
            return Err(DeskError::NotFound(format!("profile {}", user.id)));
        }
        let id = user.id;
        profiles.insert(id, user);
        drop(profiles);
        self.publish(EntityKind::Profiles, ChangeOp::Update, id, None, Some(id));
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<User>, DeskError> {
        let mut users: Vec<User> = self.profiles.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    async fn insert_ticket(&self, mut ticket: Ticket) -> Result<Ticket, DeskError> {
        ticket.ticket_number = self.ticket_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let id = ticket.id;
        self.tickets.write().await.insert(id, ticket.clone());
        self.publish(EntityKind::Tickets, ChangeOp::Insert, id, Some(id), None);
        Ok(ticket)
    }

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, DeskError> {
        Ok(self.tickets.read().await.get(&id).cloned())
    }

    async fn update_ticket(&self, ticket: Ticket) -> Result<(), DeskError> {
        let mut tickets = self.tickets.write().await;
        if !tickets.contains_key(&ticket.id) {
            return Err(DeskError::NotFound(format!("ticket {}", ticket.id)));
        }
        let id = ticket.id;
        tickets.insert(id, ticket);
        drop(tickets);
        self.publish(EntityKind::Tickets, ChangeOp::Update, id, Some(id), None);
        Ok(())
    }

    async fn delete_ticket(&self, id: Uuid) -> Result<(), DeskError> {
        let removed = self.tickets.write().await.remove(&id);
        if removed.is_none() {
            return Err(DeskError::NotFound(format!("ticket {id}")));
        }
        self.comments.write().await.retain(|c| c.ticket_id != id);
        self.audit_logs.write().await.retain(|e| e.ticket_id != id);
        self.notifications
            .write()
            .await
            .retain(|n| n.ticket_id != Some(id));
        self.publish(EntityKind::Tickets, ChangeOp::Delete, id, Some(id), None);
        Ok(())
    }

    async fn list_tickets(&self) -> Result<Vec<Ticket>, DeskError> {
        let mut tickets: Vec<Ticket> = self.tickets.read().await.values().cloned().collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<(), DeskError> {
        let (id, ticket_id, author_id) = (comment.id, comment.ticket_id, comment.author_id);
        self.comments.write().await.push(comment);
        self.publish(
            EntityKind::Comments,
            ChangeOp::Insert,
            id,
            Some(ticket_id),
            Some(author_id),
        );
        Ok(())
    }

    async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<Comment>, DeskError> {
        let mut comments: Vec<Comment> = self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    async fn insert_audit(&self, entry: AuditLogEntry) -> Result<bool, DeskError> {
        let mut logs = self.audit_logs.write().await;
        if logs.iter().any(|e| e.id == entry.id) {
            return Ok(false);
        }
        let (id, ticket_id) = (entry.id, entry.ticket_id);
        logs.push(entry);
        drop(logs);
        self.publish(
            EntityKind::AuditLogs,
            ChangeOp::Insert,
            id,
            Some(ticket_id),
            None,
        );
        Ok(true)
    }

    async fn list_audit(&self, ticket_id: Uuid) -> Result<Vec<AuditLogEntry>, DeskError> {
        let mut entries: Vec<AuditLogEntry> = self
            .audit_logs
            .read()
            .await
            .iter()
            .filter(|e| e.ticket_id == ticket_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn insert_notifications(&self, batch: Vec<Notification>) -> Result<(), DeskError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut notifications = self.notifications.write().await;
        for notification in batch {
            let (id, ticket_id, user_id) = (
                notification.id,
                notification.ticket_id,
                notification.user_id,
            );
            notifications.push(notification);
            self.publish(
                EntityKind::Notifications,
                ChangeOp::Insert,
                id,
                ticket_id,
                Some(user_id),
            );
        }
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, DeskError> {
        let mut rows: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<(), DeskError> {
        let mut rows = self.notifications.write().await;
        let row = rows
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or_else(|| DeskError::NotFound(format!("notification {id}")))?;
        row.is_read = true;
        let ticket_id = row.ticket_id;
        drop(rows);
        self.publish(
            EntityKind::Notifications,
            ChangeOp::Update,
            id,
            ticket_id,
            Some(user_id),
        );
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), DeskError> {
        let mut rows = self.notifications.write().await;
        let mut touched = Vec::new();
        for row in rows.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            row.is_read = true;
            touched.push((row.id, row.ticket_id));
        }
        drop(rows);
        for (id, ticket_id) in touched {
            self.publish(
                EntityKind::Notifications,
                ChangeOp::Update,
                id,
                ticket_id,
                Some(user_id),
            );
        }
        Ok(())
    }

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<(), DeskError> {
        let mut rows = self.notifications.write().await;
        let before = rows.len();
        rows.retain(|n| !(n.id == id && n.user_id == user_id));
        if rows.len() == before {
            return Err(DeskError::NotFound(format!("notification {id}")));
        }
        drop(rows);
        self.publish(
            EntityKind::Notifications,
            ChangeOp::Delete,
            id,
            None,
            Some(user_id),
        );
        Ok(())
    }
}
