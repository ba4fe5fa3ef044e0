//! Audit recorder.
//!
//! Appends one immutable entry per mutating operation. No update or
//! delete is exposed; history for a ticket is read back newest-first
//! from the store. A failed append is fatal to the enclosing operation:
//! an untracked state change is a correctness violation, so the error is
//! surfaced instead of retried silently.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::shared::error::DeskError;
use crate::shared::models::{AuditAction, AuditLogEntry};
use crate::store::DeskStore;

#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn DeskStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn DeskStore>) -> Self {
        Self { store }
    }

    /// Records one entry for a logical event that happened at `at`.
    ///
    /// The entry id is derived deterministically from the event itself
    /// (ticket, action, details, timestamp), so an at-least-once retry of
    /// the same logical event maps to the same id and the store keeps a
    /// single entry.
    pub async fn record(
        &self,
        ticket_id: Uuid,
        actor_id: Option<Uuid>,
        action: AuditAction,
        details: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<AuditLogEntry, DeskError> {
        let details = details.into();
        let entry = AuditLogEntry {
            id: event_id(ticket_id, action, &details, at),
            ticket_id,
            actor_id,
            action,
            details,
            created_at: at,
        };

        let inserted = self
            .store
            .insert_audit(entry.clone())
            .await
            .map_err(|e| DeskError::AuditFailed(e.to_string()))?;
        if !inserted {
            tracing::debug!(ticket_id = %ticket_id, action = action.as_str(),
                "audit entry already recorded, skipping duplicate");
        }
        Ok(entry)
    }

    pub async fn history(&self, ticket_id: Uuid) -> Result<Vec<AuditLogEntry>, DeskError> {
        self.store.list_audit(ticket_id).await
    }
}

/// Deterministic id per logical event, namespaced by the ticket.
fn event_id(ticket_id: Uuid, action: AuditAction, details: &str, at: DateTime<Utc>) -> Uuid {
    let name = format!("{}|{}|{}", action.as_str(), details, at.timestamp_micros());
    Uuid::new_v5(&ticket_id, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::MemoryStore;
    use crate::sync::SyncBridge;

    fn recorder() -> AuditRecorder {
        AuditRecorder::new(Arc::new(MemoryStore::new(SyncBridge::new())))
    }

    #[tokio::test]
    async fn retrying_the_same_logical_event_records_one_entry() {
        let recorder = recorder();
        let ticket_id = Uuid::new_v4();
        let at = Utc::now();

        let first = recorder
            .record(ticket_id, None, AuditAction::Created, "Ticket created", at)
            .await
            .unwrap();
        let second = recorder
            .record(ticket_id, None, AuditAction::Created, "Ticket created", at)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(recorder.history(ticket_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_events_get_distinct_ids() {
        let recorder = recorder();
        let ticket_id = Uuid::new_v4();
        let at = Utc::now();

        recorder
            .record(ticket_id, None, AuditAction::Created, "Ticket created", at)
            .await
            .unwrap();
        recorder
            .record(
                ticket_id,
                None,
                AuditAction::StatusChange,
                "Status changed to RESOLVED",
                at,
            )
            .await
            .unwrap();

        assert_eq!(recorder.history(ticket_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let recorder = recorder();
        let ticket_id = Uuid::new_v4();
        let base = Utc::now();

        recorder
            .record(ticket_id, None, AuditAction::Created, "Ticket created", base)
            .await
            .unwrap();
        recorder
            .record(
                ticket_id,
                None,
                AuditAction::Edited,
                "Ticket details edited",
                base + chrono::Duration::seconds(5),
            )
            .await
            .unwrap();

        let history = recorder.history(ticket_id).await.unwrap();
        assert_eq!(history[0].action, AuditAction::Edited);
        assert_eq!(history[1].action, AuditAction::Created);
    }

    #[test]
    fn event_id_is_stable_per_event() {
        let ticket = Uuid::new_v4();
        let at = Utc::now();
        let a = event_id(ticket, AuditAction::Edited, "Ticket details edited", at);
        let b = event_id(ticket, AuditAction::Edited, "Ticket details edited", at);
        let c = event_id(ticket, AuditAction::Edited, "other", at);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
