//! Ticket store adapter.
//!
//! Every core component reads and writes through [`DeskStore`]; nothing
//! bypasses it. The trait models the remote store's contract: keyed CRUD
//! with equality filters and time ordering, duplicate-key conflicts on
//! profile insert, id-based de-duplication on audit insert, and a change
//! event published for every successful mutation. Persistence schema is
//! the adapter's concern, not the core's.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::shared::error::DeskError;
use crate::shared::models::{AuditLogEntry, Comment, Notification, Ticket, User};

pub use memory::MemoryStore;

#[async_trait]
pub trait DeskStore: Send + Sync {
    // ----- profiles -----

    /// A miss is not an error; it drives the self-healing path.
    async fn get_profile(&self, id: Uuid) -> Result<Option<User>, DeskError>;

    /// Fails with [`DeskError::Conflict`] if a profile with the same id
    /// already exists, so racing first-contacts can re-read instead of
    /// propagating the failure.
    async fn insert_profile(&self, user: User) -> Result<(), DeskError>;

    async fn update_profile(&self, user: User) -> Result<(), DeskError>;

    async fn list_profiles(&self) -> Result<Vec<User>, DeskError>;

    // ----- tickets -----

    /// Assigns the sequential ticket number; the caller-provided value is
    /// ignored.
    async fn insert_ticket(&self, ticket: Ticket) -> Result<Ticket, DeskError>;

    async fn get_ticket(&self, id: Uuid) -> Result<Option<Ticket>, DeskError>;

    async fn update_ticket(&self, ticket: Ticket) -> Result<(), DeskError>;

    /// Cascades to the ticket's comments, audit entries, and
    /// notifications.
    async fn delete_ticket(&self, id: Uuid) -> Result<(), DeskError>;

    /// Newest first.
    async fn list_tickets(&self) -> Result<Vec<Ticket>, DeskError>;

    // ----- comments -----

    async fn insert_comment(&self, comment: Comment) -> Result<(), DeskError>;

    /// Oldest first (conversation order).
    async fn list_comments(&self, ticket_id: Uuid) -> Result<Vec<Comment>, DeskError>;

    // ----- audit log -----

    /// Append-only. Returns `false` without writing when an entry with
    /// the same id already exists, which makes at-least-once retries of
    /// the same logical event record exactly one entry.
    async fn insert_audit(&self, entry: AuditLogEntry) -> Result<bool, DeskError>;

    /// Newest first.
    async fn list_audit(&self, ticket_id: Uuid) -> Result<Vec<AuditLogEntry>, DeskError>;

    // ----- notifications -----

    async fn insert_notifications(
        &self,
        batch: Vec<Notification>,
    ) -> Result<(), DeskError>;

    /// Newest first, scoped to the recipient.
    async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, DeskError>;

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<(), DeskError>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<(), DeskError>;

    async fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<(), DeskError>;
}
