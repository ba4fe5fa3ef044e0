//! Realtime sync bridge.
//!
//! Every store mutation publishes a typed [`ChangeEvent`] on a broadcast
//! channel. Connected clients subscribe with an [`EventFilter`] scoped to
//! an entity class and an optional ticket/user predicate, and react by
//! refetching the affected collection wholesale rather than patching it
//! incrementally. A [`Watcher`] coalesces bursts of matching events into
//! a single refetch tick.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Profiles,
    Tickets,
    Comments,
    AuditLogs,
    Notifications,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// Change notification as delivered by the store layer. Delivery is
/// at-least-once; consumers refetch, so duplicates are harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub op: ChangeOp,
    pub row_id: Uuid,
    pub ticket_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Subscription predicate: entity class plus optional equality filters,
/// mirroring `ticket_id=eq.<id>` / `user_id=eq.<self>` channel scoping.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    pub entity: EntityKind,
    pub ticket_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

impl EventFilter {
    pub fn entity(entity: EntityKind) -> Self {
        Self {
            entity,
            ticket_id: None,
            user_id: None,
        }
    }

    pub fn for_ticket(entity: EntityKind, ticket_id: Uuid) -> Self {
        Self {
            entity,
            ticket_id: Some(ticket_id),
            user_id: None,
        }
    }

    pub fn for_user(entity: EntityKind, user_id: Uuid) -> Self {
        Self {
            entity,
            ticket_id: None,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.entity != self.entity {
            return false;
        }
        if let Some(ticket_id) = self.ticket_id {
            if event.ticket_id != Some(ticket_id) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if event.user_id != Some(user_id) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone)]
pub struct SyncBridge {
    tx: broadcast::Sender<ChangeEvent>,
}

impl SyncBridge {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Lagging or absent receivers are not an error: change events exist
    /// only to trigger refetches, and a refetch always reads fresh state.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Spawns a watcher that listens for events matching `filter` and
    /// emits one refetch tick per burst. Events arriving within
    /// `debounce` of each other coalesce into a single tick.
    pub fn watch(&self, filter: EventFilter, debounce: Duration) -> Watcher {
        let mut rx = self.tx.subscribe();
        let (tick_tx, tick_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if filter.matches(&event) => {
                        // Drain the burst: events inside the window fold
                        // into the tick that follows it.
                        let deadline = tokio::time::Instant::now() + debounce;
                        loop {
                            tokio::select! {
                                _ = tokio::time::sleep_until(deadline) => break,
                                next = rx.recv() => match next {
                                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                                    Err(broadcast::error::RecvError::Closed) => {
                                        let _ = tick_tx.send(()).await;
                                        return;
                                    }
                                },
                            }
                        }
                        if tick_tx.send(()).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed events are recovered by the next refetch.
                        tracing::debug!(skipped, "sync watcher lagged, forcing refetch");
                        if tick_tx.send(()).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Watcher {
            ticks: tick_rx,
            handle,
        }
    }
}

impl Default for SyncBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one live subscription. Each received tick means "the
/// watched collection changed, refetch it". Dropping the watcher
/// unsubscribes; sign-out is implemented by dropping every watcher a
/// client holds.
pub struct Watcher {
    ticks: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

impl Watcher {
    pub async fn changed(&mut self) -> Option<()> {
        self.ticks.recv().await
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
