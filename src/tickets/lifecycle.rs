//! Lifecycle state machine.
//!
//! Pure function of (current ticket, requested status, now). Any declared
//! status is reachable directly from any other; there is no forced linear
//! progression and therefore no reject path for a valid enum value.
//! Authorization is the caller's job.

use chrono::{DateTime, Utc};

use crate::shared::models::{Ticket, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub status: TicketStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    pub details: String,
}

/// Derives the field changes for a status transition. Entering RESOLVED
/// or CLOSED stamps the resolution time; any other target clears it, so
/// `resolved_at` is set exactly when the status is terminal.
pub fn transition(_ticket: &Ticket, requested: TicketStatus, now: DateTime<Utc>) -> Transition {
    let resolved_at = if requested.is_terminal() {
        Some(now)
    } else {
        None
    };
    Transition {
        status: requested,
        resolved_at,
        details: format!("Status changed to {}", requested.as_str()),
    }
}

pub fn apply(ticket: &mut Ticket, change: &Transition, now: DateTime<Utc>) {
    ticket.status = change.status;
    ticket.resolved_at = change.resolved_at;
    ticket.updated_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    use crate::shared::models::TicketPriority;

    fn ticket(status: TicketStatus, resolved_at: Option<DateTime<Utc>>) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: Uuid::new_v4(),
            ticket_number: 7,
            title: "VPN down".to_string(),
            description: "no connection".to_string(),
            requester_id: Uuid::new_v4(),
            requester_name: "Ana".to_string(),
            priority: TicketPriority::High,
            status,
            category: "Network".to_string(),
            created_at: now,
            updated_at: now,
            resolved_at,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn resolved_at_set_iff_terminal() {
        let now = Utc::now();
        for (from, to) in [
            (TicketStatus::Open, TicketStatus::Resolved),
            (TicketStatus::InProgress, TicketStatus::Closed),
            (TicketStatus::Open, TicketStatus::Closed),
        ] {
            let change = transition(&ticket(from, None), to, now);
            assert_eq!(change.resolved_at, Some(now));
        }
        for (from, to) in [
            (TicketStatus::Resolved, TicketStatus::Open),
            (TicketStatus::Closed, TicketStatus::InProgress),
            (TicketStatus::Open, TicketStatus::InProgress),
        ] {
            let change = transition(&ticket(from, Some(now)), to, now);
            assert_eq!(change.resolved_at, None);
        }
    }

    #[test]
    fn reopen_clears_resolution_time() {
        let resolved_at = Utc::now();
        let t = ticket(TicketStatus::Resolved, Some(resolved_at));
        let change = transition(&t, TicketStatus::Open, resolved_at + Duration::hours(1));
        assert_eq!(change.status, TicketStatus::Open);
        assert!(change.resolved_at.is_none());
    }

    #[test]
    fn closing_a_resolved_ticket_restamps_resolution_time() {
        let resolved_at = Utc::now();
        let t = ticket(TicketStatus::Resolved, Some(resolved_at));
        let later = resolved_at + Duration::hours(2);
        let change = transition(&t, TicketStatus::Closed, later);
        assert_eq!(change.resolved_at, Some(later));
    }

    #[test]
    fn every_status_reachable_from_every_other() {
        let all = [
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::Resolved,
            TicketStatus::Closed,
        ];
        let now = Utc::now();
        for from in all {
            for to in all {
                let change = transition(&ticket(from, None), to, now);
                assert_eq!(change.status, to);
                assert_eq!(change.resolved_at.is_some(), to.is_terminal());
            }
        }
    }

    #[test]
    fn details_describe_the_new_status() {
        let change = transition(
            &ticket(TicketStatus::Open, None),
            TicketStatus::InProgress,
            Utc::now(),
        );
        assert_eq!(change.details, "Status changed to IN_PROGRESS");
    }

    #[test]
    fn apply_touches_updated_at() {
        let mut t = ticket(TicketStatus::Open, None);
        let now = Utc::now() + Duration::minutes(5);
        let change = transition(&t, TicketStatus::Resolved, now);
        apply(&mut t, &change, now);
        assert_eq!(t.status, TicketStatus::Resolved);
        assert_eq!(t.resolved_at, Some(now));
        assert_eq!(t.updated_at, now);
    }
}
