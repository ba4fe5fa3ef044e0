//! Visibility and action-level authorization, defined once.
//!
//! Admins see and may act on every ticket. A regular user sees exactly
//! the tickets they requested, may edit or delete their own ticket until
//! it is closed, and may never change status. Owner rights end at
//! CLOSED so a closed ticket is an immutable record of what support
//! actually handled.

use crate::shared::models::{Ticket, TicketStatus, User};

pub fn can_view(ticket: &Ticket, user: &User) -> bool {
    user.is_admin() || ticket.requester_id == user.id
}

pub fn can_edit(ticket: &Ticket, user: &User) -> bool {
    if user.is_admin() {
        return true;
    }
    ticket.requester_id == user.id && ticket.status != TicketStatus::Closed
}

pub fn can_delete(ticket: &Ticket, user: &User) -> bool {
    can_edit(ticket, user)
}

/// Status transitions are staff-only regardless of ownership.
pub fn can_transition(user: &User) -> bool {
    user.is_admin()
}

pub fn visible(tickets: Vec<Ticket>, user: &User) -> Vec<Ticket> {
    if user.is_admin() {
        return tickets;
    }
    tickets
        .into_iter()
        .filter(|t| t.requester_id == user.id)
        .collect()
}
