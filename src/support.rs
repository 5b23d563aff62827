//! IT support ticket workflow and remote-session rules.

use chrono::NaiveDateTime;

use crate::models::enums::TicketStatus;
use crate::models::SupportTicket;
use crate::workflow::TransitionError;

/// Move a ticket to `to`.
///
/// `closed` is terminal, a resolved ticket can only be closed or reopened,
/// and `in_progress` needs an assignee. Resolving stamps `resolved_at`;
/// reopening clears it.
pub fn transition_ticket(
    ticket: &mut SupportTicket,
    to: TicketStatus,
    now: NaiveDateTime,
) -> Result<(), TransitionError> {
    use TicketStatus::*;

    let from = ticket.status;
    let allowed = match from {
        Closed => false,
        Resolved => matches!(to, Closed | Open),
        Open | InProgress | WaitingOnUser => matches!(to, Open | InProgress | WaitingOnUser | Resolved),
    };
    if !allowed || from == to {
        return Err(TransitionError::invalid("ticket", from, to));
    }
    if to == InProgress && ticket.assignee.is_none() {
        return Err(TransitionError::InvalidInput(
            "assign the ticket before starting work".into(),
        ));
    }

    ticket.status = to;
    match to {
        Resolved => ticket.resolved_at = Some(now),
        Open => ticket.resolved_at = None,
        _ => {}
    }
    ticket.updated_at = now;
    Ok(())
}

pub fn assign_ticket(ticket: &mut SupportTicket, assignee: &str, now: NaiveDateTime) -> Result<(), TransitionError> {
    if ticket.status == TicketStatus::Closed {
        return Err(TransitionError::Rejected("closed tickets cannot be reassigned".into()));
    }
    let assignee = assignee.trim();
    if assignee.is_empty() {
        return Err(TransitionError::InvalidInput("assignee is required".into()));
    }
    ticket.assignee = Some(assignee.to_string());
    ticket.updated_at = now;
    Ok(())
}

/// Remote sessions are only opened on tickets still being worked.
pub fn ensure_session_allowed(ticket: &SupportTicket) -> Result<(), TransitionError> {
    if matches!(ticket.status, TicketStatus::Resolved | TicketStatus::Closed) {
        return Err(TransitionError::Rejected(format!(
            "cannot start a remote session on a {} ticket",
            ticket.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{TicketCategory, TicketPriority};
    use uuid::Uuid;

    fn ticket() -> SupportTicket {
        let now = crate::db::now();
        SupportTicket {
            id: Uuid::new_v4(),
            title: "Printer jam".into(),
            description: "Front desk printer".into(),
            category: TicketCategory::Printer,
            priority: TicketPriority::Medium,
            status: TicketStatus::Open,
            requester: "front.desk".into(),
            assignee: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    #[test]
    fn in_progress_requires_assignee() {
        let now = crate::db::now();
        let mut t = ticket();
        let err = transition_ticket(&mut t, TicketStatus::InProgress, now).unwrap_err();
        assert!(matches!(err, TransitionError::InvalidInput(_)));

        assign_ticket(&mut t, "it.sam", now).unwrap();
        transition_ticket(&mut t, TicketStatus::InProgress, now).unwrap();
        assert_eq!(t.status, TicketStatus::InProgress);
    }

    #[test]
    fn resolve_reopen_close() {
        let now = crate::db::now();
        let mut t = ticket();
        transition_ticket(&mut t, TicketStatus::Resolved, now).unwrap();
        assert_eq!(t.resolved_at, Some(now));
        assert!(transition_ticket(&mut t, TicketStatus::WaitingOnUser, now).is_err());

        transition_ticket(&mut t, TicketStatus::Open, now).unwrap();
        assert!(t.resolved_at.is_none());

        transition_ticket(&mut t, TicketStatus::Resolved, now).unwrap();
        transition_ticket(&mut t, TicketStatus::Closed, now).unwrap();
        for to in [TicketStatus::Open, TicketStatus::Resolved, TicketStatus::InProgress] {
            assert!(transition_ticket(&mut t, to, now).is_err());
        }
        assert!(assign_ticket(&mut t, "it.sam", now).is_err());
    }

    #[test]
    fn open_ticket_cannot_close_directly() {
        let mut t = ticket();
        assert!(transition_ticket(&mut t, TicketStatus::Closed, crate::db::now()).is_err());
    }

    #[test]
    fn sessions_blocked_on_finished_tickets() {
        let now = crate::db::now();
        let mut t = ticket();
        assert!(ensure_session_allowed(&t).is_ok());
        transition_ticket(&mut t, TicketStatus::Resolved, now).unwrap();
        assert!(ensure_session_allowed(&t).is_err());
    }
}
