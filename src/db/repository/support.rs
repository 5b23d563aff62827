use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{TicketCategory, TicketPriority, TicketStatus};
use crate::models::{RemoteSession, SupportTicket, TicketFilter};

use super::{fmt_datetime, guarded_update_miss, parse_datetime, parse_opt_datetime, parse_uuid};

const TICKET_COLUMNS: &str = "id, title, description, category, priority, status, requester,
     assignee, created_at, updated_at, resolved_at";

pub fn insert_ticket(conn: &Connection, ticket: &SupportTicket) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO support_tickets (id, title, description, category, priority, status,
         requester, assignee, created_at, updated_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            ticket.id.to_string(),
            ticket.title,
            ticket.description,
            ticket.category.as_str(),
            ticket.priority.as_str(),
            ticket.status.as_str(),
            ticket.requester,
            ticket.assignee,
            fmt_datetime(&ticket.created_at),
            fmt_datetime(&ticket.updated_at),
            ticket.resolved_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

/// Persist status, assignee and resolution stamp of a ticket that is still
/// in `previous`.
pub fn update_ticket(conn: &Connection, ticket: &SupportTicket, previous: TicketStatus) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE support_tickets SET status = ?1, assignee = ?2, updated_at = ?3, resolved_at = ?4
         WHERE id = ?5 AND status = ?6",
        params![
            ticket.status.as_str(),
            ticket.assignee,
            fmt_datetime(&ticket.updated_at),
            ticket.resolved_at.as_ref().map(fmt_datetime),
            ticket.id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(conn, "support_tickets", "support_ticket", &ticket.id, previous.as_str()));
    }
    Ok(())
}

pub fn get_ticket(conn: &Connection, id: &Uuid) -> Result<Option<SupportTicket>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {TICKET_COLUMNS} FROM support_tickets WHERE id = ?1"),
            params![id.to_string()],
            ticket_row,
        )
        .optional()?;
    row.map(ticket_from_row).transpose()
}

/// Tickets ordered urgent-first, then oldest first within a priority.
pub fn list_tickets(conn: &Connection, filter: &TicketFilter) -> Result<Vec<SupportTicket>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TICKET_COLUMNS} FROM support_tickets
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR category = ?2)
           AND (?3 IS NULL OR priority = ?3)
         ORDER BY CASE priority
                    WHEN 'urgent' THEN 0 WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2 ELSE 3 END,
                  created_at"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.status.map(|s| s.as_str()),
            filter.category.map(|c| c.as_str()),
            filter.priority.map(|p| p.as_str()),
        ],
        ticket_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(ticket_from_row(row?)?);
    }
    Ok(out)
}

// ── Remote sessions ────────────────────────────────────────

pub fn insert_remote_session(conn: &Connection, session: &RemoteSession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO remote_sessions (id, ticket_id, technician, started_at, ended_at, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.id.to_string(),
            session.ticket_id.to_string(),
            session.technician,
            fmt_datetime(&session.started_at),
            session.ended_at.as_ref().map(fmt_datetime),
            session.notes,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation("ticket already has an open remote session".into())
        }
        other => DatabaseError::Sqlite(other),
    })?;
    Ok(())
}

pub fn get_remote_session(conn: &Connection, id: &Uuid) -> Result<Option<RemoteSession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, ticket_id, technician, started_at, ended_at, notes
             FROM remote_sessions WHERE id = ?1",
            params![id.to_string()],
            session_row,
        )
        .optional()?;
    row.map(session_from_row).transpose()
}

pub fn get_open_session(conn: &Connection, ticket_id: &Uuid) -> Result<Option<RemoteSession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, ticket_id, technician, started_at, ended_at, notes
             FROM remote_sessions WHERE ticket_id = ?1 AND ended_at IS NULL",
            params![ticket_id.to_string()],
            session_row,
        )
        .optional()?;
    row.map(session_from_row).transpose()
}

pub fn list_remote_sessions(conn: &Connection, ticket_id: &Uuid) -> Result<Vec<RemoteSession>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticket_id, technician, started_at, ended_at, notes
         FROM remote_sessions WHERE ticket_id = ?1 ORDER BY started_at",
    )?;
    let rows = stmt.query_map(params![ticket_id.to_string()], session_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(session_from_row(row?)?);
    }
    Ok(out)
}

pub fn end_remote_session(conn: &Connection, session: &RemoteSession) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE remote_sessions SET ended_at = ?1, notes = ?2 WHERE id = ?3 AND ended_at IS NULL",
        params![
            session.ended_at.as_ref().map(fmt_datetime),
            session.notes,
            session.id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(conn, "remote_sessions", "remote_session", &session.id, "open"));
    }
    Ok(())
}

struct TicketRow {
    id: String,
    title: String,
    description: String,
    category: String,
    priority: String,
    status: String,
    requester: String,
    assignee: Option<String>,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

fn ticket_row(row: &Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        priority: row.get(4)?,
        status: row.get(5)?,
        requester: row.get(6)?,
        assignee: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        resolved_at: row.get(10)?,
    })
}

fn ticket_from_row(row: TicketRow) -> Result<SupportTicket, DatabaseError> {
    Ok(SupportTicket {
        id: parse_uuid(&row.id)?,
        title: row.title,
        description: row.description,
        category: TicketCategory::from_str(&row.category)?,
        priority: TicketPriority::from_str(&row.priority)?,
        status: TicketStatus::from_str(&row.status)?,
        requester: row.requester,
        assignee: row.assignee,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
        resolved_at: parse_opt_datetime(row.resolved_at)?,
    })
}

type SessionRow = (String, String, String, String, Option<String>, Option<String>);

fn session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

fn session_from_row(row: SessionRow) -> Result<RemoteSession, DatabaseError> {
    let (id, ticket_id, technician, started_at, ended_at, notes) = row;
    Ok(RemoteSession {
        id: parse_uuid(&id)?,
        ticket_id: parse_uuid(&ticket_id)?,
        technician,
        started_at: parse_datetime(&started_at)?,
        ended_at: parse_opt_datetime(ended_at)?,
        notes,
    })
}
