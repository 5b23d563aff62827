//! IT support endpoints: tickets and remote sessions.
//!
//! - `GET /api/support/tickets?status&category&priority` / `POST`
//! - `GET /api/support/tickets/:id`: ticket with its sessions
//! - `PUT /api/support/tickets/:id/status`
//! - `PUT /api/support/tickets/:id/assign`
//! - `GET /api/support/tickets/:id/sessions` / `POST`
//! - `POST /api/support/sessions/:id/end`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::common::{non_blank, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::models::enums::{TicketCategory, TicketPriority, TicketStatus};
use crate::models::{RemoteSession, SupportTicket, TicketFilter};
use crate::support;
use crate::validation;

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    /// Defaults to the caller.
    pub requester: Option<String>,
}

#[derive(Deserialize)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub assignee: String,
}

#[derive(Deserialize, Default)]
pub struct SessionNotes {
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub ticket: SupportTicket,
    pub sessions: Vec<RemoteSession>,
}

fn load_ticket(conn: &Connection, raw_id: &str) -> Result<SupportTicket, ApiError> {
    let id = parse_id(raw_id, "ticket id")?;
    repository::get_ticket(conn, &id)?.ok_or_else(|| DatabaseError::not_found("ticket", id).into())
}

/// `GET /api/support/tickets`
pub async fn tickets(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<Vec<SupportTicket>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_tickets(&conn, &filter)?))
}

/// `POST /api/support/tickets`
pub async fn create_ticket(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<SupportTicket>), ApiError> {
    let now = crate::db::now();
    let ticket = SupportTicket {
        id: Uuid::new_v4(),
        title: validation::required("title", &request.title)?,
        description: validation::required("description", &request.description)?,
        category: request.category,
        priority: request.priority,
        status: TicketStatus::Open,
        requester: non_blank(request.requester).unwrap_or_else(|| staff.staff_name.clone()),
        assignee: None,
        created_at: now,
        updated_at: now,
        resolved_at: None,
    };
    let conn = ctx.core.open_db()?;
    repository::insert_ticket(&conn, &ticket)?;
    tracing::info!(ticket_id = %ticket.id, priority = %ticket.priority, "Support ticket opened");
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// `GET /api/support/tickets/:id`
pub async fn ticket_detail(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<TicketDetail>, ApiError> {
    let conn = ctx.core.open_db()?;
    let ticket = load_ticket(&conn, &id)?;
    let sessions = repository::list_remote_sessions(&conn, &ticket.id)?;
    Ok(Json(TicketDetail { ticket, sessions }))
}

/// `PUT /api/support/tickets/:id/status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<TicketStatusRequest>,
) -> Result<Json<SupportTicket>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut ticket = load_ticket(&conn, &id)?;
    let previous = ticket.status;
    support::transition_ticket(&mut ticket, request.status, crate::db::now())?;
    repository::update_ticket(&conn, &ticket, previous)?;
    Ok(Json(ticket))
}

/// `PUT /api/support/tickets/:id/assign`
pub async fn assign(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<SupportTicket>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut ticket = load_ticket(&conn, &id)?;
    let previous = ticket.status;
    support::assign_ticket(&mut ticket, &request.assignee, crate::db::now())?;
    repository::update_ticket(&conn, &ticket, previous)?;
    Ok(Json(ticket))
}

/// `GET /api/support/tickets/:id/sessions`
pub async fn sessions(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RemoteSession>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let ticket = load_ticket(&conn, &id)?;
    Ok(Json(repository::list_remote_sessions(&conn, &ticket.id)?))
}

/// `POST /api/support/tickets/:id/sessions`: the caller is the technician.
pub async fn start_session(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    request: Option<Json<SessionNotes>>,
) -> Result<(StatusCode, Json<RemoteSession>), ApiError> {
    let conn = ctx.core.open_db()?;
    let ticket = load_ticket(&conn, &id)?;
    support::ensure_session_allowed(&ticket)?;
    if let Some(open) = repository::get_open_session(&conn, &ticket.id)? {
        return Err(ApiError::Conflict(format!(
            "remote session {} is already open on this ticket",
            open.id
        )));
    }

    let session = RemoteSession {
        id: Uuid::new_v4(),
        ticket_id: ticket.id,
        technician: staff.staff_name.clone(),
        started_at: crate::db::now(),
        ended_at: None,
        notes: request.and_then(|Json(r)| non_blank(r.notes)),
    };
    repository::insert_remote_session(&conn, &session)?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /api/support/sessions/:id/end`
pub async fn end_session(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    request: Option<Json<SessionNotes>>,
) -> Result<Json<RemoteSession>, ApiError> {
    let id = parse_id(&id, "session id")?;
    let conn = ctx.core.open_db()?;
    let mut session = repository::get_remote_session(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("remote session", id))?;
    if session.ended_at.is_some() {
        return Err(ApiError::Conflict("remote session already ended".into()));
    }
    session.ended_at = Some(crate::db::now());
    if let Some(notes) = request.and_then(|Json(r)| non_blank(r.notes)) {
        session.notes = Some(notes);
    }
    repository::end_remote_session(&conn, &session)?;
    Ok(Json(session))
}
