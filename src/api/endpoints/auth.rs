//! Staff token endpoints.
//!
//! `POST /api/auth/tokens`: admin issues a token for a staff member
//! `POST /api/auth/tokens/:id/revoke`: admin revokes a token

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::common::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{generate_token, hash_token, ApiContext, StaffContext};
use crate::db::repository::{find_active_token, insert_staff_token, revoke_staff_token};
use crate::db::DatabaseError;
use crate::models::enums::StaffRole;
use crate::models::StaffToken;
use crate::validation;

#[derive(Deserialize)]
pub struct IssueTokenRequest {
    #[serde(default)]
    pub staff_name: String,
    pub role: StaffRole,
}

/// The plain token is returned exactly once, here.
#[derive(Serialize)]
pub struct IssuedToken {
    pub id: Uuid,
    pub staff_name: String,
    pub role: StaffRole,
    pub token: String,
}

fn require_admin(staff: &StaffContext) -> Result<(), ApiError> {
    if staff.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin role required".into()))
    }
}

/// `POST /api/auth/tokens`
pub async fn issue(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<IssueTokenRequest>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    require_admin(&staff)?;
    let staff_name = validation::required("staff_name", &request.staff_name)?;

    let token = generate_token();
    let record = StaffToken {
        id: Uuid::new_v4(),
        staff_name,
        role: request.role,
        token_hash: hash_token(&token),
        created_at: crate::db::now(),
        revoked: false,
    };

    let conn = ctx.core.open_db()?;
    insert_staff_token(&conn, &record)?;
    tracing::info!(token_id = %record.id, role = %record.role, issued_by = %staff.staff_name, "Issued staff token");

    Ok((
        StatusCode::CREATED,
        Json(IssuedToken {
            id: record.id,
            staff_name: record.staff_name,
            role: record.role,
            token,
        }),
    ))
}

/// `POST /api/auth/tokens/:id/revoke`
pub async fn revoke(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    require_admin(&staff)?;
    let id = parse_id(&id, "token id")?;
    let conn = ctx.core.open_db()?;
    if !revoke_staff_token(&conn, &id)? {
        return Err(ApiError::NotFound(format!("token {id}")));
    }
    tracing::info!(token_id = %id, revoked_by = %staff.staff_name, "Revoked staff token");
    Ok(StatusCode::NO_CONTENT)
}

/// Store the configured bootstrap admin token unless it is already known.
/// Returns `true` when a new row was written.
pub fn seed_bootstrap_token(conn: &Connection, token: &str) -> Result<bool, DatabaseError> {
    let token_hash = hash_token(token.trim());
    if find_active_token(conn, &token_hash)?.is_some() {
        return Ok(false);
    }
    insert_staff_token(
        conn,
        &StaffToken {
            id: Uuid::new_v4(),
            staff_name: "bootstrap".into(),
            role: StaffRole::Admin,
            token_hash,
            created_at: crate::db::now(),
            revoked: false,
        },
    )?;
    Ok(true)
}
