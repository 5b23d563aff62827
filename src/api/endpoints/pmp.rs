//! Prescription monitoring program (PMP) query log.
//!
//! - `GET /api/pmp/checks?patient_id` / `POST /api/pmp/checks`
//! - `GET /api/pmp/overdue?days`: active patients due for a new query

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::non_blank;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::repository;
use crate::models::{PmpCheck, PmpOverdueEntry};
use crate::pmp;
use crate::validation;

#[derive(Deserialize)]
pub struct RecordCheckRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub state: String,
    pub prescriptions_found: i32,
    pub distinct_prescribers: i32,
    pub distinct_pharmacies: i32,
    #[serde(default)]
    pub overlapping_controlled: i32,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckQuery {
    pub patient_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct OverdueQuery {
    pub days: Option<i64>,
}

pub async fn checks(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<CheckQuery>,
) -> Result<Json<Vec<PmpCheck>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_pmp_checks(&conn, query.patient_id.as_ref())?))
}

/// `POST /api/pmp/checks`: store a query result with its derived risk flag.
pub async fn record_check(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<RecordCheckRequest>,
) -> Result<(StatusCode, Json<PmpCheck>), ApiError> {
    let state = validation::required("state", &request.state)?.to_uppercase();
    validation::state_code("state", &state)?;
    validation::non_negative("prescriptions_found", request.prescriptions_found as i64)?;
    validation::non_negative("distinct_prescribers", request.distinct_prescribers as i64)?;
    validation::non_negative("distinct_pharmacies", request.distinct_pharmacies as i64)?;
    validation::non_negative("overlapping_controlled", request.overlapping_controlled as i64)?;

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let check = PmpCheck {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        state,
        checked_by: staff.staff_name.clone(),
        checked_at: crate::db::now(),
        prescriptions_found: request.prescriptions_found,
        distinct_prescribers: request.distinct_prescribers,
        distinct_pharmacies: request.distinct_pharmacies,
        overlapping_controlled: request.overlapping_controlled,
        risk_flag: pmp::risk_flag(
            request.distinct_prescribers,
            request.distinct_pharmacies,
            request.overlapping_controlled,
        ),
        notes: non_blank(request.notes),
    };
    repository::insert_pmp_check(&conn, &check)?;

    tracing::info!(patient_id = %check.patient_id, risk = check.risk_flag.as_str(), "PMP check recorded");
    Ok((StatusCode::CREATED, Json(check)))
}

/// `GET /api/pmp/overdue`
pub async fn overdue(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<OverdueQuery>,
) -> Result<Json<Vec<PmpOverdueEntry>>, ApiError> {
    let cutoff = pmp::overdue_cutoff(crate::db::now(), query.days)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_pmp_overdue(&conn, cutoff)?))
}
