//! Dual-eligible claim endpoints.
//!
//! - `GET /api/dual-eligible/claims?patient_id&status` / `POST`
//! - `POST /api/dual-eligible/claims/:id/medicare`: Medicare adjudication
//! - `POST /api/dual-eligible/claims/:id/medicaid-submit`: crossover to Medicaid
//! - `POST /api/dual-eligible/claims/:id/medicaid`: Medicaid payment
//! - `POST /api/dual-eligible/claims/:id/deny`: payer denial

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::dual_eligible;
use crate::eligibility;
use crate::models::enums::DualClaimStatus;
use crate::models::DualEligibleClaim;
use crate::validation;

#[derive(Deserialize)]
pub struct ClaimQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<DualClaimStatus>,
}

#[derive(Deserialize)]
pub struct CreateClaimRequest {
    pub patient_id: Uuid,
    pub service_date: NaiveDate,
    #[serde(default)]
    pub service_code: String,
    pub billed_cents: i64,
}

#[derive(Deserialize)]
pub struct MedicareRequest {
    pub allowed_cents: i64,
    pub paid_cents: i64,
}

#[derive(Deserialize)]
pub struct MedicaidRequest {
    pub paid_cents: i64,
}

fn load_claim(conn: &Connection, raw_id: &str) -> Result<DualEligibleClaim, ApiError> {
    let id = parse_id(raw_id, "claim id")?;
    repository::get_dual_claim(conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("dual-eligible claim", id).into())
}

/// `GET /api/dual-eligible/claims`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<ClaimQuery>,
) -> Result<Json<Vec<DualEligibleClaim>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_dual_claims(
        &conn,
        query.patient_id.as_ref(),
        query.status,
    )?))
}

/// `POST /api/dual-eligible/claims`: requires dual eligibility on the service date.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<DualEligibleClaim>), ApiError> {
    let service_code = validation::required("service_code", &request.service_code)?.to_uppercase();
    validation::procedure_code("service_code", &service_code)?;
    if request.billed_cents <= 0 {
        return Err(ApiError::BadRequest("billed_cents must be positive".into()));
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;
    let policies = repository::list_policies_for_patient(&conn, &request.patient_id)?;
    if !eligibility::is_dual_eligible(&policies, request.service_date) {
        return Err(ApiError::Conflict(format!(
            "patient is not dual eligible on {}",
            request.service_date
        )));
    }

    let now = crate::db::now();
    let claim = DualEligibleClaim {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        service_date: request.service_date,
        service_code,
        billed_cents: request.billed_cents,
        status: DualClaimStatus::PendingMedicare,
        medicare_allowed_cents: None,
        medicare_paid_cents: None,
        medicaid_paid_cents: None,
        patient_responsibility_cents: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_dual_claim(&conn, &claim)?;
    tracing::info!(claim_id = %claim.id, created_by = %staff.staff_name, "Dual-eligible claim created");

    Ok((StatusCode::CREATED, Json(claim)))
}

/// `POST /api/dual-eligible/claims/:id/medicare`
pub async fn record_medicare(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<MedicareRequest>,
) -> Result<Json<DualEligibleClaim>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut claim = load_claim(&conn, &id)?;
    let previous = claim.status;
    dual_eligible::record_medicare_adjudication(
        &mut claim,
        request.allowed_cents,
        request.paid_cents,
        crate::db::now(),
    )?;
    repository::update_dual_claim(&conn, &claim, previous)?;
    Ok(Json(claim))
}

/// `POST /api/dual-eligible/claims/:id/medicaid-submit`
pub async fn submit_medicaid(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<DualEligibleClaim>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut claim = load_claim(&conn, &id)?;
    let previous = claim.status;
    dual_eligible::submit_to_medicaid(&mut claim, crate::db::now())?;
    repository::update_dual_claim(&conn, &claim, previous)?;
    Ok(Json(claim))
}

/// `POST /api/dual-eligible/claims/:id/medicaid`
pub async fn record_medicaid(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<MedicaidRequest>,
) -> Result<Json<DualEligibleClaim>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut claim = load_claim(&conn, &id)?;
    let previous = claim.status;
    dual_eligible::record_medicaid_payment(&mut claim, request.paid_cents, crate::db::now())?;
    repository::update_dual_claim(&conn, &claim, previous)?;
    Ok(Json(claim))
}

/// `POST /api/dual-eligible/claims/:id/deny`
pub async fn deny(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<DualEligibleClaim>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut claim = load_claim(&conn, &id)?;
    let previous = claim.status;
    dual_eligible::deny(&mut claim, crate::db::now())?;
    repository::update_dual_claim(&conn, &claim, previous)?;
    Ok(Json(claim))
}
