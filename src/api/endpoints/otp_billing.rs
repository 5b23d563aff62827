//! OTP billing endpoints: service capture and weekly bundle/APG claims.
//!
//! - `GET /api/otp-billing/services?patient_id&from&to` / `POST`
//! - `GET /api/otp-billing/claims?patient_id&status` / `POST`
//! - `GET /api/otp-billing/claims/:id`
//! - `PUT /api/otp-billing/claims/:id/status`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::parse_id;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::billing;
use crate::db::{repository, DatabaseError};
use crate::eligibility;
use crate::models::enums::{ClaimStatus, OtpMedication, OtpServiceType};
use crate::models::{OtpClaim, OtpClaimFilter, OtpService};

/// Service listing window when `from` is omitted.
const DEFAULT_SERVICE_WINDOW_DAYS: i64 = 90;

#[derive(Deserialize)]
pub struct ServiceQuery {
    pub patient_id: Uuid,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct RecordServiceRequest {
    pub patient_id: Uuid,
    pub service_date: NaiveDate,
    pub service_type: OtpServiceType,
    pub medication: Option<OtpMedication>,
}

#[derive(Deserialize)]
pub struct CreateClaimRequest {
    pub patient_id: Uuid,
    pub week_start: NaiveDate,
}

#[derive(Deserialize)]
pub struct ClaimStatusRequest {
    pub status: ClaimStatus,
}

/// `GET /api/otp-billing/services`
pub async fn services(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<ServiceQuery>,
) -> Result<Json<Vec<OtpService>>, ApiError> {
    let to = query.to.unwrap_or_else(crate::db::today);
    let from = match query.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_SERVICE_WINDOW_DAYS))
            .ok_or_else(|| ApiError::BadRequest("to is out of range".into()))?,
    };
    if from > to {
        return Err(ApiError::BadRequest("from is after to".into()));
    }
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_otp_services(&conn, &query.patient_id, from, to)?))
}

/// `POST /api/otp-billing/services`
pub async fn record_service(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<RecordServiceRequest>,
) -> Result<(StatusCode, Json<OtpService>), ApiError> {
    match (request.service_type.is_medication(), request.medication) {
        (true, None) => {
            return Err(ApiError::BadRequest(format!(
                "{} requires a medication",
                request.service_type
            )))
        }
        (false, Some(_)) => {
            return Err(ApiError::BadRequest(format!(
                "{} does not carry a medication",
                request.service_type
            )))
        }
        _ => {}
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let service = OtpService {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        service_date: request.service_date,
        service_type: request.service_type,
        medication: request.medication,
        recorded_by: staff.staff_name.clone(),
        created_at: crate::db::now(),
    };
    repository::insert_otp_service(&conn, &service)?;

    Ok((StatusCode::CREATED, Json(service)))
}

/// `GET /api/otp-billing/claims`
pub async fn claims(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<OtpClaimFilter>,
) -> Result<Json<Vec<OtpClaim>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_otp_claims(&conn, &filter)?))
}

/// `POST /api/otp-billing/claims`: price the patient-week and store a draft claim.
pub async fn create_claim(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateClaimRequest>,
) -> Result<(StatusCode, Json<OtpClaim>), ApiError> {
    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let week_end = billing::week_end(request.week_start)?;
    let services =
        repository::list_otp_services(&conn, &request.patient_id, request.week_start, week_end)?;
    let policies = repository::list_policies_for_patient(&conn, &request.patient_id)?;
    let payer_type = eligibility::primary_active_policy(&policies, request.week_start)
        .map(|p| p.payer_type);

    let plan = billing::build_weekly_claim(request.week_start, &services, payer_type)?;

    let now = crate::db::now();
    let claim = OtpClaim {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        week_start: plan.week_start,
        billing_method: plan.billing_method,
        payer_type,
        lines: plan.lines,
        total_cents: plan.total_cents,
        status: ClaimStatus::Draft,
        created_at: now,
        updated_at: now,
    };
    repository::insert_otp_claim(&conn, &claim)?;
    tracing::info!(
        claim_id = %claim.id,
        method = %claim.billing_method,
        total_cents = claim.total_cents,
        created_by = %staff.staff_name,
        "OTP weekly claim created"
    );

    Ok((StatusCode::CREATED, Json(claim)))
}

/// `GET /api/otp-billing/claims/:id`
pub async fn claim_detail(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<OtpClaim>, ApiError> {
    let id = parse_id(&id, "claim id")?;
    let conn = ctx.core.open_db()?;
    let claim = repository::get_otp_claim(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("otp claim", id))?;
    Ok(Json(claim))
}

/// `PUT /api/otp-billing/claims/:id/status`
pub async fn update_claim_status(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<ClaimStatusRequest>,
) -> Result<Json<OtpClaim>, ApiError> {
    let id = parse_id(&id, "claim id")?;
    let conn = ctx.core.open_db()?;
    let claim = repository::get_otp_claim(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("otp claim", id))?;
    billing::transition_claim(claim.status, request.status)?;
    repository::update_otp_claim_status(&conn, &id, claim.status, request.status)?;
    let updated = repository::get_otp_claim(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("otp claim", id))?;
    Ok(Json(updated))
}
