//! Insurance and eligibility endpoints.
//!
//! - `GET /api/insurance/policies?patient_id` / `POST`: list or add policies
//! - `POST /api/insurance/eligibility`: run and persist an eligibility check
//! - `GET /api/insurance/eligibility?patient_id`: check history

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::non_blank;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::repository;
use crate::eligibility;
use crate::models::enums::{CoveragePriority, PayerType};
use crate::models::{EligibilityCheck, InsurancePolicy};
use crate::validation;

#[derive(Deserialize)]
pub struct PatientQuery {
    pub patient_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreatePolicyRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub payer_name: String,
    pub payer_type: PayerType,
    #[serde(default)]
    pub member_id: String,
    pub group_number: Option<String>,
    pub coverage_priority: CoveragePriority,
    pub effective_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct EligibilityRequest {
    pub patient_id: Uuid,
    /// Defaults to today.
    pub service_date: Option<NaiveDate>,
}

/// `GET /api/insurance/policies?patient_id`
pub async fn policies(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<InsurancePolicy>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_policies_for_patient(&conn, &query.patient_id)?))
}

/// `POST /api/insurance/policies`
pub async fn create_policy(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<InsurancePolicy>), ApiError> {
    let payer_name = validation::required("payer_name", &request.payer_name)?;
    let member_id = validation::required("member_id", &request.member_id)?;
    validation::member_id(&member_id)?;
    if let Some(end) = request.termination_date {
        if end < request.effective_date {
            return Err(ApiError::BadRequest(
                "termination_date precedes effective_date".into(),
            ));
        }
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let policy = InsurancePolicy {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        payer_name,
        payer_type: request.payer_type,
        member_id,
        group_number: non_blank(request.group_number),
        coverage_priority: request.coverage_priority,
        effective_date: request.effective_date,
        termination_date: request.termination_date,
        created_at: crate::db::now(),
    };
    repository::insert_policy(&conn, &policy)?;

    Ok((StatusCode::CREATED, Json(policy)))
}

/// `POST /api/insurance/eligibility`
pub async fn check(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<EligibilityRequest>,
) -> Result<(StatusCode, Json<EligibilityCheck>), ApiError> {
    let service_date = request.service_date.unwrap_or_else(crate::db::today);

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;
    let policies = repository::list_policies_for_patient(&conn, &request.patient_id)?;
    let decision = eligibility::check_eligibility(&policies, service_date);

    let check = EligibilityCheck {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        policy_id: decision.policy_id,
        service_date,
        status: decision.status,
        dual_eligible: decision.dual_eligible,
        reason: decision.reason,
        checked_by: staff.staff_name.clone(),
        checked_at: crate::db::now(),
    };
    repository::insert_eligibility_check(&conn, &check)?;
    tracing::debug!(patient_id = %check.patient_id, status = %check.status, dual = check.dual_eligible, "Eligibility checked");

    Ok((StatusCode::CREATED, Json(check)))
}

/// `GET /api/insurance/eligibility?patient_id`
pub async fn history(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Vec<EligibilityCheck>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_eligibility_checks(&conn, &query.patient_id)?))
}
