//! Prior authorization endpoints.
//!
//! - `GET /api/prior-auth?patient_id&status` / `POST /api/prior-auth`
//! - `PUT /api/prior-auth/:id/status`: body carries the decision fields
//! - `GET /api/prior-auth/expiring?days`: approved, ending within the window

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::{non_blank, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::models::enums::PriorAuthStatus;
use crate::models::{PriorAuthFilter, PriorAuthorization};
use crate::prior_auth::{self, Decision};
use crate::validation;

#[derive(Deserialize)]
pub struct CreatePriorAuthRequest {
    pub patient_id: Uuid,
    pub policy_id: Option<Uuid>,
    #[serde(default)]
    pub service_code: String,
    #[serde(default)]
    pub service_description: String,
    #[serde(default = "one")]
    pub units_requested: i32,
    pub notes: Option<String>,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: PriorAuthStatus,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<PriorAuthFilter>,
) -> Result<Json<Vec<PriorAuthorization>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_prior_auths(&conn, &filter)?))
}

/// `POST /api/prior-auth`: new requests start as drafts.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<CreatePriorAuthRequest>,
) -> Result<(StatusCode, Json<PriorAuthorization>), ApiError> {
    let service_code = validation::required("service_code", &request.service_code)?.to_uppercase();
    validation::procedure_code("service_code", &service_code)?;
    let service_description = validation::required("service_description", &request.service_description)?;
    if request.units_requested <= 0 {
        return Err(ApiError::BadRequest("units_requested must be positive".into()));
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;
    if let Some(policy_id) = request.policy_id {
        let policy = repository::get_policy(&conn, &policy_id)?
            .ok_or_else(|| DatabaseError::not_found("insurance policy", policy_id))?;
        if policy.patient_id != request.patient_id {
            return Err(ApiError::BadRequest("policy belongs to another patient".into()));
        }
    }

    let now = crate::db::now();
    let auth = PriorAuthorization {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        policy_id: request.policy_id,
        service_code,
        service_description,
        status: PriorAuthStatus::Draft,
        auth_number: None,
        units_requested: request.units_requested,
        units_approved: None,
        valid_from: None,
        valid_to: None,
        submitted_at: None,
        decided_at: None,
        notes: non_blank(request.notes),
        created_at: now,
        updated_at: now,
    };
    repository::insert_prior_auth(&conn, &auth)?;

    Ok((StatusCode::CREATED, Json(auth)))
}

/// `PUT /api/prior-auth/:id/status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<PriorAuthorization>, ApiError> {
    let id = parse_id(&id, "prior authorization id")?;
    let conn = ctx.core.open_db()?;
    let mut auth = repository::get_prior_auth(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("prior authorization", id))?;

    let from = auth.status;
    prior_auth::transition_prior_auth(&mut auth, request.status, request.decision, crate::db::now())?;
    repository::update_prior_auth(&conn, &auth, from)?;

    tracing::info!(
        auth_id = %auth.id,
        from = from.as_str(),
        to = auth.status.as_str(),
        staff = %staff.staff_name,
        "Prior authorization status changed"
    );
    Ok(Json(auth))
}

/// `GET /api/prior-auth/expiring`
pub async fn expiring(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<ExpiringQuery>,
) -> Result<Json<Vec<PriorAuthorization>>, ApiError> {
    let (from, until) = prior_auth::expiring_window(crate::db::today(), query.days)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_approved_expiring(&conn, from, until)?))
}
