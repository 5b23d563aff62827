//! Diversion control endpoints: biometric enrollment and take-home
//! verification against the home geofence.
//!
//! - `GET /api/diversion/enrollments?patient_id` / `POST`
//! - `POST /api/diversion/verify`
//! - `GET /api/diversion/verifications?patient_id&outcome`

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::diversion;
use crate::dosing::{active_exceptions, validate_coordinates};
use crate::models::enums::{BiometricType, VerificationOutcome};
use crate::models::{BiometricEnrollment, ComplianceAlert, DiversionVerification};

#[derive(Deserialize)]
pub struct EnrollmentQuery {
    pub patient_id: Uuid,
}

#[derive(Deserialize)]
pub struct EnrollRequest {
    pub patient_id: Uuid,
    pub biometric_type: BiometricType,
    /// Base64 template as captured by the device. Only its digest is kept.
    #[serde(default)]
    pub template: String,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub patient_id: Uuid,
    pub biometric_type: BiometricType,
    pub match_score: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub kit_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct VerificationQuery {
    pub patient_id: Option<Uuid>,
    pub outcome: Option<VerificationOutcome>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub verification: DiversionVerification,
    pub alert: Option<ComplianceAlert>,
}

/// `GET /api/diversion/enrollments?patient_id`
pub async fn enrollments(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<EnrollmentQuery>,
) -> Result<Json<Vec<BiometricEnrollment>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_enrollments(&conn, &query.patient_id)?))
}

/// `POST /api/diversion/enrollments`: replaces any active enrollment of that type.
pub async fn enroll(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<BiometricEnrollment>), ApiError> {
    let template_hash = diversion::hash_template(&request.template)?;
    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let enrollment = BiometricEnrollment {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        biometric_type: request.biometric_type,
        template_hash,
        enrolled_by: staff.staff_name.clone(),
        enrolled_at: crate::db::now(),
        active: true,
    };
    repository::replace_enrollment(&conn, &enrollment)?;
    tracing::info!(patient_id = %enrollment.patient_id, kind = %enrollment.biometric_type, "Biometric enrolled");

    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// `POST /api/diversion/verify`: every attempt is stored; failures open an alert.
pub async fn verify(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<VerifyRequest>,
) -> Result<(StatusCode, Json<VerifyResponse>), ApiError> {
    if !(0.0..=1.0).contains(&request.match_score) {
        return Err(ApiError::BadRequest("match_score must be between 0 and 1".into()));
    }
    validate_coordinates(request.latitude, request.longitude)?;

    let conn = ctx.core.open_db()?;
    let patient = repository::require_patient(&conn, &request.patient_id)?;
    if let Some(kit_id) = request.kit_id {
        repository::get_kit(&conn, &kit_id)?.ok_or_else(|| DatabaseError::not_found("kit", kit_id))?;
    }

    let enrolled = repository::get_active_enrollment(&conn, &patient.id, request.biometric_type)?.is_some();
    let home = repository::get_primary_home_address(&conn, &patient.id)?
        .and_then(|address| address.coordinates());
    let today = crate::db::today();
    let exceptions = repository::list_location_exceptions(&conn, Some(&patient.id), Some(today))?;
    let covering = active_exceptions(&exceptions, today);

    let point = (request.latitude, request.longitude);
    let decision = diversion::decide(
        &ctx.core.diversion,
        enrolled,
        request.match_score,
        point,
        home,
        &covering,
    );

    let now = crate::db::now();
    let verification = DiversionVerification {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        kit_id: request.kit_id,
        biometric_type: request.biometric_type,
        match_score: request.match_score,
        latitude: request.latitude,
        longitude: request.longitude,
        distance_m: decision.distance_m,
        exception_id: decision.exception_id,
        outcome: decision.outcome,
        verified_at: now,
    };
    let alert = diversion::verification_alert(&verification, patient.diversion_risk_score, now);
    repository::insert_verification(&conn, &verification, alert.as_ref())?;

    if verification.outcome != VerificationOutcome::Verified {
        tracing::warn!(
            patient_id = %patient.id,
            outcome = %verification.outcome,
            distance_m = ?verification.distance_m,
            "Take-home verification not verified"
        );
    }

    Ok((StatusCode::CREATED, Json(VerifyResponse { verification, alert })))
}

/// `GET /api/diversion/verifications`
pub async fn verifications(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<VerificationQuery>,
) -> Result<Json<Vec<DiversionVerification>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_verifications(
        &conn,
        query.patient_id.as_ref(),
        query.outcome,
    )?))
}
