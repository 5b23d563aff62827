//! Patient endpoints.
//!
//! - `GET /api/patients`: list with status/program/search filters
//! - `POST /api/patients`: register a patient
//! - `GET /api/patients/:id`: patient with addresses
//! - `PUT /api/patients/:id/risk-score`: update diversion risk score
//! - `GET /api/patients/:id/addresses` / `POST`: list or add addresses

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::common::{non_blank, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::repository;
use crate::dosing::validate_coordinates;
use crate::models::enums::{AddressType, PatientStatus, Program};
use crate::models::{Patient, PatientAddress, PatientFilter};
use crate::validation;

#[derive(Deserialize)]
pub struct CreatePatientRequest {
    #[serde(default)]
    pub mrn: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub sex: String,
    pub phone: Option<String>,
    pub program: Program,
    #[serde(default)]
    pub diversion_risk_score: i32,
}

#[derive(Deserialize)]
pub struct RiskScoreRequest {
    pub diversion_risk_score: i32,
}

#[derive(Deserialize)]
pub struct AddAddressRequest {
    pub address_type: AddressType,
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Serialize)]
pub struct PatientDetail {
    #[serde(flatten)]
    pub patient: Patient,
    pub addresses: Vec<PatientAddress>,
    pub primary_home: Option<PatientAddress>,
}

fn check_risk_score(score: i32) -> Result<(), ApiError> {
    if !(0..=100).contains(&score) {
        return Err(ApiError::BadRequest(format!(
            "diversion_risk_score must be between 0 and 100, got {score}"
        )));
    }
    Ok(())
}

/// `GET /api/patients`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<PatientFilter>,
) -> Result<Json<Vec<Patient>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_patients(&conn, &filter)?))
}

/// `POST /api/patients`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<(StatusCode, Json<Patient>), ApiError> {
    let mrn = validation::required("mrn", &request.mrn)?.to_uppercase();
    validation::mrn(&mrn)?;
    let first_name = validation::required("first_name", &request.first_name)?;
    let last_name = validation::required("last_name", &request.last_name)?;
    let sex = validation::required("sex", &request.sex)?;
    check_risk_score(request.diversion_risk_score)?;

    let conn = ctx.core.open_db()?;
    if repository::get_patient_by_mrn(&conn, &mrn)?.is_some() {
        return Err(ApiError::Conflict(format!("MRN {mrn} is already registered")));
    }

    let now = crate::db::now();
    let patient = Patient {
        id: Uuid::new_v4(),
        mrn,
        first_name,
        last_name,
        date_of_birth: request.date_of_birth,
        sex,
        phone: non_blank(request.phone),
        program: request.program,
        status: PatientStatus::Active,
        diversion_risk_score: request.diversion_risk_score,
        created_at: now,
        updated_at: now,
    };
    repository::insert_patient(&conn, &patient)?;
    tracing::info!(patient_id = %patient.id, registered_by = %staff.staff_name, "Registered patient");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// `GET /api/patients/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<PatientDetail>, ApiError> {
    let id = parse_id(&id, "patient id")?;
    let conn = ctx.core.open_db()?;
    let patient = repository::require_patient(&conn, &id)?;
    let addresses = repository::list_addresses(&conn, &id)?;
    let primary_home = repository::get_primary_home_address(&conn, &id)?;
    Ok(Json(PatientDetail {
        patient,
        addresses,
        primary_home,
    }))
}

/// `PUT /api/patients/:id/risk-score`
pub async fn update_risk_score(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<RiskScoreRequest>,
) -> Result<Json<Patient>, ApiError> {
    let id = parse_id(&id, "patient id")?;
    check_risk_score(request.diversion_risk_score)?;
    let conn = ctx.core.open_db()?;
    repository::update_risk_score(&conn, &id, request.diversion_risk_score)?;
    Ok(Json(repository::require_patient(&conn, &id)?))
}

/// `GET /api/patients/:id/addresses`
pub async fn addresses(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PatientAddress>>, ApiError> {
    let id = parse_id(&id, "patient id")?;
    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &id)?;
    Ok(Json(repository::list_addresses(&conn, &id)?))
}

/// `POST /api/patients/:id/addresses`
pub async fn add_address(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<AddAddressRequest>,
) -> Result<(StatusCode, Json<PatientAddress>), ApiError> {
    let patient_id = parse_id(&id, "patient id")?;
    let line1 = validation::required("line1", &request.line1)?;
    let city = validation::required("city", &request.city)?;
    let state = request.state.trim().to_uppercase();
    validation::state_code("state", &state)?;
    let postal_code = request.postal_code.trim().to_string();
    validation::postal_code(&postal_code)?;

    match (request.latitude, request.longitude) {
        (Some(lat), Some(lon)) => validate_coordinates(lat, lon)?,
        (None, None) => {}
        _ => {
            return Err(ApiError::BadRequest(
                "latitude and longitude must be given together".into(),
            ))
        }
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &patient_id)?;

    let address = PatientAddress {
        id: Uuid::new_v4(),
        patient_id,
        address_type: request.address_type,
        line1,
        city,
        state,
        postal_code,
        latitude: request.latitude,
        longitude: request.longitude,
        is_primary: request.is_primary,
        created_at: crate::db::now(),
    };
    repository::insert_address(&conn, &address)?;

    Ok((StatusCode::CREATED, Json(address)))
}
