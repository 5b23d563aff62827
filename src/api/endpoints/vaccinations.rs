//! Vaccination endpoints: lot inventory and administration records.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::models::{VaccinationRecord, VaccineInventoryFilter, VaccineLot};
use crate::validation;
use crate::vaccination;

#[derive(Deserialize)]
pub struct CreateLotRequest {
    #[serde(default)]
    pub vaccine_name: String,
    #[serde(default)]
    pub cvx_code: String,
    #[serde(default)]
    pub lot_number: String,
    #[serde(default)]
    pub manufacturer: String,
    pub doses_available: i32,
    pub expiration_date: NaiveDate,
}

#[derive(Deserialize)]
pub struct AdministerRequest {
    pub patient_id: Uuid,
    pub inventory_id: Uuid,
    pub administered_on: Option<NaiveDate>,
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub route: String,
}

#[derive(Deserialize)]
pub struct RecordQuery {
    pub patient_id: Option<Uuid>,
}

/// `GET /api/vaccinations/inventory`: unexpired lots unless asked otherwise.
pub async fn inventory(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<VaccineInventoryFilter>,
) -> Result<Json<Vec<VaccineLot>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_vaccine_inventory(&conn, &filter, crate::db::today())?))
}

/// `POST /api/vaccinations/inventory`
pub async fn add_lot(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateLotRequest>,
) -> Result<(StatusCode, Json<VaccineLot>), ApiError> {
    let vaccine_name = validation::required("vaccine_name", &request.vaccine_name)?;
    let cvx_code = validation::required("cvx_code", &request.cvx_code)?;
    validation::cvx_code(&cvx_code)?;
    let lot_number = validation::required("lot_number", &request.lot_number)?;
    let manufacturer = validation::required("manufacturer", &request.manufacturer)?;
    validation::non_negative("doses_available", request.doses_available as i64)?;

    let lot = VaccineLot {
        id: Uuid::new_v4(),
        vaccine_name,
        cvx_code,
        lot_number,
        manufacturer,
        doses_available: request.doses_available,
        expiration_date: request.expiration_date,
        created_at: crate::db::now(),
    };
    let conn = ctx.core.open_db()?;
    repository::insert_vaccine_lot(&conn, &lot)?;

    tracing::info!(lot_id = %lot.id, doses = lot.doses_available, staff = %staff.staff_name, "Vaccine lot received");
    Ok((StatusCode::CREATED, Json(lot)))
}

/// `GET /api/vaccinations/records`
pub async fn records(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<RecordQuery>,
) -> Result<Json<Vec<VaccinationRecord>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_vaccination_records(&conn, query.patient_id.as_ref())?))
}

/// `POST /api/vaccinations/records`: administer one dose from a lot.
pub async fn administer(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<AdministerRequest>,
) -> Result<(StatusCode, Json<VaccinationRecord>), ApiError> {
    let site = validation::required("site", &request.site)?;
    let route = validation::required("route", &request.route)?;
    let today = crate::db::today();
    let administered_on = request.administered_on.unwrap_or(today);
    if administered_on > today {
        return Err(ApiError::BadRequest("administered_on cannot be in the future".into()));
    }

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;
    let lot = repository::get_vaccine_lot(&conn, &request.inventory_id)?
        .ok_or_else(|| DatabaseError::not_found("vaccine lot", request.inventory_id))?;
    let prior = repository::count_prior_doses(&conn, &request.patient_id, &lot.vaccine_name)?;

    let record = vaccination::administer(
        &lot,
        request.patient_id,
        administered_on,
        &staff.staff_name,
        &site,
        &route,
        prior,
        crate::db::now(),
    )?;
    repository::record_vaccination(&conn, &record)?;

    Ok((StatusCode::CREATED, Json(record)))
}
