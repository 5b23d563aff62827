//! Facility safety endpoints.
//!
//! - `GET /api/facility/facilities` / `POST`
//! - `GET /api/facility/checks?facility_id&category&status` / `POST`
//! - `POST /api/facility/checks/:id/inspections`: record and reschedule
//! - `GET /api/facility/checks/:id/inspections`
//! - `GET /api/facility/summary?facility_id`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::endpoints::common::{non_blank, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::facility::{self, ComplianceSummary, SafetyCheckStatus};
use crate::models::enums::SafetyCategory;
use crate::models::{Facility, SafetyCheck, SafetyCheckFilter, SafetyInspection};
use crate::validation;

#[derive(Deserialize)]
pub struct CreateFacilityRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub license_number: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Deserialize)]
pub struct CreateCheckRequest {
    pub facility_id: Uuid,
    pub category: SafetyCategory,
    #[serde(default)]
    pub item_name: String,
    pub frequency_days: i64,
    /// Defaults to today: a new item is due for its first inspection.
    pub next_due: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct RecordInspectionRequest {
    /// Defaults to today.
    pub inspected_on: Option<NaiveDate>,
    pub passed: bool,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct SummaryQuery {
    pub facility_id: Option<Uuid>,
}

fn load_check(conn: &Connection, raw_id: &str) -> Result<SafetyCheck, ApiError> {
    let id = parse_id(raw_id, "check id")?;
    repository::get_safety_check(conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("safety check", id).into())
}

fn checks_with_status(
    conn: &Connection,
    facility_id: Option<&Uuid>,
    category: Option<SafetyCategory>,
) -> Result<Vec<SafetyCheckStatus>, ApiError> {
    let today = crate::db::today();
    Ok(repository::list_safety_checks(conn, facility_id, category)?
        .into_iter()
        .map(|check| facility::with_status(check, today))
        .collect())
}

/// `GET /api/facility/facilities`
pub async fn facilities(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
) -> Result<Json<Vec<Facility>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_facilities(&conn)?))
}

/// `POST /api/facility/facilities`
pub async fn create_facility(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<CreateFacilityRequest>,
) -> Result<(StatusCode, Json<Facility>), ApiError> {
    let facility = Facility {
        id: Uuid::new_v4(),
        name: validation::required("name", &request.name)?,
        license_number: validation::required("license_number", &request.license_number)?,
        address: validation::required("address", &request.address)?,
        created_at: crate::db::now(),
    };
    let conn = ctx.core.open_db()?;
    repository::insert_facility(&conn, &facility)?;
    Ok((StatusCode::CREATED, Json(facility)))
}

/// `GET /api/facility/checks`: status is derived for today, then filtered.
pub async fn checks(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<SafetyCheckFilter>,
) -> Result<Json<Vec<SafetyCheckStatus>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut rows = checks_with_status(&conn, filter.facility_id.as_ref(), filter.category)?;
    if let Some(status) = filter.status {
        rows.retain(|c| c.status == status);
    }
    Ok(Json(rows))
}

/// `POST /api/facility/checks`
pub async fn create_check(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<CreateCheckRequest>,
) -> Result<(StatusCode, Json<SafetyCheckStatus>), ApiError> {
    let item_name = validation::required("item_name", &request.item_name)?;
    facility::validate_frequency(request.frequency_days)?;

    let conn = ctx.core.open_db()?;
    repository::get_facility(&conn, &request.facility_id)?
        .ok_or_else(|| DatabaseError::not_found("facility", request.facility_id))?;

    let today = crate::db::today();
    let check = SafetyCheck {
        id: Uuid::new_v4(),
        facility_id: request.facility_id,
        category: request.category,
        item_name,
        frequency_days: request.frequency_days,
        last_inspected: None,
        next_due: request.next_due.unwrap_or(today),
        notes: non_blank(request.notes),
        created_at: crate::db::now(),
    };
    repository::insert_safety_check(&conn, &check)?;

    Ok((StatusCode::CREATED, Json(facility::with_status(check, today))))
}

/// `POST /api/facility/checks/:id/inspections`
pub async fn record_inspection(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<RecordInspectionRequest>,
) -> Result<(StatusCode, Json<SafetyCheckStatus>), ApiError> {
    let today = crate::db::today();
    let inspected_on = request.inspected_on.unwrap_or(today);
    if inspected_on > today {
        return Err(ApiError::BadRequest("inspected_on is in the future".into()));
    }

    let conn = ctx.core.open_db()?;
    let mut check = load_check(&conn, &id)?;
    let inspection = SafetyInspection {
        id: Uuid::new_v4(),
        check_id: check.id,
        inspected_on,
        inspector: staff.staff_name.clone(),
        passed: request.passed,
        notes: non_blank(request.notes),
        created_at: crate::db::now(),
    };
    facility::apply_inspection(&mut check, &inspection)?;
    repository::record_inspection(&conn, &inspection, &check)?;
    if !inspection.passed {
        tracing::warn!(check_id = %check.id, next_due = %check.next_due, "Safety inspection failed");
    }

    Ok((StatusCode::CREATED, Json(facility::with_status(check, today))))
}

/// `GET /api/facility/checks/:id/inspections`
pub async fn inspections(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SafetyInspection>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let check = load_check(&conn, &id)?;
    Ok(Json(repository::list_inspections(&conn, &check.id)?))
}

/// `GET /api/facility/summary?facility_id`
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<ComplianceSummary>, ApiError> {
    let conn = ctx.core.open_db()?;
    let rows = checks_with_status(&conn, query.facility_id.as_ref(), None)?;
    Ok(Json(facility::summarize(query.facility_id, &rows)))
}
