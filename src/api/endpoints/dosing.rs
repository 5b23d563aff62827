//! Off-site dosing endpoints: take-home kits, compliance alerts and
//! approved location exceptions.
//!
//! - `GET /api/dosing/kits?patient_id&status` / `POST`: list or prepare kits
//! - `POST /api/dosing/kits/:id/{dispense,return,lost}`: kit transitions
//! - `GET /api/dosing/kits/:id/log`: dispensing log
//! - `GET /api/dosing/alerts?patient_id&status&severity` / `POST`
//! - `POST /api/dosing/alerts/:id/{acknowledge,resolve}`
//! - `GET /api/dosing/location-exceptions?patient_id&active_on` / `POST`

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
use crate::dosing::{self, KitEvent};
use crate::models::enums::{AlertSeverity, ComplianceAlertStatus, ComplianceAlertType, OtpMedication};
use crate::models::{
    ComplianceAlert, ComplianceAlertFilter, DispensingLog, KitFilter, LocationException,
    MedicationKit,
};
use crate::validation;

#[derive(Deserialize)]
pub struct PrepareKitRequest {
    #[serde(default)]
    pub kit_number: String,
    pub patient_id: Uuid,
    pub medication: OtpMedication,
    pub dose_mg: f64,
    pub doses_count: i32,
}

#[derive(Deserialize, Default)]
pub struct KitEventRequest {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateAlertRequest {
    pub patient_id: Uuid,
    pub kit_id: Option<Uuid>,
    pub alert_type: ComplianceAlertType,
    pub severity: AlertSeverity,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct ExceptionQuery {
    pub patient_id: Option<Uuid>,
    pub active_on: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct CreateExceptionRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub reason: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn load_kit(conn: &Connection, raw_id: &str) -> Result<MedicationKit, ApiError> {
    let id = parse_id(raw_id, "kit id")?;
    repository::get_kit(conn, &id)?.ok_or_else(|| DatabaseError::not_found("kit", id).into())
}

fn load_alert(conn: &Connection, raw_id: &str) -> Result<ComplianceAlert, ApiError> {
    let id = parse_id(raw_id, "alert id")?;
    repository::get_compliance_alert(conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("compliance alert", id).into())
}

// ═══════════════════════════════════════════════════════════
// Kits
// ═══════════════════════════════════════════════════════════

/// `GET /api/dosing/kits`
pub async fn kits(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<KitFilter>,
) -> Result<Json<Vec<MedicationKit>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_kits(&conn, &filter)?))
}

/// `POST /api/dosing/kits`
pub async fn prepare(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<PrepareKitRequest>,
) -> Result<(StatusCode, Json<MedicationKit>), ApiError> {
    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let (kit, log) = dosing::prepare_kit(
        &request.kit_number,
        request.patient_id,
        request.medication,
        request.dose_mg,
        request.doses_count,
        &staff.staff_name,
        crate::db::now(),
    )?;
    repository::insert_kit(&conn, &kit, &log)?;

    Ok((StatusCode::CREATED, Json(kit)))
}

async fn transition(
    ctx: ApiContext,
    staff: StaffContext,
    id: String,
    event: KitEvent,
    request: Option<Json<KitEventRequest>>,
) -> Result<Json<MedicationKit>, ApiError> {
    let notes = request.and_then(|Json(r)| non_blank(r.notes));
    let conn = ctx.core.open_db()?;
    let mut kit = load_kit(&conn, &id)?;
    let previous = kit.status;

    let outcome = dosing::apply_kit_event(&mut kit, event, &staff.staff_name, notes, crate::db::now())?;
    repository::record_kit_transition(&conn, &kit, previous, &outcome.log, outcome.alert.as_ref())?;
    if let Some(alert) = &outcome.alert {
        tracing::warn!(kit_id = %kit.id, alert_id = %alert.id, "Take-home kit reported lost");
    }

    Ok(Json(kit))
}

/// `POST /api/dosing/kits/:id/dispense`
pub async fn dispense(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    request: Option<Json<KitEventRequest>>,
) -> Result<Json<MedicationKit>, ApiError> {
    transition(ctx, staff, id, KitEvent::Dispense, request).await
}

/// `POST /api/dosing/kits/:id/return`
pub async fn return_kit(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    request: Option<Json<KitEventRequest>>,
) -> Result<Json<MedicationKit>, ApiError> {
    transition(ctx, staff, id, KitEvent::Return, request).await
}

/// `POST /api/dosing/kits/:id/lost`
pub async fn report_lost(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
    request: Option<Json<KitEventRequest>>,
) -> Result<Json<MedicationKit>, ApiError> {
    transition(ctx, staff, id, KitEvent::ReportLost, request).await
}

/// `GET /api/dosing/kits/:id/log`
pub async fn kit_log(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<Vec<DispensingLog>>, ApiError> {
    let conn = ctx.core.open_db()?;
    let kit = load_kit(&conn, &id)?;
    Ok(Json(repository::list_dispensing_logs(&conn, &kit.id)?))
}

// ═══════════════════════════════════════════════════════════
// Compliance alerts
// ═══════════════════════════════════════════════════════════

/// `GET /api/dosing/alerts`
pub async fn alerts(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<ComplianceAlertFilter>,
) -> Result<Json<Vec<ComplianceAlert>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_compliance_alerts(&conn, &filter)?))
}

/// `POST /api/dosing/alerts`: raise an alert by hand (missed callback etc.).
pub async fn create_alert(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<ComplianceAlert>), ApiError> {
    let message = validation::required("message", &request.message)?;
    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;
    if let Some(kit_id) = request.kit_id {
        repository::get_kit(&conn, &kit_id)?.ok_or_else(|| DatabaseError::not_found("kit", kit_id))?;
    }

    let alert = ComplianceAlert {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        kit_id: request.kit_id,
        alert_type: request.alert_type,
        severity: request.severity,
        message,
        status: ComplianceAlertStatus::Open,
        created_at: crate::db::now(),
        resolved_at: None,
        resolved_by: None,
    };
    repository::insert_compliance_alert(&conn, &alert)?;

    Ok((StatusCode::CREATED, Json(alert)))
}

/// `POST /api/dosing/alerts/:id/acknowledge`
pub async fn acknowledge_alert(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<ComplianceAlert>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut alert = load_alert(&conn, &id)?;
    let previous = alert.status;
    dosing::acknowledge_alert(&mut alert)?;
    repository::update_compliance_alert_status(&conn, &alert.id, previous, alert.status, None, None)?;
    Ok(Json(alert))
}

/// `POST /api/dosing/alerts/:id/resolve`
pub async fn resolve_alert(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<ComplianceAlert>, ApiError> {
    let conn = ctx.core.open_db()?;
    let mut alert = load_alert(&conn, &id)?;
    let previous = alert.status;
    dosing::resolve_alert(&mut alert, &staff.staff_name, crate::db::now())?;
    repository::update_compliance_alert_status(
        &conn,
        &alert.id,
        previous,
        alert.status,
        alert.resolved_at,
        alert.resolved_by.as_deref(),
    )?;
    Ok(Json(alert))
}

// ═══════════════════════════════════════════════════════════
// Location exceptions
// ═══════════════════════════════════════════════════════════

/// `GET /api/dosing/location-exceptions`
pub async fn location_exceptions(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(query): Query<ExceptionQuery>,
) -> Result<Json<Vec<LocationException>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_location_exceptions(
        &conn,
        query.patient_id.as_ref(),
        query.active_on,
    )?))
}

/// `POST /api/dosing/location-exceptions`
pub async fn create_location_exception(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateExceptionRequest>,
) -> Result<(StatusCode, Json<LocationException>), ApiError> {
    let reason = validation::required("reason", &request.reason)?;
    dosing::validate_location_exception(
        request.latitude,
        request.longitude,
        request.radius_m,
        request.start_date,
        request.end_date,
    )?;

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let exception = LocationException {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        reason,
        latitude: request.latitude,
        longitude: request.longitude,
        radius_m: request.radius_m,
        start_date: request.start_date,
        end_date: request.end_date,
        approved_by: staff.staff_name.clone(),
        created_at: crate::db::now(),
    };
    repository::insert_location_exception(&conn, &exception)?;

    Ok((StatusCode::CREATED, Json(exception)))
}
