//! Health-equity research endpoints.
//!
//! - `GET /api/research/health-equity?metric_id&stratification_type`
//! - `POST /api/research/health-equity`: persist today's snapshot
//! - `GET/POST /api/research/health-equity/metrics`
//! - `POST /api/research/health-equity/observations`

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::equity::{self, EquityReport, EquitySource};
use crate::models::{EquityFilter, EquityMetric, OutcomeObservation};
use crate::validation;

#[derive(Deserialize)]
pub struct MetricRequest {
    #[serde(default)]
    pub metric_id: String,
    #[serde(default)]
    pub metric_name: String,
    pub benchmark_value: Option<f64>,
    pub equity_target: Option<f64>,
    #[serde(default = "higher_is_better")]
    pub higher_is_better: bool,
}

fn higher_is_better() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ObservationRequest {
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub metric_id: String,
    #[serde(default)]
    pub stratification_type: String,
    #[serde(default)]
    pub group_name: String,
    pub value: f64,
    pub observed_on: Option<NaiveDate>,
}

/// `GET /api/research/health-equity`
///
/// Calculated from observations when there are any for the filter,
/// otherwise read from the latest stored snapshot.
pub async fn report(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<EquityFilter>,
) -> Result<Json<EquityReport>, ApiError> {
    let conn = ctx.core.open_db()?;
    let metrics = repository::list_equity_metrics(&conn)?;
    let observations = repository::list_outcome_observations(&conn, &filter)?;
    let calculated = equity::calculate_stratified_outcomes(&metrics, &observations, crate::db::today());

    let report = equity::build_report(calculated, || repository::latest_equity_snapshot(&conn, &filter))?;
    Ok(Json(report))
}

/// `POST /api/research/health-equity`: recompute every metric and replace
/// today's snapshot.
pub async fn snapshot(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
) -> Result<(StatusCode, Json<EquityReport>), ApiError> {
    let today = crate::db::today();
    let conn = ctx.core.open_db()?;
    let metrics = repository::list_equity_metrics(&conn)?;
    let observations = repository::list_outcome_observations(&conn, &EquityFilter::default())?;
    let rows = equity::calculate_stratified_outcomes(&metrics, &observations, today);
    if rows.is_empty() {
        return Err(ApiError::Conflict("no outcome observations to snapshot".into()));
    }

    repository::replace_equity_snapshot(&conn, today, &rows)?;
    tracing::info!(rows = rows.len(), staff = %staff.staff_name, "Health-equity snapshot stored");

    Ok((
        StatusCode::CREATED,
        Json(EquityReport {
            source: EquitySource::Calculated,
            snapshot_date: Some(today),
            outcomes: equity::group_stratified_outcomes(&rows),
        }),
    ))
}

pub async fn metrics(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
) -> Result<Json<Vec<EquityMetric>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_equity_metrics(&conn)?))
}

/// `POST /api/research/health-equity/metrics`: create or replace a definition.
pub async fn upsert_metric(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<MetricRequest>,
) -> Result<Json<EquityMetric>, ApiError> {
    let metric = EquityMetric {
        metric_id: validation::required("metric_id", &request.metric_id)?,
        metric_name: validation::required("metric_name", &request.metric_name)?,
        benchmark_value: request.benchmark_value,
        equity_target: request.equity_target,
        higher_is_better: request.higher_is_better,
    };
    let conn = ctx.core.open_db()?;
    repository::upsert_equity_metric(&conn, &metric)?;
    Ok(Json(metric))
}

/// `POST /api/research/health-equity/observations`
pub async fn add_observation(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Json(request): Json<ObservationRequest>,
) -> Result<(StatusCode, Json<OutcomeObservation>), ApiError> {
    let metric_id = validation::required("metric_id", &request.metric_id)?;
    let stratification_type = validation::required("stratification_type", &request.stratification_type)?;
    let group_name = validation::required("group_name", &request.group_name)?;
    if !request.value.is_finite() {
        return Err(ApiError::BadRequest("value must be a finite number".into()));
    }

    let conn = ctx.core.open_db()?;
    if repository::get_equity_metric(&conn, &metric_id)?.is_none() {
        return Err(DatabaseError::not_found("equity metric", &metric_id).into());
    }
    if let Some(patient_id) = request.patient_id {
        repository::require_patient(&conn, &patient_id)?;
    }

    let observation = OutcomeObservation {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        metric_id,
        stratification_type,
        group_name,
        value: request.value,
        observed_on: request.observed_on.unwrap_or_else(crate::db::today),
    };
    repository::insert_outcome_observation(&conn, &observation)?;

    Ok((StatusCode::CREATED, Json(observation)))
}
