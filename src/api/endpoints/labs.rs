//! Lab integration endpoints.
//!
//! - `GET /api/lab/orders?patient_id&status` / `POST`
//! - `GET /api/lab/orders/:id`: order with its results
//! - `PUT /api/lab/orders/:id/status`
//! - `POST /api/lab/orders/:id/results`: attach results, mark resulted
//! - `GET /api/lab/results?patient_id&abnormal_only`

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::endpoints::common::{non_blank, parse_id};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, StaffContext};
use crate::db::{repository, DatabaseError};
use crate::labs;
use crate::models::enums::{AbnormalFlag, LabOrderStatus, LabPriority};
use crate::models::{LabOrder, LabOrderFilter, LabResult, LabResultFilter};
use crate::validation;

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub patient_id: Uuid,
    #[serde(default)]
    pub test_code: String,
    #[serde(default)]
    pub test_name: String,
    #[serde(default = "routine")]
    pub priority: LabPriority,
}

fn routine() -> LabPriority {
    LabPriority::Routine
}

#[derive(Deserialize)]
pub struct OrderStatusRequest {
    pub status: LabOrderStatus,
}

#[derive(Deserialize)]
pub struct ResultInput {
    #[serde(default)]
    pub analyte: String,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub reference_range_low: Option<f64>,
    pub reference_range_high: Option<f64>,
}

#[derive(Deserialize)]
pub struct RecordResultsRequest {
    pub results: Vec<ResultInput>,
}

#[derive(Serialize)]
pub struct OrderWithResults {
    pub order: LabOrder,
    pub results: Vec<LabResult>,
}

/// `GET /api/lab/orders`: stat orders first.
pub async fn orders(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<LabOrderFilter>,
) -> Result<Json<Vec<LabOrder>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_lab_orders(&conn, &filter)?))
}

/// `POST /api/lab/orders`
pub async fn create_order(
    State(ctx): State<ApiContext>,
    Extension(staff): Extension<StaffContext>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<LabOrder>), ApiError> {
    let test_code = validation::required("test_code", &request.test_code)?.to_uppercase();
    validation::procedure_code("test_code", &test_code)?;
    let test_name = validation::required("test_name", &request.test_name)?;

    let conn = ctx.core.open_db()?;
    repository::require_patient(&conn, &request.patient_id)?;

    let now = crate::db::now();
    let order = LabOrder {
        id: Uuid::new_v4(),
        patient_id: request.patient_id,
        test_code,
        test_name,
        ordered_by: staff.staff_name.clone(),
        priority: request.priority,
        status: LabOrderStatus::Ordered,
        ordered_at: now,
        collected_at: None,
        updated_at: now,
    };
    repository::insert_lab_order(&conn, &order)?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/lab/orders/:id`
pub async fn order_detail(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
) -> Result<Json<OrderWithResults>, ApiError> {
    let id = parse_id(&id, "order id")?;
    let conn = ctx.core.open_db()?;
    let order = repository::get_lab_order(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("lab order", id))?;
    let results = repository::list_results_for_order(&conn, &order.id)?;
    Ok(Json(OrderWithResults { order, results }))
}

/// `PUT /api/lab/orders/:id/status`
pub async fn update_status(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<LabOrder>, ApiError> {
    let id = parse_id(&id, "order id")?;
    let conn = ctx.core.open_db()?;
    let mut order = repository::get_lab_order(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("lab order", id))?;
    let previous = order.status;
    labs::transition_order(&mut order, request.status, crate::db::now())?;
    repository::update_lab_order(&conn, &order, previous)?;
    Ok(Json(order))
}

/// `POST /api/lab/orders/:id/results`
pub async fn record_results(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Path(id): Path<String>,
    Json(request): Json<RecordResultsRequest>,
) -> Result<(StatusCode, Json<OrderWithResults>), ApiError> {
    let id = parse_id(&id, "order id")?;
    if request.results.is_empty() {
        return Err(ApiError::BadRequest("at least one result is required".into()));
    }

    let conn = ctx.core.open_db()?;
    let mut order = repository::get_lab_order(&conn, &id)?
        .ok_or_else(|| DatabaseError::not_found("lab order", id))?;
    let now = crate::db::now();
    let previous = order.status;
    labs::mark_resulted(&mut order, now)?;

    let mut results = Vec::with_capacity(request.results.len());
    for input in request.results {
        let analyte = validation::required("analyte", &input.analyte)?;
        let value_text = non_blank(input.value_text);
        if input.value.is_none() && value_text.is_none() {
            return Err(ApiError::BadRequest(format!("{analyte}: value or value_text is required")));
        }
        results.push(LabResult {
            id: Uuid::new_v4(),
            order_id: order.id,
            patient_id: order.patient_id,
            abnormal_flag: labs::abnormal_flag(
                input.value,
                input.reference_range_low,
                input.reference_range_high,
            ),
            analyte,
            value: input.value,
            value_text,
            unit: non_blank(input.unit),
            reference_range_low: input.reference_range_low,
            reference_range_high: input.reference_range_high,
            resulted_at: now,
        });
    }
    repository::insert_lab_results(&conn, &order, previous, &results)?;

    let critical = results
        .iter()
        .filter(|r| matches!(r.abnormal_flag, AbnormalFlag::CriticalLow | AbnormalFlag::CriticalHigh))
        .count();
    if critical > 0 {
        tracing::warn!(order_id = %order.id, critical, "Critical lab values recorded");
    }

    Ok((StatusCode::CREATED, Json(OrderWithResults { order, results })))
}

/// `GET /api/lab/results`
pub async fn results(
    State(ctx): State<ApiContext>,
    Extension(_staff): Extension<StaffContext>,
    Query(filter): Query<LabResultFilter>,
) -> Result<Json<Vec<LabResult>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_lab_results(&conn, &filter)?))
}
