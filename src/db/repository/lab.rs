use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{AbnormalFlag, LabOrderStatus, LabPriority};
use crate::models::{LabOrder, LabOrderFilter, LabResult, LabResultFilter};

use super::{fmt_datetime, guarded_update_miss, parse_datetime, parse_opt_datetime, parse_uuid};

const ORDER_COLUMNS: &str =
    "id, patient_id, test_code, test_name, ordered_by, priority, status, ordered_at, collected_at, updated_at";

const RESULT_COLUMNS: &str = "id, order_id, patient_id, analyte, value, value_text, unit,
     reference_range_low, reference_range_high, abnormal_flag, resulted_at";

pub fn insert_lab_order(conn: &Connection, order: &LabOrder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO lab_orders (id, patient_id, test_code, test_name, ordered_by, priority,
         status, ordered_at, collected_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            order.id.to_string(),
            order.patient_id.to_string(),
            order.test_code,
            order.test_name,
            order.ordered_by,
            order.priority.as_str(),
            order.status.as_str(),
            fmt_datetime(&order.ordered_at),
            order.collected_at.as_ref().map(fmt_datetime),
            fmt_datetime(&order.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_lab_order(conn: &Connection, id: &Uuid) -> Result<Option<LabOrder>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM lab_orders WHERE id = ?1"),
            params![id.to_string()],
            order_row,
        )
        .optional()?;
    row.map(order_from_row).transpose()
}

/// Orders matching the filter; stat orders before routine, newest first.
pub fn list_lab_orders(conn: &Connection, filter: &LabOrderFilter) -> Result<Vec<LabOrder>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ORDER_COLUMNS} FROM lab_orders
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY CASE priority WHEN 'stat' THEN 0 ELSE 1 END, ordered_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.patient_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
        ],
        order_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(order_from_row(row?)?);
    }
    Ok(out)
}

/// Persist status fields of an order that is still in `previous`.
pub fn update_lab_order(conn: &Connection, order: &LabOrder, previous: LabOrderStatus) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE lab_orders SET status = ?1, collected_at = ?2, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            order.status.as_str(),
            order.collected_at.as_ref().map(fmt_datetime),
            fmt_datetime(&order.updated_at),
            order.id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(conn, "lab_orders", "lab_order", &order.id, previous.as_str()));
    }
    Ok(())
}

/// Store results and mark the order resulted in one transaction.
pub fn insert_lab_results(
    conn: &Connection,
    order: &LabOrder,
    previous: LabOrderStatus,
    results: &[LabResult],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO lab_results (id, order_id, patient_id, analyte, value, value_text, unit,
             reference_range_low, reference_range_high, abnormal_flag, resulted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for r in results {
            stmt.execute(params![
                r.id.to_string(),
                r.order_id.to_string(),
                r.patient_id.to_string(),
                r.analyte,
                r.value,
                r.value_text,
                r.unit,
                r.reference_range_low,
                r.reference_range_high,
                r.abnormal_flag.as_str(),
                fmt_datetime(&r.resulted_at),
            ])?;
        }
    }
    update_lab_order(&tx, order, previous)?;
    tx.commit()?;
    Ok(())
}

pub fn list_lab_results(conn: &Connection, filter: &LabResultFilter) -> Result<Vec<LabResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESULT_COLUMNS} FROM lab_results
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 = 0 OR abnormal_flag != 'normal')
         ORDER BY resulted_at DESC, analyte"
    ))?;
    let rows = stmt.query_map(
        params![filter.patient_id.map(|id| id.to_string()), filter.abnormal_only as i32],
        result_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(result_from_row(row?)?);
    }
    Ok(out)
}

pub fn list_results_for_order(conn: &Connection, order_id: &Uuid) -> Result<Vec<LabResult>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESULT_COLUMNS} FROM lab_results WHERE order_id = ?1 ORDER BY analyte"
    ))?;
    let rows = stmt.query_map(params![order_id.to_string()], result_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(result_from_row(row?)?);
    }
    Ok(out)
}

struct OrderRow {
    id: String,
    patient_id: String,
    test_code: String,
    test_name: String,
    ordered_by: String,
    priority: String,
    status: String,
    ordered_at: String,
    collected_at: Option<String>,
    updated_at: String,
}

fn order_row(row: &Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        test_code: row.get(2)?,
        test_name: row.get(3)?,
        ordered_by: row.get(4)?,
        priority: row.get(5)?,
        status: row.get(6)?,
        ordered_at: row.get(7)?,
        collected_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn order_from_row(row: OrderRow) -> Result<LabOrder, DatabaseError> {
    Ok(LabOrder {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        test_code: row.test_code,
        test_name: row.test_name,
        ordered_by: row.ordered_by,
        priority: LabPriority::from_str(&row.priority)?,
        status: LabOrderStatus::from_str(&row.status)?,
        ordered_at: parse_datetime(&row.ordered_at)?,
        collected_at: parse_opt_datetime(row.collected_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

struct ResultRow {
    id: String,
    order_id: String,
    patient_id: String,
    analyte: String,
    value: Option<f64>,
    value_text: Option<String>,
    unit: Option<String>,
    reference_range_low: Option<f64>,
    reference_range_high: Option<f64>,
    abnormal_flag: String,
    resulted_at: String,
}

fn result_row(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        id: row.get(0)?,
        order_id: row.get(1)?,
        patient_id: row.get(2)?,
        analyte: row.get(3)?,
        value: row.get(4)?,
        value_text: row.get(5)?,
        unit: row.get(6)?,
        reference_range_low: row.get(7)?,
        reference_range_high: row.get(8)?,
        abnormal_flag: row.get(9)?,
        resulted_at: row.get(10)?,
    })
}

fn result_from_row(row: ResultRow) -> Result<LabResult, DatabaseError> {
    Ok(LabResult {
        id: parse_uuid(&row.id)?,
        order_id: parse_uuid(&row.order_id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        analyte: row.analyte,
        value: row.value,
        value_text: row.value_text,
        unit: row.unit,
        reference_range_low: row.reference_range_low,
        reference_range_high: row.reference_range_high,
        abnormal_flag: AbnormalFlag::from_str(&row.abnormal_flag)?,
        resulted_at: parse_datetime(&row.resulted_at)?,
    })
}
