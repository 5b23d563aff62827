use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::SafetyCategory;
use crate::models::{Facility, SafetyCheck, SafetyInspection};

use super::{fmt_datetime, parse_date, parse_datetime, parse_opt_date, parse_uuid};

const CHECK_COLUMNS: &str = "id, facility_id, category, item_name, frequency_days, last_inspected,
     next_due, notes, created_at";

pub fn insert_facility(conn: &Connection, facility: &Facility) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO facilities (id, name, license_number, address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            facility.id.to_string(),
            facility.name,
            facility.license_number,
            facility.address,
            fmt_datetime(&facility.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_facility(conn: &Connection, id: &Uuid) -> Result<Option<Facility>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, license_number, address, created_at FROM facilities WHERE id = ?1",
            params![id.to_string()],
            facility_row,
        )
        .optional()?;
    row.map(facility_from_row).transpose()
}

pub fn list_facilities(conn: &Connection) -> Result<Vec<Facility>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT id, name, license_number, address, created_at FROM facilities ORDER BY name")?;
    let rows = stmt.query_map([], facility_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(facility_from_row(row?)?);
    }
    Ok(out)
}

type FacilityRow = (String, String, String, String, String);

fn facility_row(row: &Row<'_>) -> rusqlite::Result<FacilityRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn facility_from_row(row: FacilityRow) -> Result<Facility, DatabaseError> {
    let (id, name, license_number, address, created_at) = row;
    Ok(Facility {
        id: parse_uuid(&id)?,
        name,
        license_number,
        address,
        created_at: parse_datetime(&created_at)?,
    })
}

// ── Safety checks ──────────────────────────────────────────

pub fn insert_safety_check(conn: &Connection, check: &SafetyCheck) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO safety_checks (id, facility_id, category, item_name, frequency_days,
         last_inspected, next_due, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            check.id.to_string(),
            check.facility_id.to_string(),
            check.category.as_str(),
            check.item_name,
            check.frequency_days,
            check.last_inspected.map(|d| d.to_string()),
            check.next_due.to_string(),
            check.notes,
            fmt_datetime(&check.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_safety_check(conn: &Connection, id: &Uuid) -> Result<Option<SafetyCheck>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {CHECK_COLUMNS} FROM safety_checks WHERE id = ?1"),
            params![id.to_string()],
            check_row,
        )
        .optional()?;
    row.map(check_from_row).transpose()
}

/// Checks ordered by due date, soonest first.
pub fn list_safety_checks(
    conn: &Connection,
    facility_id: Option<&Uuid>,
    category: Option<SafetyCategory>,
) -> Result<Vec<SafetyCheck>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CHECK_COLUMNS} FROM safety_checks
         WHERE (?1 IS NULL OR facility_id = ?1) AND (?2 IS NULL OR category = ?2)
         ORDER BY next_due, item_name"
    ))?;
    let rows = stmt.query_map(
        params![facility_id.map(|id| id.to_string()), category.map(|c| c.as_str())],
        check_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(check_from_row(row?)?);
    }
    Ok(out)
}

/// Store an inspection and the check's rescheduled dates atomically.
pub fn record_inspection(
    conn: &Connection,
    inspection: &SafetyInspection,
    check: &SafetyCheck,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO safety_inspections (id, check_id, inspected_on, inspector, passed, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            inspection.id.to_string(),
            inspection.check_id.to_string(),
            inspection.inspected_on.to_string(),
            inspection.inspector,
            inspection.passed as i32,
            inspection.notes,
            fmt_datetime(&inspection.created_at),
        ],
    )?;
    let updated = tx.execute(
        "UPDATE safety_checks SET last_inspected = ?1, next_due = ?2 WHERE id = ?3",
        params![
            check.last_inspected.map(|d| d.to_string()),
            check.next_due.to_string(),
            check.id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("safety_check", check.id));
    }
    tx.commit()?;
    Ok(())
}

/// Inspection history for a check, newest first.
pub fn list_inspections(conn: &Connection, check_id: &Uuid) -> Result<Vec<SafetyInspection>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, check_id, inspected_on, inspector, passed, notes, created_at
         FROM safety_inspections WHERE check_id = ?1
         ORDER BY inspected_on DESC, created_at DESC",
    )?;
    let rows = stmt.query_map(params![check_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i32>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, check_id, inspected_on, inspector, passed, notes, created_at) = row?;
        out.push(SafetyInspection {
            id: parse_uuid(&id)?,
            check_id: parse_uuid(&check_id)?,
            inspected_on: parse_date(&inspected_on)?,
            inspector,
            passed: passed != 0,
            notes,
            created_at: parse_datetime(&created_at)?,
        });
    }
    Ok(out)
}

struct CheckRow {
    id: String,
    facility_id: String,
    category: String,
    item_name: String,
    frequency_days: i64,
    last_inspected: Option<String>,
    next_due: String,
    notes: Option<String>,
    created_at: String,
}

fn check_row(row: &Row<'_>) -> rusqlite::Result<CheckRow> {
    Ok(CheckRow {
        id: row.get(0)?,
        facility_id: row.get(1)?,
        category: row.get(2)?,
        item_name: row.get(3)?,
        frequency_days: row.get(4)?,
        last_inspected: row.get(5)?,
        next_due: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn check_from_row(row: CheckRow) -> Result<SafetyCheck, DatabaseError> {
    Ok(SafetyCheck {
        id: parse_uuid(&row.id)?,
        facility_id: parse_uuid(&row.facility_id)?,
        category: SafetyCategory::from_str(&row.category)?,
        item_name: row.item_name,
        frequency_days: row.frequency_days,
        last_inspected: parse_opt_date(row.last_inspected)?,
        next_due: parse_date(&row.next_due)?,
        notes: row.notes,
        created_at: parse_datetime(&row.created_at)?,
    })
}
