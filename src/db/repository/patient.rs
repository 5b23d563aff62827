use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

use super::{fmt_datetime, parse_date, parse_datetime, parse_uuid};

const PATIENT_COLUMNS: &str = "id, mrn, first_name, last_name, date_of_birth, sex, phone,
     program, status, diversion_risk_score, created_at, updated_at";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, mrn, first_name, last_name, date_of_birth, sex, phone,
         program, status, diversion_risk_score, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            patient.id.to_string(),
            patient.mrn,
            patient.first_name,
            patient.last_name,
            patient.date_of_birth.to_string(),
            patient.sex,
            patient.phone,
            patient.program.as_str(),
            patient.status.as_str(),
            patient.diversion_risk_score,
            fmt_datetime(&patient.created_at),
            fmt_datetime(&patient.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
            params![id.to_string()],
            patient_row,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

pub fn get_patient_by_mrn(conn: &Connection, mrn: &str) -> Result<Option<Patient>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE mrn = ?1"),
            params![mrn],
            patient_row,
        )
        .optional()?;
    row.map(patient_from_row).transpose()
}

/// Fetch a patient or fail with `NotFound`.
pub fn require_patient(conn: &Connection, id: &Uuid) -> Result<Patient, DatabaseError> {
    get_patient(conn, id)?.ok_or_else(|| DatabaseError::not_found("patient", id))
}

pub fn list_patients(conn: &Connection, filter: &PatientFilter) -> Result<Vec<Patient>, DatabaseError> {
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.to_lowercase()));

    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR program = ?2)
           AND (?3 IS NULL OR LOWER(first_name) LIKE ?3 OR LOWER(last_name) LIKE ?3
                OR LOWER(mrn) LIKE ?3)
         ORDER BY last_name, first_name"
    ))?;

    let rows = stmt.query_map(
        params![
            filter.status.map(|s| s.as_str()),
            filter.program.map(|p| p.as_str()),
            pattern,
        ],
        patient_row,
    )?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

pub fn update_risk_score(conn: &Connection, id: &Uuid, score: i32) -> Result<(), DatabaseError> {
    if !(0..=100).contains(&score) {
        return Err(DatabaseError::ConstraintViolation(format!(
            "diversion_risk_score must be within 0..=100, got {score}"
        )));
    }
    let updated = conn.execute(
        "UPDATE patients SET diversion_risk_score = ?1, updated_at = ?2 WHERE id = ?3",
        params![score, fmt_datetime(&crate::db::now()), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("patient", id));
    }
    Ok(())
}

// ── Addresses ──────────────────────────────────────────────

/// Insert an address. A new primary home address demotes the previous one
/// inside the same transaction, so a patient never has two.
pub fn insert_address(conn: &Connection, address: &PatientAddress) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    if address.is_primary && address.address_type == AddressType::Home {
        tx.execute(
            "UPDATE patient_addresses SET is_primary = 0
             WHERE patient_id = ?1 AND address_type = 'home' AND is_primary = 1",
            params![address.patient_id.to_string()],
        )?;
    }

    tx.execute(
        "INSERT INTO patient_addresses (id, patient_id, address_type, line1, city, state,
         postal_code, latitude, longitude, is_primary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            address.id.to_string(),
            address.patient_id.to_string(),
            address.address_type.as_str(),
            address.line1,
            address.city,
            address.state,
            address.postal_code,
            address.latitude,
            address.longitude,
            address.is_primary as i32,
            fmt_datetime(&address.created_at),
        ],
    )?;

    tx.commit()?;
    Ok(())
}

pub fn list_addresses(conn: &Connection, patient_id: &Uuid) -> Result<Vec<PatientAddress>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, address_type, line1, city, state, postal_code,
                latitude, longitude, is_primary, created_at
         FROM patient_addresses WHERE patient_id = ?1
         ORDER BY is_primary DESC, created_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], address_row)?;

    let mut addresses = Vec::new();
    for row in rows {
        addresses.push(address_from_row(row?)?);
    }
    Ok(addresses)
}

pub fn get_primary_home_address(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Option<PatientAddress>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, address_type, line1, city, state, postal_code,
                    latitude, longitude, is_primary, created_at
             FROM patient_addresses
             WHERE patient_id = ?1 AND address_type = 'home' AND is_primary = 1",
            params![patient_id.to_string()],
            address_row,
        )
        .optional()?;
    row.map(address_from_row).transpose()
}

// Internal row types

struct PatientRow {
    id: String,
    mrn: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    sex: String,
    phone: Option<String>,
    program: String,
    status: String,
    diversion_risk_score: i32,
    created_at: String,
    updated_at: String,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        mrn: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        date_of_birth: row.get(4)?,
        sex: row.get(5)?,
        phone: row.get(6)?,
        program: row.get(7)?,
        status: row.get(8)?,
        diversion_risk_score: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn patient_from_row(row: PatientRow) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&row.id)?,
        mrn: row.mrn,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: parse_date(&row.date_of_birth)?,
        sex: row.sex,
        phone: row.phone,
        program: Program::from_str(&row.program)?,
        status: PatientStatus::from_str(&row.status)?,
        diversion_risk_score: row.diversion_risk_score,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

struct AddressRow {
    id: String,
    patient_id: String,
    address_type: String,
    line1: String,
    city: String,
    state: String,
    postal_code: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_primary: i32,
    created_at: String,
}

fn address_row(row: &Row<'_>) -> rusqlite::Result<AddressRow> {
    Ok(AddressRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        address_type: row.get(2)?,
        line1: row.get(3)?,
        city: row.get(4)?,
        state: row.get(5)?,
        postal_code: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        is_primary: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn address_from_row(row: AddressRow) -> Result<PatientAddress, DatabaseError> {
    Ok(PatientAddress {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        address_type: AddressType::from_str(&row.address_type)?,
        line1: row.line1,
        city: row.city,
        state: row.state,
        postal_code: row.postal_code,
        latitude: row.latitude,
        longitude: row.longitude,
        is_primary: row.is_primary != 0,
        created_at: parse_datetime(&row.created_at)?,
    })
}
