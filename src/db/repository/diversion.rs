use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{BiometricType, VerificationOutcome};
use crate::models::{BiometricEnrollment, ComplianceAlert, DiversionVerification};

use super::{fmt_datetime, insert_compliance_alert, parse_datetime, parse_opt_uuid, parse_uuid};

/// Store an enrollment, deactivating any active enrollment of the same
/// biometric type for the patient first.
pub fn replace_enrollment(conn: &Connection, enrollment: &BiometricEnrollment) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE patient_biometric_enrollment SET active = 0
         WHERE patient_id = ?1 AND biometric_type = ?2 AND active = 1",
        params![enrollment.patient_id.to_string(), enrollment.biometric_type.as_str()],
    )?;
    tx.execute(
        "INSERT INTO patient_biometric_enrollment (id, patient_id, biometric_type, template_hash,
         enrolled_by, enrolled_at, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            enrollment.id.to_string(),
            enrollment.patient_id.to_string(),
            enrollment.biometric_type.as_str(),
            enrollment.template_hash,
            enrollment.enrolled_by,
            fmt_datetime(&enrollment.enrolled_at),
            enrollment.active as i32,
        ],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn get_active_enrollment(
    conn: &Connection,
    patient_id: &Uuid,
    biometric_type: BiometricType,
) -> Result<Option<BiometricEnrollment>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, biometric_type, template_hash, enrolled_by, enrolled_at, active
             FROM patient_biometric_enrollment
             WHERE patient_id = ?1 AND biometric_type = ?2 AND active = 1",
            params![patient_id.to_string(), biometric_type.as_str()],
            enrollment_row,
        )
        .optional()?;
    row.map(enrollment_from_row).transpose()
}

/// Every enrollment for a patient, active ones first.
pub fn list_enrollments(conn: &Connection, patient_id: &Uuid) -> Result<Vec<BiometricEnrollment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, biometric_type, template_hash, enrolled_by, enrolled_at, active
         FROM patient_biometric_enrollment WHERE patient_id = ?1
         ORDER BY active DESC, enrolled_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.to_string()], enrollment_row)?;

    let mut out = Vec::new();
    for row in rows {
        out.push(enrollment_from_row(row?)?);
    }
    Ok(out)
}

/// Record a verification attempt and, for failures, the compliance alert
/// it raised.
pub fn insert_verification(
    conn: &Connection,
    verification: &DiversionVerification,
    alert: Option<&ComplianceAlert>,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO diversion_verifications (id, patient_id, kit_id, biometric_type, match_score,
         latitude, longitude, distance_m, exception_id, outcome, verified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            verification.id.to_string(),
            verification.patient_id.to_string(),
            verification.kit_id.map(|id| id.to_string()),
            verification.biometric_type.as_str(),
            verification.match_score,
            verification.latitude,
            verification.longitude,
            verification.distance_m,
            verification.exception_id.map(|id| id.to_string()),
            verification.outcome.as_str(),
            fmt_datetime(&verification.verified_at),
        ],
    )?;
    if let Some(alert) = alert {
        insert_compliance_alert(&tx, alert)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn list_verifications(
    conn: &Connection,
    patient_id: Option<&Uuid>,
    outcome: Option<VerificationOutcome>,
) -> Result<Vec<DiversionVerification>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, kit_id, biometric_type, match_score, latitude, longitude,
                distance_m, exception_id, outcome, verified_at
         FROM diversion_verifications
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR outcome = ?2)
         ORDER BY verified_at DESC",
    )?;
    let rows = stmt.query_map(
        params![patient_id.map(|id| id.to_string()), outcome.map(|o| o.as_str())],
        verification_row,
    )?;

    let mut out = Vec::new();
    for row in rows {
        out.push(verification_from_row(row?)?);
    }
    Ok(out)
}

type EnrollmentRow = (String, String, String, String, String, String, bool);

fn enrollment_row(row: &Row<'_>) -> rusqlite::Result<EnrollmentRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get::<_, i32>(6)? != 0,
    ))
}

fn enrollment_from_row(row: EnrollmentRow) -> Result<BiometricEnrollment, DatabaseError> {
    let (id, patient_id, biometric_type, template_hash, enrolled_by, enrolled_at, active) = row;
    Ok(BiometricEnrollment {
        id: parse_uuid(&id)?,
        patient_id: parse_uuid(&patient_id)?,
        biometric_type: BiometricType::from_str(&biometric_type)?,
        template_hash,
        enrolled_by,
        enrolled_at: parse_datetime(&enrolled_at)?,
        active,
    })
}

struct VerificationRow {
    id: String,
    patient_id: String,
    kit_id: Option<String>,
    biometric_type: String,
    match_score: f64,
    latitude: f64,
    longitude: f64,
    distance_m: Option<f64>,
    exception_id: Option<String>,
    outcome: String,
    verified_at: String,
}

fn verification_row(row: &Row<'_>) -> rusqlite::Result<VerificationRow> {
    Ok(VerificationRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        kit_id: row.get(2)?,
        biometric_type: row.get(3)?,
        match_score: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        distance_m: row.get(7)?,
        exception_id: row.get(8)?,
        outcome: row.get(9)?,
        verified_at: row.get(10)?,
    })
}

fn verification_from_row(row: VerificationRow) -> Result<DiversionVerification, DatabaseError> {
    Ok(DiversionVerification {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        kit_id: parse_opt_uuid(row.kit_id)?,
        biometric_type: BiometricType::from_str(&row.biometric_type)?,
        match_score: row.match_score,
        latitude: row.latitude,
        longitude: row.longitude,
        distance_m: row.distance_m,
        exception_id: parse_opt_uuid(row.exception_id)?,
        outcome: VerificationOutcome::from_str(&row.outcome)?,
        verified_at: parse_datetime(&row.verified_at)?,
    })
}
