use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::DualClaimStatus;
use crate::models::DualEligibleClaim;

use super::{fmt_datetime, guarded_update_miss, parse_date, parse_datetime, parse_uuid};

const CLAIM_COLUMNS: &str = "id, patient_id, service_date, service_code, billed_cents, status,
     medicare_allowed_cents, medicare_paid_cents, medicaid_paid_cents,
     patient_responsibility_cents, created_at, updated_at";

pub fn insert_dual_claim(conn: &Connection, claim: &DualEligibleClaim) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dual_eligible_claims (id, patient_id, service_date, service_code,
         billed_cents, status, medicare_allowed_cents, medicare_paid_cents,
         medicaid_paid_cents, patient_responsibility_cents, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            claim.id.to_string(),
            claim.patient_id.to_string(),
            claim.service_date.to_string(),
            claim.service_code,
            claim.billed_cents,
            claim.status.as_str(),
            claim.medicare_allowed_cents,
            claim.medicare_paid_cents,
            claim.medicaid_paid_cents,
            claim.patient_responsibility_cents,
            fmt_datetime(&claim.created_at),
            fmt_datetime(&claim.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist the adjudication fields and status of an existing claim that is
/// still in `previous`.
pub fn update_dual_claim(
    conn: &Connection,
    claim: &DualEligibleClaim,
    previous: DualClaimStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE dual_eligible_claims SET status = ?1, medicare_allowed_cents = ?2,
         medicare_paid_cents = ?3, medicaid_paid_cents = ?4,
         patient_responsibility_cents = ?5, updated_at = ?6
         WHERE id = ?7 AND status = ?8",
        params![
            claim.status.as_str(),
            claim.medicare_allowed_cents,
            claim.medicare_paid_cents,
            claim.medicaid_paid_cents,
            claim.patient_responsibility_cents,
            fmt_datetime(&claim.updated_at),
            claim.id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(
            conn,
            "dual_eligible_claims",
            "dual_eligible_claim",
            &claim.id,
            previous.as_str(),
        ));
    }
    Ok(())
}

pub fn get_dual_claim(conn: &Connection, id: &Uuid) -> Result<Option<DualEligibleClaim>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {CLAIM_COLUMNS} FROM dual_eligible_claims WHERE id = ?1"),
            params![id.to_string()],
            claim_row,
        )
        .optional()?;
    row.map(claim_from_row).transpose()
}

pub fn list_dual_claims(
    conn: &Connection,
    patient_id: Option<&Uuid>,
    status: Option<DualClaimStatus>,
) -> Result<Vec<DualEligibleClaim>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CLAIM_COLUMNS} FROM dual_eligible_claims
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY service_date DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![patient_id.map(|id| id.to_string()), status.map(|s| s.as_str())],
        claim_row,
    )?;

    let mut claims = Vec::new();
    for row in rows {
        claims.push(claim_from_row(row?)?);
    }
    Ok(claims)
}

struct ClaimRow {
    id: String,
    patient_id: String,
    service_date: String,
    service_code: String,
    billed_cents: i64,
    status: String,
    medicare_allowed_cents: Option<i64>,
    medicare_paid_cents: Option<i64>,
    medicaid_paid_cents: Option<i64>,
    patient_responsibility_cents: Option<i64>,
    created_at: String,
    updated_at: String,
}

fn claim_row(row: &Row<'_>) -> rusqlite::Result<ClaimRow> {
    Ok(ClaimRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        service_date: row.get(2)?,
        service_code: row.get(3)?,
        billed_cents: row.get(4)?,
        status: row.get(5)?,
        medicare_allowed_cents: row.get(6)?,
        medicare_paid_cents: row.get(7)?,
        medicaid_paid_cents: row.get(8)?,
        patient_responsibility_cents: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn claim_from_row(row: ClaimRow) -> Result<DualEligibleClaim, DatabaseError> {
    Ok(DualEligibleClaim {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        service_date: parse_date(&row.service_date)?,
        service_code: row.service_code,
        billed_cents: row.billed_cents,
        status: DualClaimStatus::from_str(&row.status)?,
        medicare_allowed_cents: row.medicare_allowed_cents,
        medicare_paid_cents: row.medicare_paid_cents,
        medicaid_paid_cents: row.medicaid_paid_cents,
        patient_responsibility_cents: row.patient_responsibility_cents,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}
