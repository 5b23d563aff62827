use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

use super::{fmt_datetime, guarded_update_miss, parse_date, parse_datetime, parse_uuid};

pub fn insert_otp_service(conn: &Connection, service: &OtpService) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO otp_services (id, patient_id, service_date, service_type, medication,
         recorded_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            service.id.to_string(),
            service.patient_id.to_string(),
            service.service_date.to_string(),
            service.service_type.as_str(),
            service.medication.map(|m| m.as_str()),
            service.recorded_by,
            fmt_datetime(&service.created_at),
        ],
    )?;
    Ok(())
}

/// Services for a patient within an inclusive date range, oldest first.
pub fn list_otp_services(
    conn: &Connection,
    patient_id: &Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<OtpService>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, service_date, service_type, medication, recorded_by, created_at
         FROM otp_services
         WHERE patient_id = ?1 AND service_date >= ?2 AND service_date <= ?3
         ORDER BY service_date, created_at",
    )?;
    let rows = stmt.query_map(
        params![patient_id.to_string(), from.to_string(), to.to_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    )?;

    let mut services = Vec::new();
    for row in rows {
        let (id, patient_id, service_date, service_type, medication, recorded_by, created_at) = row?;
        services.push(OtpService {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            service_date: parse_date(&service_date)?,
            service_type: OtpServiceType::from_str(&service_type)?,
            medication: medication.as_deref().map(OtpMedication::from_str).transpose()?,
            recorded_by,
            created_at: parse_datetime(&created_at)?,
        });
    }
    Ok(services)
}

/// Store a weekly claim and its lines atomically.
pub fn insert_otp_claim(conn: &Connection, claim: &OtpClaim) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO otp_claims (id, patient_id, week_start, billing_method, payer_type,
         total_cents, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            claim.id.to_string(),
            claim.patient_id.to_string(),
            claim.week_start.to_string(),
            claim.billing_method.as_str(),
            claim.payer_type.map(|p| p.as_str()),
            claim.total_cents,
            claim.status.as_str(),
            fmt_datetime(&claim.created_at),
            fmt_datetime(&claim.updated_at),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!(
                "a claim already exists for week starting {}",
                claim.week_start
            ))
        }
        other => DatabaseError::Sqlite(other),
    })?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO otp_claim_lines (claim_id, code, description, units, rate_cents, amount_cents)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for line in &claim.lines {
            stmt.execute(params![
                claim.id.to_string(),
                line.code,
                line.description,
                line.units,
                line.rate_cents,
                line.amount_cents,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn get_otp_claim(conn: &Connection, id: &Uuid) -> Result<Option<OtpClaim>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, patient_id, week_start, billing_method, payer_type, total_cents, status,
                    created_at, updated_at
             FROM otp_claims WHERE id = ?1",
            params![id.to_string()],
            claim_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(claim_from_row(conn, row)?)),
        None => Ok(None),
    }
}

pub fn list_otp_claims(conn: &Connection, filter: &OtpClaimFilter) -> Result<Vec<OtpClaim>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, week_start, billing_method, payer_type, total_cents, status,
                created_at, updated_at
         FROM otp_claims
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY week_start DESC",
    )?;
    let rows = stmt.query_map(
        params![
            filter.patient_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
        ],
        claim_row,
    )?;

    let mut claims = Vec::new();
    for row in rows {
        claims.push(claim_from_row(conn, row?)?);
    }
    Ok(claims)
}

pub fn update_otp_claim_status(
    conn: &Connection,
    id: &Uuid,
    previous: ClaimStatus,
    status: ClaimStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE otp_claims SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![
            status.as_str(),
            fmt_datetime(&crate::db::now()),
            id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(conn, "otp_claims", "otp_claim", id, previous.as_str()));
    }
    Ok(())
}

fn list_claim_lines(conn: &Connection, claim_id: &str) -> Result<Vec<ClaimLine>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT code, description, units, rate_cents, amount_cents
         FROM otp_claim_lines WHERE claim_id = ?1 ORDER BY id",
    )?;
    let lines = stmt
        .query_map(params![claim_id], |row| {
            Ok(ClaimLine {
                code: row.get(0)?,
                description: row.get(1)?,
                units: row.get(2)?,
                rate_cents: row.get(3)?,
                amount_cents: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines)
}

struct ClaimRow {
    id: String,
    patient_id: String,
    week_start: String,
    billing_method: String,
    payer_type: Option<String>,
    total_cents: i64,
    status: String,
    created_at: String,
    updated_at: String,
}

fn claim_row(row: &Row<'_>) -> rusqlite::Result<ClaimRow> {
    Ok(ClaimRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        week_start: row.get(2)?,
        billing_method: row.get(3)?,
        payer_type: row.get(4)?,
        total_cents: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn claim_from_row(conn: &Connection, row: ClaimRow) -> Result<OtpClaim, DatabaseError> {
    let lines = list_claim_lines(conn, &row.id)?;
    Ok(OtpClaim {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        week_start: parse_date(&row.week_start)?,
        billing_method: BillingMethod::from_str(&row.billing_method)?,
        payer_type: row.payer_type.as_deref().map(PayerType::from_str).transpose()?,
        lines,
        total_cents: row.total_cents,
        status: ClaimStatus::from_str(&row.status)?,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{make_patient, test_db};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn claim(patient_id: Uuid, week_start: NaiveDate) -> OtpClaim {
        let now = crate::db::now();
        OtpClaim {
            id: Uuid::new_v4(),
            patient_id,
            week_start,
            billing_method: BillingMethod::Bundle,
            payer_type: Some(PayerType::Medicare),
            lines: vec![ClaimLine {
                code: "G2067".into(),
                description: "Methadone weekly bundle".into(),
                units: 1,
                rate_cents: 22_000,
                amount_cents: 22_000,
            }],
            total_cents: 22_000,
            status: ClaimStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn services_filtered_by_date_range() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-S");
        for day in [3, 4, 11] {
            insert_otp_service(&conn, &OtpService {
                id: Uuid::new_v4(),
                patient_id: p.id,
                service_date: d(day),
                service_type: OtpServiceType::MedicationAdministration,
                medication: Some(OtpMedication::Methadone),
                recorded_by: "nurse".into(),
                created_at: crate::db::now(),
            })
            .unwrap();
        }
        let week = list_otp_services(&conn, &p.id, d(4), d(10)).unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].medication, Some(OtpMedication::Methadone));
    }

    #[test]
    fn claim_with_lines_round_trip() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-C");
        let c = claim(p.id, d(4));
        insert_otp_claim(&conn, &c).unwrap();

        let loaded = get_otp_claim(&conn, &c.id).unwrap().unwrap();
        assert_eq!(loaded.lines, c.lines);
        assert_eq!(loaded.billing_method, BillingMethod::Bundle);

        update_otp_claim_status(&conn, &c.id, ClaimStatus::Draft, ClaimStatus::Submitted).unwrap();
        // A second writer that also read the draft loses.
        let err = update_otp_claim_status(&conn, &c.id, ClaimStatus::Draft, ClaimStatus::Submitted).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        let submitted = list_otp_claims(&conn, &OtpClaimFilter {
            status: Some(ClaimStatus::Submitted),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(submitted.len(), 1);
    }

    #[test]
    fn second_claim_for_same_week_rejected() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-W");
        insert_otp_claim(&conn, &claim(p.id, d(4))).unwrap();
        let err = insert_otp_claim(&conn, &claim(p.id, d(4))).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }
}
