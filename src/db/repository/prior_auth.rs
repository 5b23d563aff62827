use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::PriorAuthStatus;
use crate::models::{PriorAuthFilter, PriorAuthorization};

use super::{fmt_datetime, guarded_update_miss, parse_datetime, parse_opt_date, parse_opt_datetime, parse_opt_uuid, parse_uuid};

const AUTH_COLUMNS: &str = "id, patient_id, policy_id, service_code, service_description, status,
     auth_number, units_requested, units_approved, valid_from, valid_to, submitted_at,
     decided_at, notes, created_at, updated_at";

pub fn insert_prior_auth(conn: &Connection, auth: &PriorAuthorization) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO prior_authorizations (id, patient_id, policy_id, service_code,
         service_description, status, auth_number, units_requested, units_approved,
         valid_from, valid_to, submitted_at, decided_at, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            auth.id.to_string(),
            auth.patient_id.to_string(),
            auth.policy_id.map(|id| id.to_string()),
            auth.service_code,
            auth.service_description,
            auth.status.as_str(),
            auth.auth_number,
            auth.units_requested,
            auth.units_approved,
            auth.valid_from.map(|d| d.to_string()),
            auth.valid_to.map(|d| d.to_string()),
            auth.submitted_at.as_ref().map(fmt_datetime),
            auth.decided_at.as_ref().map(fmt_datetime),
            auth.notes,
            fmt_datetime(&auth.created_at),
            fmt_datetime(&auth.updated_at),
        ],
    )?;
    Ok(())
}

/// Persist the workflow fields of an authorization that is still in `previous`.
pub fn update_prior_auth(
    conn: &Connection,
    auth: &PriorAuthorization,
    previous: PriorAuthStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE prior_authorizations SET status = ?1, auth_number = ?2, units_approved = ?3,
         valid_from = ?4, valid_to = ?5, submitted_at = ?6, decided_at = ?7, notes = ?8,
         updated_at = ?9
         WHERE id = ?10 AND status = ?11",
        params![
            auth.status.as_str(),
            auth.auth_number,
            auth.units_approved,
            auth.valid_from.map(|d| d.to_string()),
            auth.valid_to.map(|d| d.to_string()),
            auth.submitted_at.as_ref().map(fmt_datetime),
            auth.decided_at.as_ref().map(fmt_datetime),
            auth.notes,
            fmt_datetime(&auth.updated_at),
            auth.id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(
            conn,
            "prior_authorizations",
            "prior_authorization",
            &auth.id,
            previous.as_str(),
        ));
    }
    Ok(())
}

pub fn get_prior_auth(conn: &Connection, id: &Uuid) -> Result<Option<PriorAuthorization>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {AUTH_COLUMNS} FROM prior_authorizations WHERE id = ?1"),
            params![id.to_string()],
            auth_row,
        )
        .optional()?;
    row.map(auth_from_row).transpose()
}

pub fn list_prior_auths(
    conn: &Connection,
    filter: &PriorAuthFilter,
) -> Result<Vec<PriorAuthorization>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUTH_COLUMNS} FROM prior_authorizations
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.patient_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
        ],
        auth_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(auth_from_row(row?)?);
    }
    Ok(out)
}

/// Approved authorizations whose validity ends within `[from, until]`,
/// soonest expiry first.
pub fn list_approved_expiring(
    conn: &Connection,
    from: NaiveDate,
    until: NaiveDate,
) -> Result<Vec<PriorAuthorization>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {AUTH_COLUMNS} FROM prior_authorizations
         WHERE status = 'approved' AND valid_to IS NOT NULL
           AND valid_to >= ?1 AND valid_to <= ?2
         ORDER BY valid_to, created_at"
    ))?;
    let rows = stmt.query_map(params![from.to_string(), until.to_string()], auth_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(auth_from_row(row?)?);
    }
    Ok(out)
}

struct AuthRow {
    id: String,
    patient_id: String,
    policy_id: Option<String>,
    service_code: String,
    service_description: String,
    status: String,
    auth_number: Option<String>,
    units_requested: i32,
    units_approved: Option<i32>,
    valid_from: Option<String>,
    valid_to: Option<String>,
    submitted_at: Option<String>,
    decided_at: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

fn auth_row(row: &Row<'_>) -> rusqlite::Result<AuthRow> {
    Ok(AuthRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        policy_id: row.get(2)?,
        service_code: row.get(3)?,
        service_description: row.get(4)?,
        status: row.get(5)?,
        auth_number: row.get(6)?,
        units_requested: row.get(7)?,
        units_approved: row.get(8)?,
        valid_from: row.get(9)?,
        valid_to: row.get(10)?,
        submitted_at: row.get(11)?,
        decided_at: row.get(12)?,
        notes: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn auth_from_row(row: AuthRow) -> Result<PriorAuthorization, DatabaseError> {
    Ok(PriorAuthorization {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        policy_id: parse_opt_uuid(row.policy_id)?,
        service_code: row.service_code,
        service_description: row.service_description,
        status: PriorAuthStatus::from_str(&row.status)?,
        auth_number: row.auth_number,
        units_requested: row.units_requested,
        units_approved: row.units_approved,
        valid_from: parse_opt_date(row.valid_from)?,
        valid_to: parse_opt_date(row.valid_to)?,
        submitted_at: parse_opt_datetime(row.submitted_at)?,
        decided_at: parse_opt_datetime(row.decided_at)?,
        notes: row.notes,
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{make_patient, test_db};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn auth(patient_id: Uuid) -> PriorAuthorization {
        let now = crate::db::now();
        PriorAuthorization {
            id: Uuid::new_v4(),
            patient_id,
            policy_id: None,
            service_code: "J0571".into(),
            service_description: "Buprenorphine oral".into(),
            status: PriorAuthStatus::Draft,
            auth_number: None,
            units_requested: 30,
            units_approved: None,
            valid_from: None,
            valid_to: None,
            submitted_at: None,
            decided_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn approved_window_drives_expiring_query() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-PA");
        let mut a = auth(p.id);
        insert_prior_auth(&conn, &a).unwrap();
        insert_prior_auth(&conn, &auth(p.id)).unwrap();

        a.status = PriorAuthStatus::Approved;
        a.auth_number = Some("PA-123".into());
        a.valid_from = Some(d(1, 1));
        a.valid_to = Some(d(6, 20));
        update_prior_auth(&conn, &a, PriorAuthStatus::Draft).unwrap();

        let expiring = list_approved_expiring(&conn, d(6, 1), d(7, 1)).unwrap();
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring[0].auth_number.as_deref(), Some("PA-123"));
        assert!(list_approved_expiring(&conn, d(6, 21), d(7, 1)).unwrap().is_empty());

        let drafts = list_prior_auths(&conn, &PriorAuthFilter {
            status: Some(PriorAuthStatus::Draft),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(drafts.len(), 1);
    }
}
