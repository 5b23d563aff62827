use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::PmpRiskFlag;
use crate::models::{PmpCheck, PmpOverdueEntry};

use super::{fmt_datetime, parse_datetime, parse_opt_datetime, parse_uuid};

pub fn insert_pmp_check(conn: &Connection, check: &PmpCheck) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO pmp_checks (id, patient_id, state, checked_by, checked_at,
         prescriptions_found, distinct_prescribers, distinct_pharmacies,
         overlapping_controlled, risk_flag, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            check.id.to_string(),
            check.patient_id.to_string(),
            check.state,
            check.checked_by,
            fmt_datetime(&check.checked_at),
            check.prescriptions_found,
            check.distinct_prescribers,
            check.distinct_pharmacies,
            check.overlapping_controlled,
            check.risk_flag.as_str(),
            check.notes,
        ],
    )?;
    Ok(())
}

pub fn list_pmp_checks(conn: &Connection, patient_id: Option<&Uuid>) -> Result<Vec<PmpCheck>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, state, checked_by, checked_at, prescriptions_found,
                distinct_prescribers, distinct_pharmacies, overlapping_controlled, risk_flag, notes
         FROM pmp_checks
         WHERE (?1 IS NULL OR patient_id = ?1)
         ORDER BY checked_at DESC",
    )?;
    let rows = stmt.query_map(params![patient_id.map(|id| id.to_string())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i32>(5)?,
            row.get::<_, i32>(6)?,
            row.get::<_, i32>(7)?,
            row.get::<_, i32>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, Option<String>>(10)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, patient_id, state, checked_by, checked_at, found, prescribers, pharmacies, overlap, flag, notes) =
            row?;
        out.push(PmpCheck {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            state,
            checked_by,
            checked_at: parse_datetime(&checked_at)?,
            prescriptions_found: found,
            distinct_prescribers: prescribers,
            distinct_pharmacies: pharmacies,
            overlapping_controlled: overlap,
            risk_flag: PmpRiskFlag::from_str(&flag)?,
            notes,
        });
    }
    Ok(out)
}

/// Active patients whose most recent PMP check is older than `cutoff` or
/// who were never checked. Never-checked patients come first.
pub fn list_pmp_overdue(conn: &Connection, cutoff: NaiveDateTime) -> Result<Vec<PmpOverdueEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.mrn, p.first_name || ' ' || p.last_name, MAX(c.checked_at) AS last_checked
         FROM patients p
         LEFT JOIN pmp_checks c ON c.patient_id = p.id
         WHERE p.status = 'active'
         GROUP BY p.id
         HAVING last_checked IS NULL OR last_checked < ?1
         ORDER BY last_checked IS NOT NULL, last_checked, p.last_name",
    )?;
    let rows = stmt.query_map(params![fmt_datetime(&cutoff)], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, mrn, patient_name, last_checked) = row?;
        out.push(PmpOverdueEntry {
            patient_id: parse_uuid(&id)?,
            mrn,
            patient_name,
            last_checked_at: parse_opt_datetime(last_checked)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{make_patient, test_db};
    use chrono::Duration;

    fn check(patient_id: Uuid, checked_at: NaiveDateTime) -> PmpCheck {
        PmpCheck {
            id: Uuid::new_v4(),
            patient_id,
            state: "NY".into(),
            checked_by: "dr.ortiz".into(),
            checked_at,
            prescriptions_found: 1,
            distinct_prescribers: 1,
            distinct_pharmacies: 1,
            overlapping_controlled: 0,
            risk_flag: PmpRiskFlag::None,
            notes: None,
        }
    }

    #[test]
    fn overdue_lists_stale_and_unchecked_patients() {
        let conn = test_db();
        let now = crate::db::now();
        let fresh = make_patient(&conn, "MRN-F");
        let stale = make_patient(&conn, "MRN-S");
        let never = make_patient(&conn, "MRN-N");
        insert_pmp_check(&conn, &check(fresh.id, now - Duration::days(10))).unwrap();
        insert_pmp_check(&conn, &check(stale.id, now - Duration::days(200))).unwrap();

        let overdue = list_pmp_overdue(&conn, now - Duration::days(90)).unwrap();
        let ids: Vec<Uuid> = overdue.iter().map(|e| e.patient_id).collect();
        assert_eq!(ids, vec![never.id, stale.id]);
        assert!(overdue[0].last_checked_at.is_none());

        assert_eq!(list_pmp_checks(&conn, Some(&fresh.id)).unwrap().len(), 1);
        assert_eq!(list_pmp_checks(&conn, None).unwrap().len(), 2);
    }
}
