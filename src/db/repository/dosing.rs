use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

use super::{
    fmt_datetime, guarded_update_miss, parse_date, parse_datetime, parse_opt_datetime, parse_opt_uuid, parse_uuid,
};

const KIT_COLUMNS: &str = "id, kit_number, patient_id, medication, dose_mg, doses_count, status,
     prepared_by, prepared_at, dispensed_at, returned_at";

const ALERT_COLUMNS: &str = "id, patient_id, kit_id, alert_type, severity, message, status,
     created_at, resolved_at, resolved_by";

// ── Kits ───────────────────────────────────────────────────

/// Insert a freshly prepared kit together with its `prepared` log entry.
pub fn insert_kit(conn: &Connection, kit: &MedicationKit, log: &DispensingLog) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO medication_kits (id, kit_number, patient_id, medication, dose_mg,
         doses_count, status, prepared_by, prepared_at, dispensed_at, returned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            kit.id.to_string(),
            kit.kit_number,
            kit.patient_id.to_string(),
            kit.medication.as_str(),
            kit.dose_mg,
            kit.doses_count,
            kit.status.as_str(),
            kit.prepared_by,
            fmt_datetime(&kit.prepared_at),
            kit.dispensed_at.as_ref().map(fmt_datetime),
            kit.returned_at.as_ref().map(fmt_datetime),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DatabaseError::ConstraintViolation(format!("kit number {} already in use", kit.kit_number))
        }
        other => DatabaseError::Sqlite(other),
    })?;
    insert_log_in(&tx, log)?;
    tx.commit()?;
    Ok(())
}

/// Apply a kit state change: the kit row, its log entry and an optional
/// compliance alert are written in one transaction. The row is only updated
/// while it still has the `previous` status the change was checked against.
pub fn record_kit_transition(
    conn: &Connection,
    kit: &MedicationKit,
    previous: KitStatus,
    log: &DispensingLog,
    alert: Option<&ComplianceAlert>,
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let updated = tx.execute(
        "UPDATE medication_kits SET status = ?1, dispensed_at = ?2, returned_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            kit.status.as_str(),
            kit.dispensed_at.as_ref().map(fmt_datetime),
            kit.returned_at.as_ref().map(fmt_datetime),
            kit.id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(&tx, "medication_kits", "medication_kit", &kit.id, previous.as_str()));
    }
    insert_log_in(&tx, log)?;
    if let Some(alert) = alert {
        insert_compliance_alert(&tx, alert)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn get_kit(conn: &Connection, id: &Uuid) -> Result<Option<MedicationKit>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {KIT_COLUMNS} FROM medication_kits WHERE id = ?1"),
            params![id.to_string()],
            kit_row,
        )
        .optional()?;
    row.map(kit_from_row).transpose()
}

pub fn list_kits(conn: &Connection, filter: &KitFilter) -> Result<Vec<MedicationKit>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {KIT_COLUMNS} FROM medication_kits
         WHERE (?1 IS NULL OR patient_id = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY prepared_at DESC, kit_number"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.patient_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
        ],
        kit_row,
    )?;

    let mut kits = Vec::new();
    for row in rows {
        kits.push(kit_from_row(row?)?);
    }
    Ok(kits)
}

pub fn list_dispensing_logs(conn: &Connection, kit_id: &Uuid) -> Result<Vec<DispensingLog>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, kit_id, patient_id, action, performed_by, notes, logged_at
         FROM dispensing_logs WHERE kit_id = ?1 ORDER BY logged_at, rowid",
    )?;
    let rows = stmt.query_map(params![kit_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut logs = Vec::new();
    for row in rows {
        let (id, kit_id, patient_id, action, performed_by, notes, logged_at) = row?;
        logs.push(DispensingLog {
            id: parse_uuid(&id)?,
            kit_id: parse_uuid(&kit_id)?,
            patient_id: parse_uuid(&patient_id)?,
            action: DispensingAction::from_str(&action)?,
            performed_by,
            notes,
            logged_at: parse_datetime(&logged_at)?,
        });
    }
    Ok(logs)
}

fn insert_log_in(conn: &Connection, log: &DispensingLog) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO dispensing_logs (id, kit_id, patient_id, action, performed_by, notes, logged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            log.id.to_string(),
            log.kit_id.to_string(),
            log.patient_id.to_string(),
            log.action.as_str(),
            log.performed_by,
            log.notes,
            fmt_datetime(&log.logged_at),
        ],
    )?;
    Ok(())
}

struct KitRow {
    id: String,
    kit_number: String,
    patient_id: String,
    medication: String,
    dose_mg: f64,
    doses_count: i32,
    status: String,
    prepared_by: String,
    prepared_at: String,
    dispensed_at: Option<String>,
    returned_at: Option<String>,
}

fn kit_row(row: &Row<'_>) -> rusqlite::Result<KitRow> {
    Ok(KitRow {
        id: row.get(0)?,
        kit_number: row.get(1)?,
        patient_id: row.get(2)?,
        medication: row.get(3)?,
        dose_mg: row.get(4)?,
        doses_count: row.get(5)?,
        status: row.get(6)?,
        prepared_by: row.get(7)?,
        prepared_at: row.get(8)?,
        dispensed_at: row.get(9)?,
        returned_at: row.get(10)?,
    })
}

fn kit_from_row(row: KitRow) -> Result<MedicationKit, DatabaseError> {
    Ok(MedicationKit {
        id: parse_uuid(&row.id)?,
        kit_number: row.kit_number,
        patient_id: parse_uuid(&row.patient_id)?,
        medication: OtpMedication::from_str(&row.medication)?,
        dose_mg: row.dose_mg,
        doses_count: row.doses_count,
        status: KitStatus::from_str(&row.status)?,
        prepared_by: row.prepared_by,
        prepared_at: parse_datetime(&row.prepared_at)?,
        dispensed_at: parse_opt_datetime(row.dispensed_at)?,
        returned_at: parse_opt_datetime(row.returned_at)?,
    })
}

// ── Compliance alerts ──────────────────────────────────────

pub fn insert_compliance_alert(conn: &Connection, alert: &ComplianceAlert) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO takehome_compliance_alerts (id, patient_id, kit_id, alert_type, severity,
         message, status, created_at, resolved_at, resolved_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            alert.id.to_string(),
            alert.patient_id.to_string(),
            alert.kit_id.map(|id| id.to_string()),
            alert.alert_type.as_str(),
            alert.severity.as_str(),
            alert.message,
            alert.status.as_str(),
            fmt_datetime(&alert.created_at),
            alert.resolved_at.as_ref().map(fmt_datetime),
            alert.resolved_by,
        ],
    )?;
    Ok(())
}

pub fn get_compliance_alert(conn: &Connection, id: &Uuid) -> Result<Option<ComplianceAlert>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM takehome_compliance_alerts WHERE id = ?1"),
            params![id.to_string()],
            alert_row,
        )
        .optional()?;
    row.map(alert_from_row).transpose()
}

/// Alerts matching the filter, most severe first, then newest.
pub fn list_compliance_alerts(
    conn: &Connection,
    filter: &ComplianceAlertFilter,
) -> Result<Vec<ComplianceAlert>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ALERT_COLUMNS} FROM takehome_compliance_alerts
         WHERE (?1 IS NULL OR patient_id = ?1)
           AND (?2 IS NULL OR status = ?2)
           AND (?3 IS NULL OR severity = ?3)
         ORDER BY CASE severity
                    WHEN 'critical' THEN 0 WHEN 'high' THEN 1
                    WHEN 'medium' THEN 2 ELSE 3 END,
                  created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.patient_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
            filter.severity.map(|s| s.as_str()),
        ],
        alert_row,
    )?;

    let mut alerts = Vec::new();
    for row in rows {
        alerts.push(alert_from_row(row?)?);
    }
    Ok(alerts)
}

pub fn update_compliance_alert_status(
    conn: &Connection,
    id: &Uuid,
    previous: ComplianceAlertStatus,
    status: ComplianceAlertStatus,
    resolved_at: Option<NaiveDateTime>,
    resolved_by: Option<&str>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE takehome_compliance_alerts SET status = ?1, resolved_at = ?2, resolved_by = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            status.as_str(),
            resolved_at.as_ref().map(fmt_datetime),
            resolved_by,
            id.to_string(),
            previous.as_str(),
        ],
    )?;
    if updated == 0 {
        return Err(guarded_update_miss(
            conn,
            "takehome_compliance_alerts",
            "compliance_alert",
            id,
            previous.as_str(),
        ));
    }
    Ok(())
}

struct AlertRow {
    id: String,
    patient_id: String,
    kit_id: Option<String>,
    alert_type: String,
    severity: String,
    message: String,
    status: String,
    created_at: String,
    resolved_at: Option<String>,
    resolved_by: Option<String>,
}

fn alert_row(row: &Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        kit_id: row.get(2)?,
        alert_type: row.get(3)?,
        severity: row.get(4)?,
        message: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
        resolved_at: row.get(8)?,
        resolved_by: row.get(9)?,
    })
}

fn alert_from_row(row: AlertRow) -> Result<ComplianceAlert, DatabaseError> {
    Ok(ComplianceAlert {
        id: parse_uuid(&row.id)?,
        patient_id: parse_uuid(&row.patient_id)?,
        kit_id: parse_opt_uuid(row.kit_id)?,
        alert_type: ComplianceAlertType::from_str(&row.alert_type)?,
        severity: AlertSeverity::from_str(&row.severity)?,
        message: row.message,
        status: ComplianceAlertStatus::from_str(&row.status)?,
        created_at: parse_datetime(&row.created_at)?,
        resolved_at: parse_opt_datetime(row.resolved_at)?,
        resolved_by: row.resolved_by,
    })
}

// ── Location exceptions ────────────────────────────────────

pub fn insert_location_exception(conn: &Connection, exc: &LocationException) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO location_exceptions (id, patient_id, reason, latitude, longitude, radius_m,
         start_date, end_date, approved_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            exc.id.to_string(),
            exc.patient_id.to_string(),
            exc.reason,
            exc.latitude,
            exc.longitude,
            exc.radius_m,
            exc.start_date.to_string(),
            exc.end_date.to_string(),
            exc.approved_by,
            fmt_datetime(&exc.created_at),
        ],
    )?;
    Ok(())
}

/// Exceptions for a patient; with `active_on`, only those whose window
/// contains that date.
pub fn list_location_exceptions(
    conn: &Connection,
    patient_id: Option<&Uuid>,
    active_on: Option<NaiveDate>,
) -> Result<Vec<LocationException>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, reason, latitude, longitude, radius_m, start_date, end_date,
                approved_by, created_at
         FROM location_exceptions
         WHERE (?1 IS NULL OR patient_id = ?1)
           AND (?2 IS NULL OR (start_date <= ?2 AND end_date >= ?2))
         ORDER BY start_date, created_at",
    )?;
    let rows = stmt.query_map(
        params![
            patient_id.map(|id| id.to_string()),
            active_on.map(|d| d.to_string()),
        ],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        let (id, patient_id, reason, latitude, longitude, radius_m, start, end, approved_by, created_at) =
            row?;
        out.push(LocationException {
            id: parse_uuid(&id)?,
            patient_id: parse_uuid(&patient_id)?,
            reason,
            latitude,
            longitude,
            radius_m,
            start_date: parse_date(&start)?,
            end_date: parse_date(&end)?,
            approved_by,
            created_at: parse_datetime(&created_at)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::{make_patient, test_db};

    fn kit(patient_id: Uuid, number: &str) -> MedicationKit {
        MedicationKit {
            id: Uuid::new_v4(),
            kit_number: number.into(),
            patient_id,
            medication: OtpMedication::Methadone,
            dose_mg: 80.0,
            doses_count: 6,
            status: KitStatus::Prepared,
            prepared_by: "rn.lee".into(),
            prepared_at: crate::db::now(),
            dispensed_at: None,
            returned_at: None,
        }
    }

    fn log(kit: &MedicationKit, action: DispensingAction) -> DispensingLog {
        DispensingLog {
            id: Uuid::new_v4(),
            kit_id: kit.id,
            patient_id: kit.patient_id,
            action,
            performed_by: "rn.lee".into(),
            notes: None,
            logged_at: crate::db::now(),
        }
    }

    #[test]
    fn kit_transition_writes_log_and_alert() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-K");
        let mut k = kit(p.id, "K-001");
        insert_kit(&conn, &k, &log(&k, DispensingAction::Prepared)).unwrap();

        k.status = KitStatus::Lost;
        let alert = ComplianceAlert {
            id: Uuid::new_v4(),
            patient_id: p.id,
            kit_id: Some(k.id),
            alert_type: ComplianceAlertType::LostKit,
            severity: AlertSeverity::High,
            message: "Kit K-001 reported lost".into(),
            status: ComplianceAlertStatus::Open,
            created_at: crate::db::now(),
            resolved_at: None,
            resolved_by: None,
        };
        record_kit_transition(&conn, &k, KitStatus::Prepared, &log(&k, DispensingAction::ReportedLost), Some(&alert)).unwrap();

        let loaded = get_kit(&conn, &k.id).unwrap().unwrap();
        assert_eq!(loaded.status, KitStatus::Lost);
        let logs = list_dispensing_logs(&conn, &k.id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].action, DispensingAction::ReportedLost);

        let open = list_compliance_alerts(&conn, &ComplianceAlertFilter {
            status: Some(ComplianceAlertStatus::Open),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].kit_id, Some(k.id));
    }

    #[test]
    fn stale_kit_transition_is_rejected() {
        use crate::dosing::{apply_kit_event, KitEvent};

        let conn = test_db();
        let p = make_patient(&conn, "MRN-K3");
        let k = kit(p.id, "K-042");
        insert_kit(&conn, &k, &log(&k, DispensingAction::Prepared)).unwrap();

        // Two copies read while the kit was still prepared.
        let mut first = get_kit(&conn, &k.id).unwrap().unwrap();
        let mut second = first.clone();
        let now = crate::db::now();

        let dispense = apply_kit_event(&mut first, KitEvent::Dispense, "rn.lee", None, now).unwrap();
        record_kit_transition(&conn, &first, KitStatus::Prepared, &dispense.log, None).unwrap();

        let lost = apply_kit_event(&mut second, KitEvent::ReportLost, "rn.kim", None, now).unwrap();
        let err = record_kit_transition(&conn, &second, KitStatus::Prepared, &lost.log, lost.alert.as_ref())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));

        let loaded = get_kit(&conn, &k.id).unwrap().unwrap();
        assert_eq!(loaded.status, KitStatus::Dispensed);
        assert!(loaded.dispensed_at.is_some());
        let actions: Vec<_> = list_dispensing_logs(&conn, &k.id)
            .unwrap()
            .into_iter()
            .map(|l| l.action)
            .collect();
        assert_eq!(actions, vec![DispensingAction::Prepared, DispensingAction::Dispensed]);
        assert!(list_compliance_alerts(&conn, &ComplianceAlertFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn transition_on_missing_kit_is_not_found() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-K4");
        let k = kit(p.id, "K-404");
        let err = record_kit_transition(&conn, &k, KitStatus::Prepared, &log(&k, DispensingAction::Dispensed), None)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn duplicate_kit_number_is_constraint_violation() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-K2");
        let a = kit(p.id, "K-9");
        insert_kit(&conn, &a, &log(&a, DispensingAction::Prepared)).unwrap();
        let b = kit(p.id, "K-9");
        let err = insert_kit(&conn, &b, &log(&b, DispensingAction::Prepared)).unwrap_err();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
        // The failed insert must not leave an orphan log behind.
        assert!(list_dispensing_logs(&conn, &b.id).unwrap().is_empty());
    }

    #[test]
    fn exceptions_filtered_by_active_date() {
        let conn = test_db();
        let p = make_patient(&conn, "MRN-X");
        insert_location_exception(&conn, &LocationException {
            id: Uuid::new_v4(),
            patient_id: p.id,
            reason: "Family visit".into(),
            latitude: 40.0,
            longitude: -75.0,
            radius_m: 300.0,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
            approved_by: "dr.ortiz".into(),
            created_at: crate::db::now(),
        })
        .unwrap();

        let inside = NaiveDate::from_ymd_opt(2024, 6, 7).unwrap();
        let outside = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        assert_eq!(list_location_exceptions(&conn, Some(&p.id), Some(inside)).unwrap().len(), 1);
        assert!(list_location_exceptions(&conn, Some(&p.id), Some(outside)).unwrap().is_empty());
        assert_eq!(list_location_exceptions(&conn, None, None).unwrap().len(), 1);
    }
}
