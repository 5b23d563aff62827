//! Off-site (take-home) dosing logistics: kit lifecycle, dispensing log
//! entries and the compliance alerts raised along the way.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::models::enums::*;
use crate::models::{ComplianceAlert, DispensingLog, LocationException, MedicationKit};
use crate::workflow::TransitionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KitEvent {
    Dispense,
    Return,
    ReportLost,
}

impl KitEvent {
    fn target(self) -> KitStatus {
        match self {
            KitEvent::Dispense => KitStatus::Dispensed,
            KitEvent::Return => KitStatus::Returned,
            KitEvent::ReportLost => KitStatus::Lost,
        }
    }

    fn action(self) -> DispensingAction {
        match self {
            KitEvent::Dispense => DispensingAction::Dispensed,
            KitEvent::Return => DispensingAction::Returned,
            KitEvent::ReportLost => DispensingAction::ReportedLost,
        }
    }
}

/// Records produced by a kit state change, written together.
#[derive(Debug, Clone)]
pub struct KitTransition {
    pub log: DispensingLog,
    pub alert: Option<ComplianceAlert>,
}

fn log_entry(
    kit: &MedicationKit,
    action: DispensingAction,
    performed_by: &str,
    notes: Option<String>,
    now: NaiveDateTime,
) -> DispensingLog {
    DispensingLog {
        id: Uuid::new_v4(),
        kit_id: kit.id,
        patient_id: kit.patient_id,
        action,
        performed_by: performed_by.to_string(),
        notes,
        logged_at: now,
    }
}

/// Build a new prepared kit and its opening log entry.
pub fn prepare_kit(
    kit_number: &str,
    patient_id: Uuid,
    medication: OtpMedication,
    dose_mg: f64,
    doses_count: i32,
    prepared_by: &str,
    now: NaiveDateTime,
) -> Result<(MedicationKit, DispensingLog), TransitionError> {
    if kit_number.trim().is_empty() {
        return Err(TransitionError::InvalidInput("kit_number is required".into()));
    }
    if doses_count <= 0 || !(dose_mg > 0.0) {
        return Err(TransitionError::InvalidInput(
            "dose_mg and doses_count must be positive".into(),
        ));
    }
    let kit = MedicationKit {
        id: Uuid::new_v4(),
        kit_number: kit_number.trim().to_string(),
        patient_id,
        medication,
        dose_mg,
        doses_count,
        status: KitStatus::Prepared,
        prepared_by: prepared_by.to_string(),
        prepared_at: now,
        dispensed_at: None,
        returned_at: None,
    };
    let log = log_entry(&kit, DispensingAction::Prepared, prepared_by, None, now);
    Ok((kit, log))
}

/// Apply an event to a kit: `prepared → dispensed → returned`, and `lost`
/// from `prepared` or `dispensed`. A lost kit opens a high-severity alert.
pub fn apply_kit_event(
    kit: &mut MedicationKit,
    event: KitEvent,
    performed_by: &str,
    notes: Option<String>,
    now: NaiveDateTime,
) -> Result<KitTransition, TransitionError> {
    let allowed = matches!(
        (kit.status, event),
        (KitStatus::Prepared, KitEvent::Dispense)
            | (KitStatus::Dispensed, KitEvent::Return)
            | (KitStatus::Prepared, KitEvent::ReportLost)
            | (KitStatus::Dispensed, KitEvent::ReportLost)
    );
    if !allowed {
        return Err(TransitionError::invalid("kit", kit.status, event.target()));
    }

    kit.status = event.target();
    match event {
        KitEvent::Dispense => kit.dispensed_at = Some(now),
        KitEvent::Return => kit.returned_at = Some(now),
        KitEvent::ReportLost => {}
    }

    let alert = (event == KitEvent::ReportLost).then(|| ComplianceAlert {
        id: Uuid::new_v4(),
        patient_id: kit.patient_id,
        kit_id: Some(kit.id),
        alert_type: ComplianceAlertType::LostKit,
        severity: AlertSeverity::High,
        message: format!("Take-home kit {} reported lost", kit.kit_number),
        status: ComplianceAlertStatus::Open,
        created_at: now,
        resolved_at: None,
        resolved_by: None,
    });

    Ok(KitTransition {
        log: log_entry(kit, event.action(), performed_by, notes, now),
        alert,
    })
}

// ═══════════════════════════════════════════
// Compliance alerts
// ═══════════════════════════════════════════

pub fn acknowledge_alert(alert: &mut ComplianceAlert) -> Result<(), TransitionError> {
    if alert.status != ComplianceAlertStatus::Open {
        return Err(TransitionError::invalid(
            "compliance alert",
            alert.status,
            ComplianceAlertStatus::Acknowledged,
        ));
    }
    alert.status = ComplianceAlertStatus::Acknowledged;
    Ok(())
}

pub fn resolve_alert(alert: &mut ComplianceAlert, resolved_by: &str, now: NaiveDateTime) -> Result<(), TransitionError> {
    if alert.status == ComplianceAlertStatus::Resolved {
        return Err(TransitionError::invalid(
            "compliance alert",
            alert.status,
            ComplianceAlertStatus::Resolved,
        ));
    }
    alert.status = ComplianceAlertStatus::Resolved;
    alert.resolved_at = Some(now);
    alert.resolved_by = Some(resolved_by.to_string());
    Ok(())
}

// ═══════════════════════════════════════════
// Location exceptions
// ═══════════════════════════════════════════

pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), TransitionError> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(TransitionError::InvalidInput(format!(
            "coordinates ({latitude}, {longitude}) are out of range"
        )));
    }
    Ok(())
}

pub fn validate_location_exception(
    latitude: f64,
    longitude: f64,
    radius_m: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<(), TransitionError> {
    validate_coordinates(latitude, longitude)?;
    if !(radius_m > 0.0) {
        return Err(TransitionError::InvalidInput("radius_m must be positive".into()));
    }
    if end_date < start_date {
        return Err(TransitionError::InvalidInput("end_date is before start_date".into()));
    }
    Ok(())
}

/// Keep only the exceptions whose window covers `date`.
pub fn active_exceptions(exceptions: &[LocationException], date: NaiveDate) -> Vec<&LocationException> {
    exceptions.iter().filter(|e| e.covers_date(date)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kit() -> MedicationKit {
        prepare_kit("K-100", Uuid::new_v4(), OtpMedication::Methadone, 90.0, 6, "rn.lee", crate::db::now())
            .unwrap()
            .0
    }

    #[test]
    fn prepare_validates_quantities() {
        let now = crate::db::now();
        assert!(prepare_kit("K-1", Uuid::new_v4(), OtpMedication::Methadone, 0.0, 6, "rn", now).is_err());
        assert!(prepare_kit("K-1", Uuid::new_v4(), OtpMedication::Methadone, 60.0, 0, "rn", now).is_err());
        assert!(prepare_kit("  ", Uuid::new_v4(), OtpMedication::Methadone, 60.0, 6, "rn", now).is_err());

        let (k, log) = prepare_kit("K-1", Uuid::new_v4(), OtpMedication::Methadone, 60.0, 6, "rn", now).unwrap();
        assert_eq!(k.status, KitStatus::Prepared);
        assert_eq!(log.action, DispensingAction::Prepared);
        assert_eq!(log.kit_id, k.id);
    }

    #[test]
    fn dispense_then_return() {
        let now = crate::db::now();
        let mut k = kit();
        let t = apply_kit_event(&mut k, KitEvent::Dispense, "rn.lee", None, now).unwrap();
        assert_eq!(k.status, KitStatus::Dispensed);
        assert_eq!(k.dispensed_at, Some(now));
        assert_eq!(t.log.action, DispensingAction::Dispensed);
        assert!(t.alert.is_none());

        apply_kit_event(&mut k, KitEvent::Return, "rn.lee", Some("seal intact".into()), now).unwrap();
        assert_eq!(k.status, KitStatus::Returned);
        assert!(k.returned_at.is_some());
    }

    #[test]
    fn returned_kit_is_final() {
        let now = crate::db::now();
        let mut k = kit();
        apply_kit_event(&mut k, KitEvent::Dispense, "rn", None, now).unwrap();
        apply_kit_event(&mut k, KitEvent::Return, "rn", None, now).unwrap();
        for event in [KitEvent::Dispense, KitEvent::Return, KitEvent::ReportLost] {
            assert!(apply_kit_event(&mut k, event, "rn", None, now).is_err());
        }
        assert_eq!(k.status, KitStatus::Returned);
    }

    #[test]
    fn cannot_return_undispensed_kit() {
        let mut k = kit();
        let err = apply_kit_event(&mut k, KitEvent::Return, "rn", None, crate::db::now()).unwrap_err();
        assert_eq!(err, TransitionError::invalid("kit", "prepared", "returned"));
    }

    #[test]
    fn lost_kit_raises_high_alert() {
        let mut k = kit();
        let t = apply_kit_event(&mut k, KitEvent::ReportLost, "rn", None, crate::db::now()).unwrap();
        assert_eq!(k.status, KitStatus::Lost);
        let alert = t.alert.unwrap();
        assert_eq!(alert.alert_type, ComplianceAlertType::LostKit);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.kit_id, Some(k.id));
        assert!(alert.message.contains("K-100"));
    }

    #[test]
    fn alert_lifecycle() {
        let mut k = kit();
        let mut alert = apply_kit_event(&mut k, KitEvent::ReportLost, "rn", None, crate::db::now())
            .unwrap()
            .alert
            .unwrap();
        acknowledge_alert(&mut alert).unwrap();
        assert!(acknowledge_alert(&mut alert).is_err());
        resolve_alert(&mut alert, "dr.ortiz", crate::db::now()).unwrap();
        assert_eq!(alert.resolved_by.as_deref(), Some("dr.ortiz"));
        assert!(resolve_alert(&mut alert, "dr.ortiz", crate::db::now()).is_err());
    }

    #[test]
    fn location_exception_validation() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert!(validate_location_exception(40.0, -75.0, 250.0, start, end).is_ok());
        assert!(validate_location_exception(40.0, -75.0, 250.0, end, start).is_err());
        assert!(validate_location_exception(95.0, -75.0, 250.0, start, end).is_err());
        assert!(validate_location_exception(40.0, -75.0, 0.0, start, end).is_err());
    }
}
