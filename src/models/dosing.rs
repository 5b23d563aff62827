use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{
    AlertSeverity, ComplianceAlertStatus, ComplianceAlertType, DispensingAction, KitStatus,
    OtpMedication,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationKit {
    pub id: Uuid,
    pub kit_number: String,
    pub patient_id: Uuid,
    pub medication: OtpMedication,
    pub dose_mg: f64,
    pub doses_count: i32,
    pub status: KitStatus,
    pub prepared_by: String,
    pub prepared_at: NaiveDateTime,
    pub dispensed_at: Option<NaiveDateTime>,
    pub returned_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispensingLog {
    pub id: Uuid,
    pub kit_id: Uuid,
    pub patient_id: Uuid,
    pub action: DispensingAction,
    pub performed_by: String,
    pub notes: Option<String>,
    pub logged_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kit_id: Option<Uuid>,
    pub alert_type: ComplianceAlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub status: ComplianceAlertStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
}

/// Approved alternate location for take-home verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationException {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub reason: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub approved_by: String,
    pub created_at: NaiveDateTime,
}

impl LocationException {
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
