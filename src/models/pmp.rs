use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PmpRiskFlag;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmpCheck {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub state: String,
    pub checked_by: String,
    pub checked_at: NaiveDateTime,
    pub prescriptions_found: i32,
    pub distinct_prescribers: i32,
    pub distinct_pharmacies: i32,
    pub overlapping_controlled: i32,
    pub risk_flag: PmpRiskFlag,
    pub notes: Option<String>,
}

/// Active patient whose last PMP query is missing or older than the
/// review window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmpOverdueEntry {
    pub patient_id: Uuid,
    pub mrn: String,
    pub patient_name: String,
    pub last_checked_at: Option<NaiveDateTime>,
}
