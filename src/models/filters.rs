use serde::Deserialize;
use uuid::Uuid;

use super::enums::*;

#[derive(Debug, Default, Deserialize)]
pub struct PatientFilter {
    pub status: Option<PatientStatus>,
    pub program: Option<Program>,
    /// Case-insensitive match on first name, last name or MRN.
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KitFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<KitStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComplianceAlertFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<ComplianceAlertStatus>,
    pub severity: Option<AlertSeverity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SafetyCheckFilter {
    pub facility_id: Option<Uuid>,
    pub category: Option<SafetyCategory>,
    /// Applied after compliance status is derived for today.
    pub status: Option<ComplianceStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub category: Option<TicketCategory>,
    pub priority: Option<TicketPriority>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabOrderFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<LabOrderStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LabResultFilter {
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub abnormal_only: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriorAuthFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<PriorAuthStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtpClaimFilter {
    pub patient_id: Option<Uuid>,
    pub status: Option<ClaimStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VaccineInventoryFilter {
    /// Only lots with fewer doses than this.
    pub low_stock: Option<i32>,
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct EquityFilter {
    pub metric_id: Option<String>,
    pub stratification_type: Option<String>,
}
