use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CoveragePriority, DualClaimStatus, EligibilityStatus, PayerType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub payer_name: String,
    pub payer_type: PayerType,
    pub member_id: String,
    pub group_number: Option<String>,
    pub coverage_priority: CoveragePriority,
    pub effective_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

impl InsurancePolicy {
    /// Coverage is inclusive on both ends of the effective window.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.effective_date <= date && self.termination_date.map_or(true, |end| end >= date)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityCheck {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub policy_id: Option<Uuid>,
    pub service_date: NaiveDate,
    pub status: EligibilityStatus,
    pub dual_eligible: bool,
    pub reason: String,
    pub checked_by: String,
    pub checked_at: NaiveDateTime,
}

/// Claim for a dual-eligible patient: billed to Medicare, then crossed
/// over to Medicaid for the remainder. Amounts are in cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualEligibleClaim {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_date: NaiveDate,
    pub service_code: String,
    pub billed_cents: i64,
    pub status: DualClaimStatus,
    pub medicare_allowed_cents: Option<i64>,
    pub medicare_paid_cents: Option<i64>,
    pub medicaid_paid_cents: Option<i64>,
    pub patient_responsibility_cents: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
