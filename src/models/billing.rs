use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BillingMethod, ClaimStatus, OtpMedication, OtpServiceType, PayerType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpService {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_date: NaiveDate,
    pub service_type: OtpServiceType,
    pub medication: Option<OtpMedication>,
    pub recorded_by: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLine {
    pub code: String,
    pub description: String,
    pub units: i64,
    pub rate_cents: i64,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpClaim {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub week_start: NaiveDate,
    pub billing_method: BillingMethod,
    pub payer_type: Option<PayerType>,
    pub lines: Vec<ClaimLine>,
    pub total_cents: i64,
    pub status: ClaimStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
