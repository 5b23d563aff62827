use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PriorAuthStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorAuthorization {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub policy_id: Option<Uuid>,
    pub service_code: String,
    pub service_description: String,
    pub status: PriorAuthStatus,
    pub auth_number: Option<String>,
    pub units_requested: i32,
    pub units_approved: Option<i32>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub submitted_at: Option<NaiveDateTime>,
    pub decided_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
