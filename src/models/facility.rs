use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::SafetyCategory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub license_number: String,
    pub address: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub id: Uuid,
    pub facility_id: Uuid,
    pub category: SafetyCategory,
    pub item_name: String,
    pub frequency_days: i64,
    pub last_inspected: Option<NaiveDate>,
    pub next_due: NaiveDate,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyInspection {
    pub id: Uuid,
    pub check_id: Uuid,
    pub inspected_on: NaiveDate,
    pub inspector: String,
    pub passed: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}
