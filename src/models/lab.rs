use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AbnormalFlag, LabOrderStatus, LabPriority};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabOrder {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub test_code: String,
    pub test_name: String,
    pub ordered_by: String,
    pub priority: LabPriority,
    pub status: LabOrderStatus,
    pub ordered_at: NaiveDateTime,
    pub collected_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub id: Uuid,
    pub order_id: Uuid,
    pub patient_id: Uuid,
    pub analyte: String,
    pub value: Option<f64>,
    pub value_text: Option<String>,
    pub unit: Option<String>,
    pub reference_range_low: Option<f64>,
    pub reference_range_high: Option<f64>,
    pub abnormal_flag: AbnormalFlag,
    pub resulted_at: NaiveDateTime,
}
