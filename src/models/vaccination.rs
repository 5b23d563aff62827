use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One lot of a vaccine on hand (`vaccine_inventory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccineLot {
    pub id: Uuid,
    pub vaccine_name: String,
    pub cvx_code: String,
    pub lot_number: String,
    pub manufacturer: String,
    pub doses_available: i32,
    pub expiration_date: NaiveDate,
    pub created_at: NaiveDateTime,
}

impl VaccineLot {
    pub fn is_expired_on(&self, date: NaiveDate) -> bool {
        self.expiration_date < date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaccinationRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub inventory_id: Uuid,
    pub vaccine_name: String,
    pub lot_number: String,
    pub dose_number: i32,
    pub administered_on: NaiveDate,
    pub administered_by: String,
    pub site: String,
    pub route: String,
    pub created_at: NaiveDateTime,
}
