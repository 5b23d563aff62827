use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StaffRole;

/// An issued API token. Only the SHA-256 digest of the bearer value is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffToken {
    pub id: Uuid,
    pub staff_name: String,
    pub role: StaffRole,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: NaiveDateTime,
    pub revoked: bool,
}
