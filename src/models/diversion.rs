use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BiometricType, VerificationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricEnrollment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub biometric_type: BiometricType,
    /// Hex SHA-256 of the enrolled template; the template itself is never stored.
    pub template_hash: String,
    pub enrolled_by: String,
    pub enrolled_at: NaiveDateTime,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversionVerification {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub kit_id: Option<Uuid>,
    pub biometric_type: BiometricType,
    pub match_score: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_m: Option<f64>,
    pub exception_id: Option<Uuid>,
    pub outcome: VerificationOutcome,
    pub verified_at: NaiveDateTime,
}
