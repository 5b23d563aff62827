//! Prescription Monitoring Program check scoring.

use chrono::{Duration, NaiveDateTime};

use crate::models::enums::PmpRiskFlag;
use crate::workflow::TransitionError;

/// Default review interval for active patients.
pub const DEFAULT_OVERDUE_DAYS: i64 = 90;

/// Distinct prescribers or pharmacies at which a check alerts.
pub const ALERT_THRESHOLD: i32 = 4;

/// Longest review interval accepted from callers.
pub const MAX_OVERDUE_DAYS: i64 = 3650;

/// Distinct prescribers at which a check needs clinical review.
pub const REVIEW_PRESCRIBERS: i32 = 2;

pub fn risk_flag(distinct_prescribers: i32, distinct_pharmacies: i32, overlapping_controlled: i32) -> PmpRiskFlag {
    if distinct_prescribers >= ALERT_THRESHOLD || distinct_pharmacies >= ALERT_THRESHOLD {
        PmpRiskFlag::Alert
    } else if distinct_prescribers >= REVIEW_PRESCRIBERS || overlapping_controlled > 0 {
        PmpRiskFlag::Review
    } else {
        PmpRiskFlag::None
    }
}

/// Checks older than this instant are overdue.
pub fn overdue_cutoff(now: NaiveDateTime, days: Option<i64>) -> Result<NaiveDateTime, TransitionError> {
    let days = days.unwrap_or(DEFAULT_OVERDUE_DAYS);
    if !(0..=MAX_OVERDUE_DAYS).contains(&days) {
        return Err(TransitionError::InvalidInput(format!(
            "days must be between 0 and {MAX_OVERDUE_DAYS}"
        )));
    }
    now.checked_sub_signed(Duration::days(days))
        .ok_or_else(|| TransitionError::InvalidInput("days is out of range".into()))
}
