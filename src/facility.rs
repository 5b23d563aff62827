//! Facility safety compliance: derived check status, inspection
//! rescheduling and per-facility summaries.

use std::cmp::min;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::models::enums::ComplianceStatus;
use crate::models::{SafetyCheck, SafetyInspection};
use crate::workflow::TransitionError;

/// Checks due within this many days are reported as due soon.
pub const DUE_SOON_DAYS: i64 = 14;

/// Longest inspection interval a check may carry.
pub const MAX_FREQUENCY_DAYS: i64 = 3650;

/// Failed items are re-inspected within this many days at most.
pub const FAILED_RECHECK_DAYS: i64 = 7;

pub fn compliance_status(next_due: NaiveDate, today: NaiveDate) -> ComplianceStatus {
    if next_due < today {
        ComplianceStatus::Overdue
    } else if next_due <= today + Duration::days(DUE_SOON_DAYS) {
        ComplianceStatus::DueSoon
    } else {
        ComplianceStatus::Compliant
    }
}

pub fn validate_frequency(frequency_days: i64) -> Result<(), TransitionError> {
    if !(1..=MAX_FREQUENCY_DAYS).contains(&frequency_days) {
        return Err(TransitionError::InvalidInput(format!(
            "frequency_days must be between 1 and {MAX_FREQUENCY_DAYS}"
        )));
    }
    Ok(())
}

/// Next due date after an inspection. Failing shortens the interval.
pub fn next_due_after(
    inspected_on: NaiveDate,
    passed: bool,
    frequency_days: i64,
) -> Result<NaiveDate, TransitionError> {
    validate_frequency(frequency_days)?;
    let days = if passed {
        frequency_days
    } else {
        min(FAILED_RECHECK_DAYS, frequency_days)
    };
    inspected_on
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| TransitionError::InvalidInput(format!("next due date after {inspected_on} is out of range")))
}

/// Apply an inspection to its check. The check is left untouched on error.
pub fn apply_inspection(check: &mut SafetyCheck, inspection: &SafetyInspection) -> Result<(), TransitionError> {
    let next_due = next_due_after(inspection.inspected_on, inspection.passed, check.frequency_days)?;
    check.last_inspected = Some(inspection.inspected_on);
    check.next_due = next_due;
    Ok(())
}

/// A check together with its status on the reporting date.
#[derive(Debug, Clone, Serialize)]
pub struct SafetyCheckStatus {
    #[serde(flatten)]
    pub check: SafetyCheck,
    pub status: ComplianceStatus,
    pub days_until_due: i64,
}

pub fn with_status(check: SafetyCheck, today: NaiveDate) -> SafetyCheckStatus {
    let status = compliance_status(check.next_due, today);
    let days_until_due = (check.next_due - today).num_days();
    SafetyCheckStatus {
        check,
        status,
        days_until_due,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub facility_id: Option<Uuid>,
    pub total: usize,
    pub compliant: usize,
    pub due_soon: usize,
    pub overdue: usize,
    /// Share of checks that are not overdue, 0–100. 100 when there are none.
    pub compliance_rate: f64,
}

pub fn summarize(facility_id: Option<Uuid>, checks: &[SafetyCheckStatus]) -> ComplianceSummary {
    let mut summary = ComplianceSummary {
        facility_id,
        total: checks.len(),
        ..Default::default()
    };
    for c in checks {
        match c.status {
            ComplianceStatus::Compliant => summary.compliant += 1,
            ComplianceStatus::DueSoon => summary.due_soon += 1,
            ComplianceStatus::Overdue => summary.overdue += 1,
        }
    }
    summary.compliance_rate = if summary.total == 0 {
        100.0
    } else {
        let on_time = (summary.total - summary.overdue) as f64;
        (on_time / summary.total as f64 * 1000.0).round() / 10.0
    };
    summary
}
