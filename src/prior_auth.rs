//! Prior authorization workflow.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::models::enums::PriorAuthStatus;
use crate::models::PriorAuthorization;
use crate::workflow::TransitionError;

/// Default look-ahead window for expiring authorizations.
pub const DEFAULT_EXPIRING_DAYS: i64 = 30;

/// Fields supplied alongside a status change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Decision {
    pub auth_number: Option<String>,
    pub units_approved: Option<i32>,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub notes: Option<String>,
}

fn is_edge(from: PriorAuthStatus, to: PriorAuthStatus) -> bool {
    use PriorAuthStatus::*;
    matches!(
        (from, to),
        (Draft, Submitted)
            | (Submitted, Approved)
            | (Submitted, Denied)
            | (Denied, Appealed)
            | (Appealed, Approved)
            | (Appealed, Denied)
            | (Approved, Expired)
    )
}

/// Apply a status change. Approval needs an authorization number and a
/// validity window that does not end before it starts.
pub fn transition_prior_auth(
    auth: &mut PriorAuthorization,
    to: PriorAuthStatus,
    decision: Decision,
    now: NaiveDateTime,
) -> Result<(), TransitionError> {
    if !is_edge(auth.status, to) {
        return Err(TransitionError::invalid("prior authorization", auth.status, to));
    }

    if to == PriorAuthStatus::Approved {
        let auth_number = decision
            .auth_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| TransitionError::InvalidInput("approval requires auth_number".into()))?;
        let (Some(from), Some(until)) = (decision.valid_from, decision.valid_to) else {
            return Err(TransitionError::InvalidInput(
                "approval requires valid_from and valid_to".into(),
            ));
        };
        if until < from {
            return Err(TransitionError::InvalidInput("valid_to is before valid_from".into()));
        }
        if let Some(units) = decision.units_approved {
            if units <= 0 || units > auth.units_requested {
                return Err(TransitionError::InvalidInput(format!(
                    "units_approved must be between 1 and {}",
                    auth.units_requested
                )));
            }
        }
        auth.auth_number = Some(auth_number.to_string());
        auth.valid_from = Some(from);
        auth.valid_to = Some(until);
        auth.units_approved = Some(decision.units_approved.unwrap_or(auth.units_requested));
    }

    match to {
        PriorAuthStatus::Submitted | PriorAuthStatus::Appealed => auth.submitted_at = Some(now),
        PriorAuthStatus::Approved | PriorAuthStatus::Denied => auth.decided_at = Some(now),
        _ => {}
    }
    if decision.notes.is_some() {
        auth.notes = decision.notes;
    }
    auth.status = to;
    auth.updated_at = now;
    Ok(())
}

/// Inclusive date window `[today, today + days]` for the expiring query.
pub fn expiring_window(today: NaiveDate, days: Option<i64>) -> Result<(NaiveDate, NaiveDate), TransitionError> {
    let days = days.unwrap_or(DEFAULT_EXPIRING_DAYS);
    if !(0..=3650).contains(&days) {
        return Err(TransitionError::InvalidInput("days must be between 0 and 3650".into()));
    }
    Ok((today, today + Duration::days(days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn auth() -> PriorAuthorization {
        let now = crate::db::now();
        PriorAuthorization {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            policy_id: None,
            service_code: "J2315".into(),
            service_description: "Naltrexone injection".into(),
            status: PriorAuthStatus::Draft,
            auth_number: None,
            units_requested: 6,
            units_approved: None,
            valid_from: None,
            valid_to: None,
            submitted_at: None,
            decided_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn approval() -> Decision {
        Decision {
            auth_number: Some("PA-77".into()),
            valid_from: Some(d(1, 1)),
            valid_to: Some(d(6, 30)),
            ..Default::default()
        }
    }

    #[test]
    fn approval_path() {
        let now = crate::db::now();
        let mut a = auth();
        transition_prior_auth(&mut a, PriorAuthStatus::Submitted, Decision::default(), now).unwrap();
        assert_eq!(a.submitted_at, Some(now));
        transition_prior_auth(&mut a, PriorAuthStatus::Approved, approval(), now).unwrap();
        assert_eq!(a.auth_number.as_deref(), Some("PA-77"));
        assert_eq!(a.units_approved, Some(6));
        assert_eq!(a.decided_at, Some(now));
        transition_prior_auth(&mut a, PriorAuthStatus::Expired, Decision::default(), now).unwrap();
    }

    #[test]
    fn approval_requires_number_and_window() {
        let now = crate::db::now();
        let mut a = auth();
        transition_prior_auth(&mut a, PriorAuthStatus::Submitted, Decision::default(), now).unwrap();

        let mut missing_number = approval();
        missing_number.auth_number = Some("  ".into());
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Approved, missing_number, now).is_err());

        let mut missing_window = approval();
        missing_window.valid_to = None;
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Approved, missing_window, now).is_err());

        let mut inverted = approval();
        inverted.valid_to = Some(d(1, 1));
        inverted.valid_from = Some(d(2, 1));
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Approved, inverted, now).is_err());

        let mut too_many = approval();
        too_many.units_approved = Some(7);
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Approved, too_many, now).is_err());

        assert_eq!(a.status, PriorAuthStatus::Submitted);
    }

    #[test]
    fn denial_appeal_cycle() {
        let now = crate::db::now();
        let mut a = auth();
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Approved, approval(), now).is_err());
        transition_prior_auth(&mut a, PriorAuthStatus::Submitted, Decision::default(), now).unwrap();
        transition_prior_auth(&mut a, PriorAuthStatus::Denied, Decision::default(), now).unwrap();
        assert!(transition_prior_auth(&mut a, PriorAuthStatus::Expired, Decision::default(), now).is_err());
        transition_prior_auth(&mut a, PriorAuthStatus::Appealed, Decision::default(), now).unwrap();
        transition_prior_auth(&mut a, PriorAuthStatus::Approved, approval(), now).unwrap();
        assert_eq!(a.status, PriorAuthStatus::Approved);
    }

    #[test]
    fn expiring_window_defaults_to_thirty_days() {
        assert_eq!(expiring_window(d(6, 1), None).unwrap(), (d(6, 1), d(7, 1)));
        assert_eq!(expiring_window(d(6, 1), Some(0)).unwrap(), (d(6, 1), d(6, 1)));
        assert!(expiring_window(d(6, 1), Some(-1)).is_err());
    }
}
