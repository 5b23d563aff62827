//! Insurance eligibility on a service date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{EligibilityStatus, PayerType};
use crate::models::InsurancePolicy;

/// Outcome of checking a patient's policies against one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub status: EligibilityStatus,
    pub policy_id: Option<Uuid>,
    pub payer_type: Option<PayerType>,
    pub dual_eligible: bool,
    pub reason: String,
}

/// The active policy with the best coverage priority, if any.
pub fn primary_active_policy(policies: &[InsurancePolicy], date: NaiveDate) -> Option<&InsurancePolicy> {
    policies
        .iter()
        .filter(|p| p.is_active_on(date))
        .min_by_key(|p| (p.coverage_priority, p.effective_date))
}

/// Active Medicare-class and Medicaid-class coverage on the same date.
pub fn is_dual_eligible(policies: &[InsurancePolicy], date: NaiveDate) -> bool {
    let active = || policies.iter().filter(|p| p.is_active_on(date));
    active().any(|p| p.payer_type.is_medicare()) && active().any(|p| p.payer_type.is_medicaid())
}

pub fn check_eligibility(policies: &[InsurancePolicy], date: NaiveDate) -> EligibilityDecision {
    let dual_eligible = is_dual_eligible(policies, date);
    match primary_active_policy(policies, date) {
        Some(policy) => EligibilityDecision {
            status: EligibilityStatus::Eligible,
            policy_id: Some(policy.id),
            payer_type: Some(policy.payer_type),
            dual_eligible,
            reason: if dual_eligible {
                format!("Dual eligible; {} bills first", policy.payer_name)
            } else {
                format!("Covered by {} ({})", policy.payer_name, policy.coverage_priority)
            },
        },
        None => EligibilityDecision {
            status: EligibilityStatus::NoCoverage,
            policy_id: None,
            payer_type: None,
            dual_eligible: false,
            reason: if policies.is_empty() {
                "No insurance policies on file".to_string()
            } else {
                format!("No policy active on {date}")
            },
        },
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixtures::policy;
    use super::*;
    use crate::models::enums::CoveragePriority;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn termination_date_is_inclusive() {
        let p = policy(PayerType::Commercial, CoveragePriority::Primary, d(1, 1), Some(d(3, 31)));
        let policies = [p];
        assert_eq!(check_eligibility(&policies, d(3, 31)).status, EligibilityStatus::Eligible);
        assert_eq!(check_eligibility(&policies, d(4, 1)).status, EligibilityStatus::NoCoverage);
        assert_eq!(check_eligibility(&policies, d(1, 1)).status, EligibilityStatus::Eligible);
    }

    #[test]
    fn best_priority_policy_chosen() {
        let secondary = policy(PayerType::Medicaid, CoveragePriority::Secondary, d(1, 1), None);
        let primary = policy(PayerType::Medicare, CoveragePriority::Primary, d(1, 1), None);
        let primary_id = primary.id;
        let decision = check_eligibility(&[secondary, primary], d(5, 1));
        assert_eq!(decision.policy_id, Some(primary_id));
        assert_eq!(decision.payer_type, Some(PayerType::Medicare));
        assert!(decision.dual_eligible);
    }

    #[test]
    fn dual_eligibility_needs_both_classes_active() {
        let medicare = policy(PayerType::MedicareAdvantage, CoveragePriority::Primary, d(1, 1), None);
        let lapsed_medicaid =
            policy(PayerType::MedicaidManagedCare, CoveragePriority::Secondary, d(1, 1), Some(d(2, 1)));
        let policies = [medicare, lapsed_medicaid];
        assert!(is_dual_eligible(&policies, d(1, 15)));
        assert!(!is_dual_eligible(&policies, d(2, 2)));
    }

    #[test]
    fn no_policies_reports_reason() {
        let decision = check_eligibility(&[], d(1, 1));
        assert_eq!(decision.status, EligibilityStatus::NoCoverage);
        assert_eq!(decision.reason, "No insurance policies on file");
        assert!(!decision.dual_eligible);
    }
}
