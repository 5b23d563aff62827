//! Dual-eligible claim sequencing: Medicare adjudicates first, the
//! remainder crosses over to Medicaid, and whatever Medicaid does not pay
//! becomes patient responsibility.

use chrono::NaiveDateTime;

use crate::models::enums::DualClaimStatus;
use crate::models::DualEligibleClaim;
use crate::workflow::TransitionError;

const ENTITY: &str = "dual-eligible claim";

fn require(claim: &DualEligibleClaim, expected: DualClaimStatus, to: DualClaimStatus) -> Result<(), TransitionError> {
    if claim.status != expected {
        return Err(TransitionError::invalid(ENTITY, claim.status, to));
    }
    Ok(())
}

/// Amount Medicare allowed but did not pay.
pub fn crossover_cents(claim: &DualEligibleClaim) -> Option<i64> {
    Some(claim.medicare_allowed_cents? - claim.medicare_paid_cents?)
}

/// Record Medicare's adjudication: `0 <= paid <= allowed <= billed`.
pub fn record_medicare_adjudication(
    claim: &mut DualEligibleClaim,
    allowed_cents: i64,
    paid_cents: i64,
    now: NaiveDateTime,
) -> Result<(), TransitionError> {
    require(claim, DualClaimStatus::PendingMedicare, DualClaimStatus::MedicareAdjudicated)?;
    if paid_cents < 0 || paid_cents > allowed_cents || allowed_cents > claim.billed_cents {
        return Err(TransitionError::InvalidInput(format!(
            "Medicare amounts must satisfy 0 <= paid ({paid_cents}) <= allowed ({allowed_cents}) <= billed ({})",
            claim.billed_cents
        )));
    }
    claim.medicare_allowed_cents = Some(allowed_cents);
    claim.medicare_paid_cents = Some(paid_cents);
    claim.status = DualClaimStatus::MedicareAdjudicated;
    claim.updated_at = now;
    Ok(())
}

pub fn submit_to_medicaid(claim: &mut DualEligibleClaim, now: NaiveDateTime) -> Result<(), TransitionError> {
    require(claim, DualClaimStatus::MedicareAdjudicated, DualClaimStatus::MedicaidSubmitted)?;
    claim.status = DualClaimStatus::MedicaidSubmitted;
    claim.updated_at = now;
    Ok(())
}

/// Record Medicaid's payment against the crossover amount and close the claim.
pub fn record_medicaid_payment(
    claim: &mut DualEligibleClaim,
    paid_cents: i64,
    now: NaiveDateTime,
) -> Result<(), TransitionError> {
    require(claim, DualClaimStatus::MedicaidSubmitted, DualClaimStatus::Completed)?;
    let crossover = crossover_cents(claim).ok_or_else(|| {
        TransitionError::Rejected("claim has no Medicare adjudication on record".into())
    })?;
    if paid_cents < 0 || paid_cents > crossover {
        return Err(TransitionError::InvalidInput(format!(
            "Medicaid payment {paid_cents} must be between 0 and the crossover amount {crossover}"
        )));
    }
    claim.medicaid_paid_cents = Some(paid_cents);
    claim.patient_responsibility_cents = Some(crossover - paid_cents);
    claim.status = DualClaimStatus::Completed;
    claim.updated_at = now;
    Ok(())
}

/// Denial by Medicare (before adjudication) or by Medicaid (after crossover).
pub fn deny(claim: &mut DualEligibleClaim, now: NaiveDateTime) -> Result<(), TransitionError> {
    match claim.status {
        DualClaimStatus::PendingMedicare | DualClaimStatus::MedicaidSubmitted => {
            claim.status = DualClaimStatus::Denied;
            claim.updated_at = now;
            Ok(())
        }
        other => Err(TransitionError::invalid(ENTITY, other, DualClaimStatus::Denied)),
    }
}
