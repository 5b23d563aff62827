//! Lab order workflow and result flagging.

use chrono::NaiveDateTime;

use crate::models::enums::{AbnormalFlag, LabOrderStatus};
use crate::models::LabOrder;
use crate::workflow::TransitionError;

/// Flag a numeric result against its reference range.
///
/// Beyond half the low bound or twice the high bound is critical. Without a
/// value, or without the relevant bound, the result counts as normal.
pub fn abnormal_flag(value: Option<f64>, low: Option<f64>, high: Option<f64>) -> AbnormalFlag {
    let Some(v) = value else {
        return AbnormalFlag::Normal;
    };
    if let Some(low) = low {
        if v < low * 0.5 {
            return AbnormalFlag::CriticalLow;
        }
        if v < low {
            return AbnormalFlag::Low;
        }
    }
    if let Some(high) = high {
        if v > high * 2.0 {
            return AbnormalFlag::CriticalHigh;
        }
        if v > high {
            return AbnormalFlag::High;
        }
    }
    AbnormalFlag::Normal
}

/// Advance an order: `ordered → collected → sent → resulted`; any
/// non-resulted order can be cancelled.
pub fn transition_order(order: &mut LabOrder, to: LabOrderStatus, now: NaiveDateTime) -> Result<(), TransitionError> {
    use LabOrderStatus::*;

    let allowed = matches!(
        (order.status, to),
        (Ordered, Collected)
            | (Collected, Sent)
            | (Sent, Resulted)
            | (Ordered | Collected | Sent, Cancelled)
    );
    if !allowed {
        return Err(TransitionError::invalid("lab order", order.status, to));
    }
    if to == Collected {
        order.collected_at = Some(now);
    }
    order.status = to;
    order.updated_at = now;
    Ok(())
}

/// Results may be attached to any order that is not cancelled or already
/// resulted; attaching them marks the order resulted.
pub fn mark_resulted(order: &mut LabOrder, now: NaiveDateTime) -> Result<(), TransitionError> {
    if matches!(order.status, LabOrderStatus::Cancelled | LabOrderStatus::Resulted) {
        return Err(TransitionError::invalid("lab order", order.status, LabOrderStatus::Resulted));
    }
    order.status = LabOrderStatus::Resulted;
    order.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::LabPriority;
    use uuid::Uuid;

    fn order() -> LabOrder {
        let now = crate::db::now();
        LabOrder {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            test_code: "80061".into(),
            test_name: "Lipid panel".into(),
            ordered_by: "dr.ortiz".into(),
            priority: LabPriority::Routine,
            status: LabOrderStatus::Ordered,
            ordered_at: now,
            collected_at: None,
            updated_at: now,
        }
    }

    #[test]
    fn flags_from_reference_range() {
        let (lo, hi) = (Some(10.0), Some(20.0));
        assert_eq!(abnormal_flag(Some(15.0), lo, hi), AbnormalFlag::Normal);
        assert_eq!(abnormal_flag(Some(9.0), lo, hi), AbnormalFlag::Low);
        assert_eq!(abnormal_flag(Some(4.0), lo, hi), AbnormalFlag::CriticalLow);
        assert_eq!(abnormal_flag(Some(21.0), lo, hi), AbnormalFlag::High);
        assert_eq!(abnormal_flag(Some(41.0), lo, hi), AbnormalFlag::CriticalHigh);
        // Bounds themselves are in range.
        assert_eq!(abnormal_flag(Some(10.0), lo, hi), AbnormalFlag::Normal);
        assert_eq!(abnormal_flag(Some(20.0), lo, hi), AbnormalFlag::Normal);
    }

    #[test]
    fn missing_value_or_range_is_normal() {
        assert_eq!(abnormal_flag(None, Some(1.0), Some(2.0)), AbnormalFlag::Normal);
        assert_eq!(abnormal_flag(Some(100.0), None, None), AbnormalFlag::Normal);
        assert_eq!(abnormal_flag(Some(100.0), None, Some(10.0)), AbnormalFlag::CriticalHigh);
    }

    #[test]
    fn order_lifecycle() {
        let now = crate::db::now();
        let mut o = order();
        assert!(transition_order(&mut o, LabOrderStatus::Sent, now).is_err());
        transition_order(&mut o, LabOrderStatus::Collected, now).unwrap();
        assert_eq!(o.collected_at, Some(now));
        transition_order(&mut o, LabOrderStatus::Sent, now).unwrap();
        transition_order(&mut o, LabOrderStatus::Resulted, now).unwrap();
        assert!(transition_order(&mut o, LabOrderStatus::Cancelled, now).is_err());
    }

    #[test]
    fn cancel_from_any_open_state() {
        let now = crate::db::now();
        let mut o = order();
        transition_order(&mut o, LabOrderStatus::Cancelled, now).unwrap();
        assert!(mark_resulted(&mut o, now).is_err());

        let mut o = order();
        mark_resulted(&mut o, now).unwrap();
        assert_eq!(o.status, LabOrderStatus::Resulted);
    }
}
