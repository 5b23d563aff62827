//! Vaccine administration rules.

use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::models::{VaccinationRecord, VaccineLot};
use crate::workflow::TransitionError;

/// Check the lot can supply a dose on `date`, and build the record for it.
///
/// `prior_doses` is the number of doses of this vaccine the patient
/// already received; the new record is numbered after them.
#[allow(clippy::too_many_arguments)]
pub fn administer(
    lot: &VaccineLot,
    patient_id: Uuid,
    administered_on: NaiveDate,
    administered_by: &str,
    site: &str,
    route: &str,
    prior_doses: i32,
    now: NaiveDateTime,
) -> Result<VaccinationRecord, TransitionError> {
    if lot.is_expired_on(administered_on) {
        return Err(TransitionError::Rejected(format!(
            "lot {} expired on {}",
            lot.lot_number, lot.expiration_date
        )));
    }
    if lot.doses_available <= 0 {
        return Err(TransitionError::Rejected(format!(
            "lot {} has no doses available",
            lot.lot_number
        )));
    }

    Ok(VaccinationRecord {
        id: Uuid::new_v4(),
        patient_id,
        inventory_id: lot.id,
        vaccine_name: lot.vaccine_name.clone(),
        lot_number: lot.lot_number.clone(),
        dose_number: prior_doses + 1,
        administered_on,
        administered_by: administered_by.to_string(),
        site: site.to_string(),
        route: route.to_string(),
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn lot(doses: i32, expires: NaiveDate) -> VaccineLot {
        VaccineLot {
            id: Uuid::new_v4(),
            vaccine_name: "Hepatitis B".into(),
            cvx_code: "45".into(),
            lot_number: "HB-22".into(),
            manufacturer: "Acme Bio".into(),
            doses_available: doses,
            expiration_date: expires,
            created_at: crate::db::now(),
        }
    }

    #[test]
    fn dose_numbered_after_prior_doses() {
        let l = lot(5, d(12, 31));
        let record = administer(&l, Uuid::new_v4(), d(6, 1), "rn.lee", "left deltoid", "IM", 2, crate::db::now())
            .unwrap();
        assert_eq!(record.dose_number, 3);
        assert_eq!(record.inventory_id, l.id);
    }

    #[test]
    fn expired_lot_rejected() {
        let l = lot(5, d(5, 31));
        let err = administer(&l, Uuid::new_v4(), d(6, 1), "rn", "arm", "IM", 0, crate::db::now()).unwrap_err();
        assert!(matches!(err, TransitionError::Rejected(_)));
        // The expiration date itself is still usable.
        assert!(administer(&l, Uuid::new_v4(), d(5, 31), "rn", "arm", "IM", 0, crate::db::now()).is_ok());
    }

    #[test]
    fn empty_lot_rejected() {
        let l = lot(0, d(12, 31));
        assert!(administer(&l, Uuid::new_v4(), d(6, 1), "rn", "arm", "IM", 0, crate::db::now()).is_err());
    }
}
