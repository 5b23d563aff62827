//! OTP weekly billing: choose between the weekly bundle and itemized APG
//! billing for one patient-week and price the claim lines.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::models::enums::{BillingMethod, ClaimStatus, OtpMedication, OtpServiceType, PayerType};
use crate::models::{ClaimLine, OtpService};
use crate::workflow::TransitionError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BillingError {
    #[error("week_start {0} is not a Monday")]
    NotMonday(NaiveDate),
    #[error("no OTP services recorded for the week starting {0}")]
    NoServices(NaiveDate),
    #[error("week starting {0} runs past the supported calendar")]
    OutOfRange(NaiveDate),
}

// ═══════════════════════════════════════════
// Rate tables
// ═══════════════════════════════════════════

/// A billable code with its description and per-unit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeRate {
    pub code: &'static str,
    pub description: &'static str,
    pub rate_cents: i64,
}

const fn rate(code: &'static str, description: &'static str, rate_cents: i64) -> CodeRate {
    CodeRate {
        code,
        description,
        rate_cents,
    }
}

pub const NON_DRUG_BUNDLE: CodeRate = rate("G2074", "Weekly bundle, no medication provided", 20_315);
pub const INTAKE_ADDON: CodeRate = rate("G2076", "Intake activities add-on", 23_186);
pub const PERIODIC_ASSESSMENT_ADDON: CodeRate = rate("G2077", "Periodic assessment add-on", 15_093);
pub const EXTRA_COUNSELING_ADDON: CodeRate = rate("G2080", "Additional counseling add-on", 3_452);

pub fn bundle_rate(medication: OtpMedication) -> CodeRate {
    match medication {
        OtpMedication::Methadone => rate("G2067", "Weekly bundle, methadone", 21_955),
        OtpMedication::Buprenorphine => rate("G2068", "Weekly bundle, oral buprenorphine", 24_361),
        OtpMedication::Naltrexone => rate("G2073", "Weekly bundle, injectable naltrexone", 132_647),
    }
}

/// Take-home supply add-on, billed per dispense. Naltrexone has none.
pub fn take_home_addon(medication: OtpMedication) -> Option<CodeRate> {
    match medication {
        OtpMedication::Methadone => Some(rate("G2078", "Take-home supply add-on, methadone", 3_689)),
        OtpMedication::Buprenorphine => {
            Some(rate("G2079", "Take-home supply add-on, oral buprenorphine", 6_141))
        }
        OtpMedication::Naltrexone => None,
    }
}

pub fn apg_rate(service_type: OtpServiceType) -> CodeRate {
    match service_type {
        OtpServiceType::MedicationAdministration => {
            rate("APG-0872", "Opioid treatment medication administration", 2_850)
        }
        OtpServiceType::TakeHomeDispense => rate("APG-0873", "Opioid treatment take-home dispensing", 1_975),
        OtpServiceType::IndividualCounseling => rate("APG-0323", "Individual counseling", 7_640),
        OtpServiceType::GroupCounseling => rate("APG-0324", "Group counseling", 3_210),
        OtpServiceType::ToxicologyTest => rate("APG-0470", "Toxicology testing", 2_475),
        OtpServiceType::IntakeAssessment => rate("APG-0320", "Intake assessment", 18_930),
        OtpServiceType::PeriodicAssessment => rate("APG-0321", "Periodic assessment", 9_860),
    }
}

// ═══════════════════════════════════════════
// Weekly claim
// ═══════════════════════════════════════════

/// Priced claim for one patient-week, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyClaimPlan {
    pub week_start: NaiveDate,
    pub billing_method: BillingMethod,
    pub lines: Vec<ClaimLine>,
    pub total_cents: i64,
}

/// Last day (inclusive) of the billing week.
pub fn week_end(week_start: NaiveDate) -> Result<NaiveDate, BillingError> {
    week_start
        .checked_add_signed(Duration::days(6))
        .ok_or(BillingError::OutOfRange(week_start))
}

/// Price one patient-week of services.
///
/// `payer` is the payer type of the patient's primary active policy, if any.
/// Services outside the seven-day week are ignored.
pub fn build_weekly_claim(
    week_start: NaiveDate,
    services: &[OtpService],
    payer: Option<PayerType>,
) -> Result<WeeklyClaimPlan, BillingError> {
    if week_start.weekday() != Weekday::Mon {
        return Err(BillingError::NotMonday(week_start));
    }
    let end = week_end(week_start)?;
    let week: Vec<&OtpService> = services
        .iter()
        .filter(|s| s.service_date >= week_start && s.service_date <= end)
        .collect();
    if week.is_empty() {
        return Err(BillingError::NoServices(week_start));
    }

    let (billing_method, lines) = match choose_method(&week, payer) {
        Method::Bundle(code) => (BillingMethod::Bundle, bundle_lines(code, &week)),
        Method::Apg => (BillingMethod::Apg, apg_lines(&week)),
    };
    let total_cents = lines.iter().map(|l| l.amount_cents).sum();

    Ok(WeeklyClaimPlan {
        week_start,
        billing_method,
        lines,
        total_cents,
    })
}

enum Method {
    Bundle(CodeRate),
    Apg,
}

fn choose_method(week: &[&OtpService], payer: Option<PayerType>) -> Method {
    let payer = match payer {
        Some(p) if !matches!(p, PayerType::Commercial | PayerType::SelfPay) => p,
        _ => return Method::Apg,
    };

    let has_medication = week.iter().any(|s| s.service_type.is_medication());
    let has_non_drug = week.iter().any(|s| !s.service_type.is_medication());

    match (has_medication, has_non_drug) {
        (true, true) => match dominant_medication(week) {
            Some(med) => Method::Bundle(bundle_rate(med)),
            None => Method::Apg,
        },
        (false, true) if payer.is_medicare() => Method::Bundle(NON_DRUG_BUNDLE),
        _ => Method::Apg,
    }
}

/// Medication with the most distinct service days; ties go to enum order.
pub fn dominant_medication(week: &[&OtpService]) -> Option<OtpMedication> {
    let mut days: BTreeMap<OtpMedication, BTreeSet<NaiveDate>> = BTreeMap::new();
    for s in week.iter().filter(|s| s.service_type.is_medication()) {
        if let Some(med) = s.medication {
            days.entry(med).or_default().insert(s.service_date);
        }
    }

    let mut best: Option<(OtpMedication, usize)> = None;
    for (med, dates) in days {
        if best.map_or(true, |(_, n)| dates.len() > n) {
            best = Some((med, dates.len()));
        }
    }
    best.map(|(med, _)| med)
}

fn line(rate: CodeRate, units: i64) -> ClaimLine {
    ClaimLine {
        code: rate.code.to_string(),
        description: rate.description.to_string(),
        units,
        rate_cents: rate.rate_cents,
        amount_cents: rate.rate_cents * units,
    }
}

fn count(week: &[&OtpService], pred: impl Fn(&OtpService) -> bool) -> i64 {
    week.iter().filter(|s| pred(s)).count() as i64
}

fn bundle_lines(bundle: CodeRate, week: &[&OtpService]) -> Vec<ClaimLine> {
    let mut lines = vec![line(bundle, 1)];

    let intakes = count(week, |s| s.service_type == OtpServiceType::IntakeAssessment);
    if intakes > 0 {
        lines.push(line(INTAKE_ADDON, intakes));
    }
    let periodic = count(week, |s| s.service_type == OtpServiceType::PeriodicAssessment);
    if periodic > 0 {
        lines.push(line(PERIODIC_ASSESSMENT_ADDON, periodic));
    }

    let mut take_homes: BTreeMap<OtpMedication, i64> = BTreeMap::new();
    for s in week.iter().filter(|s| s.service_type == OtpServiceType::TakeHomeDispense) {
        if let Some(med) = s.medication {
            *take_homes.entry(med).or_default() += 1;
        }
    }
    for (med, units) in take_homes {
        if let Some(addon) = take_home_addon(med) {
            lines.push(line(addon, units));
        }
    }

    let counseling = count(week, |s| s.service_type.is_counseling());
    if counseling > 2 {
        lines.push(line(EXTRA_COUNSELING_ADDON, counseling - 2));
    }
    lines
}

fn apg_lines(week: &[&OtpService]) -> Vec<ClaimLine> {
    let mut units: BTreeMap<OtpServiceType, i64> = BTreeMap::new();
    for s in week {
        *units.entry(s.service_type).or_default() += 1;
    }
    units
        .into_iter()
        .map(|(service_type, n)| line(apg_rate(service_type), n))
        .collect()
}

// ═══════════════════════════════════════════
// Claim status
// ═══════════════════════════════════════════

/// `draft → submitted → paid|denied`; a denied claim may be resubmitted.
pub fn transition_claim(from: ClaimStatus, to: ClaimStatus) -> Result<(), TransitionError> {
    use ClaimStatus::*;
    match (from, to) {
        (Draft, Submitted) | (Submitted, Paid) | (Submitted, Denied) | (Denied, Submitted) => Ok(()),
        _ => Err(TransitionError::invalid("otp claim", from, to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// 2024-03-04 is a Monday.
    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap() + Duration::days(offset)
    }

    fn svc(offset: i64, service_type: OtpServiceType, medication: Option<OtpMedication>) -> OtpService {
        OtpService {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            service_date: day(offset),
            service_type,
            medication,
            recorded_by: "rn.lee".into(),
            created_at: crate::db::now(),
        }
    }

    fn dose(offset: i64, med: OtpMedication) -> OtpService {
        svc(offset, OtpServiceType::MedicationAdministration, Some(med))
    }

    fn codes(plan: &WeeklyClaimPlan) -> Vec<&str> {
        plan.lines.iter().map(|l| l.code.as_str()).collect()
    }

    #[test]
    fn rejects_non_monday_week() {
        let err = build_weekly_claim(day(1), &[dose(1, OtpMedication::Methadone)], Some(PayerType::Medicare))
            .unwrap_err();
        assert_eq!(err, BillingError::NotMonday(day(1)));
    }

    #[test]
    fn week_end_past_calendar_is_rejected() {
        assert_eq!(week_end(day(0)).unwrap(), day(6));
        assert_eq!(week_end(NaiveDate::MAX), Err(BillingError::OutOfRange(NaiveDate::MAX)));
    }

    #[test]
    fn rejects_empty_week() {
        // Service on the following Monday is outside the week.
        let err = build_weekly_claim(day(0), &[dose(7, OtpMedication::Methadone)], Some(PayerType::Medicare))
            .unwrap_err();
        assert_eq!(err, BillingError::NoServices(day(0)));
    }

    #[test]
    fn medication_plus_counseling_bundles_on_dominant_medication() {
        let services = vec![
            dose(0, OtpMedication::Methadone),
            dose(1, OtpMedication::Methadone),
            dose(2, OtpMedication::Buprenorphine),
            svc(2, OtpServiceType::IndividualCounseling, None),
        ];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::Medicaid)).unwrap();
        assert_eq!(plan.billing_method, BillingMethod::Bundle);
        assert_eq!(codes(&plan), vec!["G2067"]);
        assert_eq!(plan.total_cents, 21_955);
    }

    #[test]
    fn medication_tie_uses_enum_order() {
        let services = vec![
            dose(0, OtpMedication::Buprenorphine),
            dose(1, OtpMedication::Methadone),
            svc(1, OtpServiceType::ToxicologyTest, None),
        ];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::Medicare)).unwrap();
        assert_eq!(codes(&plan)[0], "G2067");
    }

    #[test]
    fn bundle_add_ons() {
        let services = vec![
            dose(0, OtpMedication::Methadone),
            svc(0, OtpServiceType::IntakeAssessment, None),
            svc(1, OtpServiceType::TakeHomeDispense, Some(OtpMedication::Methadone)),
            svc(3, OtpServiceType::TakeHomeDispense, Some(OtpMedication::Methadone)),
            svc(1, OtpServiceType::IndividualCounseling, None),
            svc(2, OtpServiceType::GroupCounseling, None),
            svc(4, OtpServiceType::GroupCounseling, None),
            svc(5, OtpServiceType::IndividualCounseling, None),
        ];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::Medicare)).unwrap();
        assert_eq!(codes(&plan), vec!["G2067", "G2076", "G2078", "G2080"]);

        let take_home = &plan.lines[2];
        assert_eq!(take_home.units, 2);
        assert_eq!(take_home.amount_cents, 2 * 3_689);
        let extra = &plan.lines[3];
        assert_eq!(extra.units, 2);

        let expected: i64 = plan.lines.iter().map(|l| l.amount_cents).sum();
        assert_eq!(plan.total_cents, expected);
    }

    #[test]
    fn non_drug_week_for_medicare_uses_g2074() {
        let services = vec![
            svc(0, OtpServiceType::IndividualCounseling, None),
            svc(2, OtpServiceType::PeriodicAssessment, None),
        ];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::MedicareAdvantage)).unwrap();
        assert_eq!(plan.billing_method, BillingMethod::Bundle);
        assert_eq!(codes(&plan), vec!["G2074", "G2077"]);
    }

    #[test]
    fn non_drug_week_for_medicaid_is_apg() {
        let services = vec![svc(0, OtpServiceType::IndividualCounseling, None)];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::Medicaid)).unwrap();
        assert_eq!(plan.billing_method, BillingMethod::Apg);
        assert_eq!(codes(&plan), vec!["APG-0323"]);
    }

    #[test]
    fn medication_only_week_is_apg() {
        let services = vec![dose(0, OtpMedication::Methadone), dose(1, OtpMedication::Methadone)];
        let plan = build_weekly_claim(day(0), &services, Some(PayerType::Medicare)).unwrap();
        assert_eq!(plan.billing_method, BillingMethod::Apg);
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].units, 2);
    }

    #[test]
    fn commercial_and_uninsured_are_apg() {
        let services = vec![
            dose(0, OtpMedication::Methadone),
            svc(0, OtpServiceType::IndividualCounseling, None),
        ];
        for payer in [Some(PayerType::Commercial), Some(PayerType::SelfPay), None] {
            let plan = build_weekly_claim(day(0), &services, payer).unwrap();
            assert_eq!(plan.billing_method, BillingMethod::Apg, "payer {payer:?}");
            assert_eq!(plan.lines.len(), 2);
        }
    }

    #[test]
    fn claim_status_machine() {
        assert!(transition_claim(ClaimStatus::Draft, ClaimStatus::Submitted).is_ok());
        assert!(transition_claim(ClaimStatus::Denied, ClaimStatus::Submitted).is_ok());
        assert!(transition_claim(ClaimStatus::Draft, ClaimStatus::Paid).is_err());
        assert!(transition_claim(ClaimStatus::Paid, ClaimStatus::Denied).is_err());
    }
}
