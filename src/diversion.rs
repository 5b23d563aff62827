//! Diversion control for take-home doses: biometric identity plus a
//! geofence around the patient's primary home address.

use base64::Engine;
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::enums::*;
use crate::models::{ComplianceAlert, DiversionVerification, LocationException};
use crate::workflow::TransitionError;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Thresholds applied to every verification attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversionSettings {
    pub geofence_radius_m: f64,
    pub biometric_threshold: f64,
}

impl Default for DiversionSettings {
    fn default() -> Self {
        Self {
            geofence_radius_m: 500.0,
            biometric_threshold: 0.85,
        }
    }
}

/// Great-circle distance between two `(latitude, longitude)` points.
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Hex SHA-256 of a base64-encoded biometric template.
pub fn hash_template(template_b64: &str) -> Result<String, TransitionError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(template_b64.trim())
        .map_err(|e| TransitionError::InvalidInput(format!("template is not valid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(TransitionError::InvalidInput("template is empty".into()));
    }
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Alert severity for a failed verification, from the patient's risk score.
pub fn alert_severity(risk_score: i32) -> AlertSeverity {
    match risk_score {
        s if s >= 70 => AlertSeverity::High,
        s if s >= 40 => AlertSeverity::Medium,
        _ => AlertSeverity::Low,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationDecision {
    pub outcome: VerificationOutcome,
    /// Distance from the primary home address, when it has coordinates.
    pub distance_m: Option<f64>,
    /// Exception that allowed a point outside the home geofence.
    pub exception_id: Option<Uuid>,
}

/// Decide the outcome of one attempt.
///
/// Checks run in order: enrollment, match score, then geofence. The
/// geofence step is skipped when the home address has no coordinates.
pub fn decide(
    settings: &DiversionSettings,
    enrolled: bool,
    match_score: f64,
    point: (f64, f64),
    home: Option<(f64, f64)>,
    active_exceptions: &[&LocationException],
) -> VerificationDecision {
    let distance_m = home.map(|h| haversine_m(h, point));
    let decision = |outcome, exception_id| VerificationDecision {
        outcome,
        distance_m,
        exception_id,
    };

    if !enrolled {
        return decision(VerificationOutcome::NotEnrolled, None);
    }
    if match_score < settings.biometric_threshold {
        return decision(VerificationOutcome::FailedBiometric, None);
    }
    match distance_m {
        Some(d) if d > settings.geofence_radius_m => {
            let covering = active_exceptions
                .iter()
                .find(|e| haversine_m((e.latitude, e.longitude), point) <= e.radius_m);
            match covering {
                Some(exc) => decision(VerificationOutcome::Verified, Some(exc.id)),
                None => decision(VerificationOutcome::OutsideGeofence, None),
            }
        }
        _ => decision(VerificationOutcome::Verified, None),
    }
}

/// Compliance alert for a failed attempt. Verified and not-enrolled
/// attempts raise none.
pub fn verification_alert(
    verification: &DiversionVerification,
    risk_score: i32,
    now: NaiveDateTime,
) -> Option<ComplianceAlert> {
    let (alert_type, message) = match verification.outcome {
        VerificationOutcome::FailedBiometric => (
            ComplianceAlertType::BiometricFailure,
            format!(
                "{} match score {:.2} below threshold",
                verification.biometric_type, verification.match_score
            ),
        ),
        VerificationOutcome::OutsideGeofence => (
            ComplianceAlertType::GeofenceViolation,
            match verification.distance_m {
                Some(d) => format!("Verification {d:.0} m from primary home address"),
                None => "Verification outside the home geofence".to_string(),
            },
        ),
        VerificationOutcome::Verified | VerificationOutcome::NotEnrolled => return None,
    };

    Some(ComplianceAlert {
        id: Uuid::new_v4(),
        patient_id: verification.patient_id,
        kit_id: verification.kit_id,
        alert_type,
        severity: alert_severity(risk_score),
        message,
        status: ComplianceAlertStatus::Open,
        created_at: now,
        resolved_at: None,
        resolved_by: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const HOME: (f64, f64) = (40.7128, -74.0060);

    fn exception(center: (f64, f64), radius_m: f64) -> LocationException {
        LocationException {
            id: Uuid::new_v4(),
            patient_id: Uuid::nil(),
            reason: "Visiting family".into(),
            latitude: center.0,
            longitude: center.1,
            radius_m,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            approved_by: "dr.ortiz".into(),
            created_at: crate::db::now(),
        }
    }

    #[test]
    fn haversine_known_distance() {
        // New York to Philadelphia is roughly 130 km.
        let d = haversine_m(HOME, (39.9526, -75.1652));
        assert!((125_000.0..135_000.0).contains(&d), "got {d}");
        assert_eq!(haversine_m(HOME, HOME), 0.0);
    }

    #[test]
    fn template_hash_is_hex_sha256() {
        let hash = hash_template("aGVsbG8=").unwrap(); // "hello"
        assert_eq!(hash, "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824");
        assert!(hash_template("not base64!").is_err());
        assert!(hash_template("").is_err());
    }

    #[test]
    fn severity_follows_risk_score() {
        assert_eq!(alert_severity(85), AlertSeverity::High);
        assert_eq!(alert_severity(70), AlertSeverity::High);
        assert_eq!(alert_severity(40), AlertSeverity::Medium);
        assert_eq!(alert_severity(39), AlertSeverity::Low);
    }

    #[test]
    fn decision_order() {
        let s = DiversionSettings::default();
        let far = (40.80, -74.0060);

        assert_eq!(decide(&s, false, 0.99, HOME, Some(HOME), &[]).outcome, VerificationOutcome::NotEnrolled);
        assert_eq!(decide(&s, true, 0.5, far, Some(HOME), &[]).outcome, VerificationOutcome::FailedBiometric);
        assert_eq!(decide(&s, true, 0.9, far, Some(HOME), &[]).outcome, VerificationOutcome::OutsideGeofence);
        assert_eq!(decide(&s, true, 0.85, HOME, Some(HOME), &[]).outcome, VerificationOutcome::Verified);
    }

    #[test]
    fn geofence_skipped_without_home_coordinates() {
        let s = DiversionSettings::default();
        let d = decide(&s, true, 0.9, (0.0, 0.0), None, &[]);
        assert_eq!(d.outcome, VerificationOutcome::Verified);
        assert!(d.distance_m.is_none());
    }

    #[test]
    fn active_exception_covers_point() {
        let s = DiversionSettings::default();
        let far = (40.80, -74.0060);
        let covering = exception(far, 300.0);
        let elsewhere = exception((41.5, -73.0), 300.0);

        let d = decide(&s, true, 0.9, far, Some(HOME), &[&elsewhere, &covering]);
        assert_eq!(d.outcome, VerificationOutcome::Verified);
        assert_eq!(d.exception_id, Some(covering.id));
        assert!(d.distance_m.unwrap() > 500.0);

        let d = decide(&s, true, 0.9, far, Some(HOME), &[&elsewhere]);
        assert_eq!(d.outcome, VerificationOutcome::OutsideGeofence);
    }

    #[test]
    fn alerts_only_for_failures() {
        let mut v = DiversionVerification {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            kit_id: None,
            biometric_type: BiometricType::Fingerprint,
            match_score: 0.4,
            latitude: HOME.0,
            longitude: HOME.1,
            distance_m: Some(0.0),
            exception_id: None,
            outcome: VerificationOutcome::FailedBiometric,
            verified_at: crate::db::now(),
        };
        let alert = verification_alert(&v, 75, crate::db::now()).unwrap();
        assert_eq!(alert.alert_type, ComplianceAlertType::BiometricFailure);
        assert_eq!(alert.severity, AlertSeverity::High);

        v.outcome = VerificationOutcome::OutsideGeofence;
        v.distance_m = Some(1234.0);
        let alert = verification_alert(&v, 10, crate::db::now()).unwrap();
        assert_eq!(alert.alert_type, ComplianceAlertType::GeofenceViolation);
        assert_eq!(alert.severity, AlertSeverity::Low);
        assert!(alert.message.contains("1234 m"));

        v.outcome = VerificationOutcome::NotEnrolled;
        assert!(verification_alert(&v, 90, crate::db::now()).is_none());
        v.outcome = VerificationOutcome::Verified;
        assert!(verification_alert(&v, 90, crate::db::now()).is_none());
    }
}
