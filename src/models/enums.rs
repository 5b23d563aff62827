use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(StaffRole {
    Admin => "admin",
    Clinician => "clinician",
    Billing => "billing",
    Support => "support",
});

str_enum!(Program {
    Otp => "otp",
    PrimaryCare => "primary_care",
    BehavioralHealth => "behavioral_health",
});

str_enum!(PatientStatus {
    Active => "active",
    Discharged => "discharged",
});

str_enum!(AddressType {
    Home => "home",
    Mailing => "mailing",
    Temporary => "temporary",
});

str_enum!(PayerType {
    Medicare => "medicare",
    MedicareAdvantage => "medicare_advantage",
    Medicaid => "medicaid",
    MedicaidManagedCare => "medicaid_managed_care",
    Commercial => "commercial",
    SelfPay => "self_pay",
});

impl PayerType {
    pub fn is_medicare(&self) -> bool {
        matches!(self, Self::Medicare | Self::MedicareAdvantage)
    }

    pub fn is_medicaid(&self) -> bool {
        matches!(self, Self::Medicaid | Self::MedicaidManagedCare)
    }
}

str_enum!(CoveragePriority {
    Primary => "primary",
    Secondary => "secondary",
    Tertiary => "tertiary",
});

str_enum!(EligibilityStatus {
    Eligible => "eligible",
    NoCoverage => "no_coverage",
});

str_enum!(DualClaimStatus {
    PendingMedicare => "pending_medicare",
    MedicareAdjudicated => "medicare_adjudicated",
    MedicaidSubmitted => "medicaid_submitted",
    Completed => "completed",
    Denied => "denied",
});

str_enum!(OtpServiceType {
    MedicationAdministration => "medication_administration",
    TakeHomeDispense => "take_home_dispense",
    IndividualCounseling => "individual_counseling",
    GroupCounseling => "group_counseling",
    ToxicologyTest => "toxicology_test",
    IntakeAssessment => "intake_assessment",
    PeriodicAssessment => "periodic_assessment",
});

impl OtpServiceType {
    /// Services that deliver medication (and therefore need one named).
    pub fn is_medication(&self) -> bool {
        matches!(self, Self::MedicationAdministration | Self::TakeHomeDispense)
    }

    pub fn is_counseling(&self) -> bool {
        matches!(self, Self::IndividualCounseling | Self::GroupCounseling)
    }
}

str_enum!(OtpMedication {
    Methadone => "methadone",
    Buprenorphine => "buprenorphine",
    Naltrexone => "naltrexone",
});

str_enum!(BillingMethod {
    Bundle => "bundle",
    Apg => "apg",
});

str_enum!(ClaimStatus {
    Draft => "draft",
    Submitted => "submitted",
    Paid => "paid",
    Denied => "denied",
});

str_enum!(KitStatus {
    Prepared => "prepared",
    Dispensed => "dispensed",
    Returned => "returned",
    Lost => "lost",
});

str_enum!(DispensingAction {
    Prepared => "prepared",
    Dispensed => "dispensed",
    Returned => "returned",
    ReportedLost => "reported_lost",
});

str_enum!(ComplianceAlertType {
    MissedReturn => "missed_return",
    LostKit => "lost_kit",
    GeofenceViolation => "geofence_violation",
    BiometricFailure => "biometric_failure",
    CallbackMissed => "callback_missed",
});

str_enum!(AlertSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

str_enum!(ComplianceAlertStatus {
    Open => "open",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
});

str_enum!(BiometricType {
    Face => "face",
    Fingerprint => "fingerprint",
    Palm => "palm",
});

str_enum!(VerificationOutcome {
    Verified => "verified",
    FailedBiometric => "failed_biometric",
    OutsideGeofence => "outside_geofence",
    NotEnrolled => "not_enrolled",
});

str_enum!(SafetyCategory {
    FireSafety => "fire_safety",
    EmergencyEquipment => "emergency_equipment",
    InfectionControl => "infection_control",
    MedicationStorage => "medication_storage",
    Security => "security",
    Environmental => "environmental",
});

str_enum!(ComplianceStatus {
    Compliant => "compliant",
    DueSoon => "due_soon",
    Overdue => "overdue",
});

str_enum!(TicketCategory {
    Hardware => "hardware",
    Software => "software",
    Network => "network",
    EhrAccess => "ehr_access",
    Printer => "printer",
    Phone => "phone",
    Other => "other",
});

str_enum!(TicketPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
    Urgent => "urgent",
});

str_enum!(TicketStatus {
    Open => "open",
    InProgress => "in_progress",
    WaitingOnUser => "waiting_on_user",
    Resolved => "resolved",
    Closed => "closed",
});

str_enum!(LabPriority {
    Routine => "routine",
    Stat => "stat",
});

str_enum!(LabOrderStatus {
    Ordered => "ordered",
    Collected => "collected",
    Sent => "sent",
    Resulted => "resulted",
    Cancelled => "cancelled",
});

str_enum!(AbnormalFlag {
    Normal => "normal",
    Low => "low",
    High => "high",
    CriticalLow => "critical_low",
    CriticalHigh => "critical_high",
});

str_enum!(PriorAuthStatus {
    Draft => "draft",
    Submitted => "submitted",
    Approved => "approved",
    Denied => "denied",
    Appealed => "appealed",
    Expired => "expired",
});

str_enum!(PmpRiskFlag {
    None => "none",
    Review => "review",
    Alert => "alert",
});

str_enum!(EquityAlertLevel {
    None => "none",
    Monitor => "monitor",
    Warning => "warning",
    Critical => "critical",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn as_str_round_trips_through_from_str() {
        assert_eq!(
            TicketStatus::from_str(TicketStatus::WaitingOnUser.as_str()).unwrap(),
            TicketStatus::WaitingOnUser
        );
        assert_eq!(
            PayerType::from_str("medicaid_managed_care").unwrap(),
            PayerType::MedicaidManagedCare
        );
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = KitStatus::from_str("misplaced").unwrap_err();
        match err {
            DatabaseError::InvalidEnum { field, value } => {
                assert_eq!(field, "KitStatus");
                assert_eq!(value, "misplaced");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serde_uses_storage_names() {
        let json = serde_json::to_string(&SafetyCategory::EmergencyEquipment).unwrap();
        assert_eq!(json, "\"emergency_equipment\"");
        let parsed: TicketCategory = serde_json::from_str("\"ehr_access\"").unwrap();
        assert_eq!(parsed, TicketCategory::EhrAccess);
    }

    #[test]
    fn payer_classes() {
        assert!(PayerType::MedicareAdvantage.is_medicare());
        assert!(PayerType::MedicaidManagedCare.is_medicaid());
        assert!(!PayerType::Commercial.is_medicare());
        assert!(!PayerType::SelfPay.is_medicaid());
    }
}
