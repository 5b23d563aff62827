use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::EquityAlertLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityMetric {
    pub metric_id: String,
    pub metric_name: String,
    pub benchmark_value: Option<f64>,
    pub equity_target: Option<f64>,
    pub higher_is_better: bool,
}

/// One patient-level measurement tagged with the stratum it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeObservation {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    pub metric_id: String,
    pub stratification_type: String,
    pub group_name: String,
    pub value: f64,
    pub observed_on: NaiveDate,
}

/// Per-group metric value, either freshly calculated or read back from
/// `equity_snapshots`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshotRow {
    pub snapshot_date: NaiveDate,
    pub metric_id: String,
    pub metric_name: String,
    pub stratification_type: String,
    pub group_name: String,
    pub value: f64,
    pub sample_size: i64,
    pub disparity: f64,
    pub alert_level: EquityAlertLevel,
    pub benchmark_value: Option<f64>,
    pub equity_target: Option<f64>,
}
