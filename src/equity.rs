//! Health-equity reporting.
//!
//! Outcome observations are averaged per `(metric, stratification_type,
//! group)`. Within each stratification the group with the largest sample
//! is the reference; every other group's disparity is its distance from
//! that reference, and an unfavorable relative gap raises an alert level.
//! The dashboard reads the result grouped per metric and stratification.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::enums::EquityAlertLevel;
use crate::models::{EquityMetric, EquitySnapshotRow, OutcomeObservation};

/// Relative gap at or above which a disparity is critical.
pub const CRITICAL_GAP: f64 = 0.20;
pub const WARNING_GAP: f64 = 0.10;
pub const MONITOR_GAP: f64 = 0.05;

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    pub group_name: String,
    pub value: f64,
    pub sample_size: i64,
    pub disparity: f64,
    pub alert_level: EquityAlertLevel,
}

/// All groups of one stratification for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratifiedOutcome {
    pub metric_id: String,
    pub metric_name: String,
    pub stratification_type: String,
    pub groups: Vec<GroupOutcome>,
    pub reference_group: Option<String>,
    pub reference_value: Option<f64>,
    pub benchmark_value: Option<f64>,
    pub equity_target: Option<f64>,
}

/// Where the rows behind a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquitySource {
    Calculated,
    Snapshot,
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityReport {
    pub source: EquitySource,
    pub snapshot_date: Option<NaiveDate>,
    pub outcomes: Vec<StratifiedOutcome>,
}

// ═══════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════

/// Alert level of `value` measured against the reference group.
///
/// Only a gap in the unfavorable direction counts. The gap is relative to
/// the reference value, or absolute when the reference is zero.
pub fn alert_level(value: f64, reference: f64, higher_is_better: bool) -> EquityAlertLevel {
    let gap = value - reference;
    let unfavorable = if higher_is_better { gap < 0.0 } else { gap > 0.0 };
    if !unfavorable {
        return EquityAlertLevel::None;
    }

    let relative = if reference == 0.0 {
        gap.abs()
    } else {
        gap.abs() / reference.abs()
    };

    if relative >= CRITICAL_GAP {
        EquityAlertLevel::Critical
    } else if relative >= WARNING_GAP {
        EquityAlertLevel::Warning
    } else if relative >= MONITOR_GAP {
        EquityAlertLevel::Monitor
    } else {
        EquityAlertLevel::None
    }
}

/// Compute per-group snapshot rows from raw observations.
///
/// Observations whose metric is not defined are ignored. Rows come out
/// ordered by metric, stratification and group name.
pub fn calculate_stratified_outcomes(
    metrics: &[EquityMetric],
    observations: &[OutcomeObservation],
    snapshot_date: NaiveDate,
) -> Vec<EquitySnapshotRow> {
    let by_id: HashMap<&str, &EquityMetric> =
        metrics.iter().map(|m| (m.metric_id.as_str(), m)).collect();

    // (metric, stratification) -> group -> (sum, count)
    let mut buckets: BTreeMap<(&str, &str), BTreeMap<&str, (f64, i64)>> = BTreeMap::new();
    for obs in observations {
        if !by_id.contains_key(obs.metric_id.as_str()) {
            continue;
        }
        let entry = buckets
            .entry((obs.metric_id.as_str(), obs.stratification_type.as_str()))
            .or_default()
            .entry(obs.group_name.as_str())
            .or_insert((0.0, 0));
        entry.0 += obs.value;
        entry.1 += 1;
    }

    let mut rows = Vec::new();
    for ((metric_id, stratification), groups) in buckets {
        let Some(metric) = by_id.get(metric_id) else {
            continue;
        };

        // Largest sample wins; BTreeMap order makes the earliest name win ties.
        let mut reference: Option<(f64, i64)> = None;
        for (sum, count) in groups.values() {
            if reference.map_or(true, |(_, best)| *count > best) {
                reference = Some((sum / *count as f64, *count));
            }
        }
        let Some((reference_value, _)) = reference else {
            continue;
        };

        for (group_name, (sum, count)) in groups {
            let value = sum / count as f64;
            rows.push(EquitySnapshotRow {
                snapshot_date,
                metric_id: metric_id.to_string(),
                metric_name: metric.metric_name.clone(),
                stratification_type: stratification.to_string(),
                group_name: group_name.to_string(),
                value,
                sample_size: count,
                disparity: value - reference_value,
                alert_level: alert_level(value, reference_value, metric.higher_is_better),
                benchmark_value: metric.benchmark_value,
                equity_target: metric.equity_target,
            });
        }
    }
    rows
}

/// Group flat snapshot rows by `(metric_id, stratification_type)`.
///
/// The reference group is the first row with zero disparity, or the first
/// row of the group when none has zero disparity. Groups keep input order.
pub fn group_stratified_outcomes(rows: &[EquitySnapshotRow]) -> Vec<StratifiedOutcome> {
    let mut grouped: BTreeMap<(&str, &str), Vec<&EquitySnapshotRow>> = BTreeMap::new();
    for row in rows {
        grouped
            .entry((row.metric_id.as_str(), row.stratification_type.as_str()))
            .or_default()
            .push(row);
    }

    grouped
        .into_iter()
        .filter_map(|((metric_id, stratification), members)| {
            let first = *members.first()?;
            let reference = members
                .iter()
                .find(|r| r.disparity == 0.0)
                .copied()
                .unwrap_or(first);

            Some(StratifiedOutcome {
                metric_id: metric_id.to_string(),
                metric_name: first.metric_name.clone(),
                stratification_type: stratification.to_string(),
                groups: members
                    .iter()
                    .map(|r| GroupOutcome {
                        group_name: r.group_name.clone(),
                        value: r.value,
                        sample_size: r.sample_size,
                        disparity: r.disparity,
                        alert_level: r.alert_level,
                    })
                    .collect(),
                reference_group: Some(reference.group_name.clone()),
                reference_value: Some(reference.value),
                benchmark_value: first.benchmark_value,
                equity_target: first.equity_target,
            })
        })
        .collect()
}

/// Build the dashboard report from freshly calculated rows, falling back to
/// the latest persisted snapshot when the calculation produced nothing.
pub fn build_report<E>(
    calculated: Vec<EquitySnapshotRow>,
    load_snapshot: impl FnOnce() -> Result<Vec<EquitySnapshotRow>, E>,
) -> Result<EquityReport, E> {
    if !calculated.is_empty() {
        let snapshot_date = calculated.first().map(|r| r.snapshot_date);
        return Ok(EquityReport {
            source: EquitySource::Calculated,
            snapshot_date,
            outcomes: group_stratified_outcomes(&calculated),
        });
    }

    let stored = load_snapshot()?;
    if stored.is_empty() {
        return Ok(EquityReport {
            source: EquitySource::Empty,
            snapshot_date: None,
            outcomes: Vec::new(),
        });
    }

    tracing::debug!(rows = stored.len(), "No observations; serving latest equity snapshot");
    Ok(EquityReport {
        source: EquitySource::Snapshot,
        snapshot_date: stored.first().map(|r| r.snapshot_date),
        outcomes: group_stratified_outcomes(&stored),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn metric(id: &str, higher_is_better: bool) -> EquityMetric {
        EquityMetric {
            metric_id: id.into(),
            metric_name: format!("{id} name"),
            benchmark_value: Some(0.75),
            equity_target: Some(0.05),
            higher_is_better,
        }
    }

    fn obs(metric_id: &str, strat: &str, group: &str, value: f64) -> OutcomeObservation {
        OutcomeObservation {
            id: Uuid::new_v4(),
            patient_id: None,
            metric_id: metric_id.into(),
            stratification_type: strat.into(),
            group_name: group.into(),
            value,
            observed_on: date(),
        }
    }

    fn snapshot_row(metric_id: &str, strat: &str, group: &str, value: f64, disparity: f64) -> EquitySnapshotRow {
        EquitySnapshotRow {
            snapshot_date: date(),
            metric_id: metric_id.into(),
            metric_name: "Retention".into(),
            stratification_type: strat.into(),
            group_name: group.into(),
            value,
            sample_size: 5,
            disparity,
            alert_level: EquityAlertLevel::None,
            benchmark_value: Some(0.7),
            equity_target: Some(0.1),
        }
    }

    #[test]
    fn alert_level_thresholds_higher_is_better() {
        assert_eq!(alert_level(0.70, 1.0, true), EquityAlertLevel::Critical);
        assert_eq!(alert_level(0.85, 1.0, true), EquityAlertLevel::Warning);
        assert_eq!(alert_level(0.93, 1.0, true), EquityAlertLevel::Monitor);
        assert_eq!(alert_level(0.98, 1.0, true), EquityAlertLevel::None);
        // Doing better than the reference never alerts.
        assert_eq!(alert_level(1.5, 1.0, true), EquityAlertLevel::None);
    }

    #[test]
    fn alert_level_lower_is_better() {
        assert_eq!(alert_level(13.0, 10.0, false), EquityAlertLevel::Critical);
        assert_eq!(alert_level(7.0, 10.0, false), EquityAlertLevel::None);
    }

    #[test]
    fn alert_level_zero_reference_uses_absolute_gap() {
        assert_eq!(alert_level(0.3, 0.0, false), EquityAlertLevel::Critical);
        assert_eq!(alert_level(0.07, 0.0, false), EquityAlertLevel::Monitor);
    }

    #[test]
    fn calculation_picks_largest_group_as_reference() {
        let metrics = vec![metric("retention", true)];
        let observations = vec![
            obs("retention", "race", "White", 1.0),
            obs("retention", "race", "White", 1.0),
            obs("retention", "race", "White", 0.0),
            obs("retention", "race", "Black", 1.0),
            obs("retention", "race", "Black", 0.0),
        ];
        let rows = calculate_stratified_outcomes(&metrics, &observations, date());
        assert_eq!(rows.len(), 2);

        let black = &rows[0];
        let white = &rows[1];
        assert_eq!(black.group_name, "Black");
        assert_eq!(white.sample_size, 3);
        assert_eq!(white.disparity, 0.0);
        assert!((black.disparity - (0.5 - 2.0 / 3.0)).abs() < 1e-9);
        // 0.1667 / 0.6667 = 0.25 relative gap
        assert_eq!(black.alert_level, EquityAlertLevel::Critical);
        assert_eq!(black.benchmark_value, Some(0.75));
    }

    #[test]
    fn calculation_breaks_sample_ties_by_name() {
        let metrics = vec![metric("a1c", false)];
        let observations = vec![
            obs("a1c", "payer", "Medicare", 8.0),
            obs("a1c", "payer", "Medicaid", 7.0),
        ];
        let rows = calculate_stratified_outcomes(&metrics, &observations, date());
        let reference = rows.iter().find(|r| r.disparity == 0.0).unwrap();
        assert_eq!(reference.group_name, "Medicaid");
    }

    #[test]
    fn calculation_skips_unknown_metrics() {
        let rows = calculate_stratified_outcomes(
            &[metric("retention", true)],
            &[obs("unknown", "race", "White", 1.0)],
            date(),
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn grouping_builds_one_entry_per_metric_and_stratification() {
        let rows = vec![
            snapshot_row("retention", "race", "Black", 0.6, -0.1),
            snapshot_row("retention", "race", "White", 0.7, 0.0),
            snapshot_row("retention", "payer", "Medicaid", 0.65, 0.0),
        ];
        let grouped = group_stratified_outcomes(&rows);
        assert_eq!(grouped.len(), 2);

        // Ordered by key: payer before race.
        assert_eq!(grouped[0].stratification_type, "payer");
        let race = &grouped[1];
        assert_eq!(race.groups.len(), 2);
        assert_eq!(race.reference_group.as_deref(), Some("White"));
        assert_eq!(race.reference_value, Some(0.7));
        assert_eq!(race.equity_target, Some(0.1));
    }

    #[test]
    fn grouping_falls_back_to_first_row_as_reference() {
        let rows = vec![
            snapshot_row("retention", "race", "Asian", 0.6, -0.1),
            snapshot_row("retention", "race", "Black", 0.65, -0.05),
        ];
        let grouped = group_stratified_outcomes(&rows);
        assert_eq!(grouped[0].reference_group.as_deref(), Some("Asian"));
    }

    #[test]
    fn grouping_empty_input_is_empty() {
        assert!(group_stratified_outcomes(&[]).is_empty());
    }

    #[test]
    fn report_prefers_calculated_rows() {
        let calculated = vec![snapshot_row("retention", "race", "White", 0.7, 0.0)];
        let report = build_report::<()>(calculated, || panic!("snapshot must not be read")).unwrap();
        assert_eq!(report.source, EquitySource::Calculated);
        assert_eq!(report.outcomes.len(), 1);
    }

    #[test]
    fn report_falls_back_to_snapshot() {
        let report = build_report::<()>(Vec::new(), || {
            Ok(vec![snapshot_row("retention", "race", "White", 0.7, 0.0)])
        })
        .unwrap();
        assert_eq!(report.source, EquitySource::Snapshot);
        assert_eq!(report.snapshot_date, Some(date()));

        let empty = build_report::<()>(Vec::new(), || Ok(Vec::new())).unwrap();
        assert_eq!(empty.source, EquitySource::Empty);
        assert!(empty.outcomes.is_empty());
    }
}
