use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::EquityAlertLevel;
use crate::models::{EquityFilter, EquityMetric, EquitySnapshotRow, OutcomeObservation};

use super::{parse_date, parse_opt_uuid, parse_uuid};

/// Insert or update a metric definition keyed by `metric_id`.
pub fn upsert_equity_metric(conn: &Connection, metric: &EquityMetric) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO equity_metrics (metric_id, metric_name, benchmark_value, equity_target, higher_is_better)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(metric_id) DO UPDATE SET
            metric_name = excluded.metric_name,
            benchmark_value = excluded.benchmark_value,
            equity_target = excluded.equity_target,
            higher_is_better = excluded.higher_is_better",
        params![
            metric.metric_id,
            metric.metric_name,
            metric.benchmark_value,
            metric.equity_target,
            metric.higher_is_better as i32,
        ],
    )?;
    Ok(())
}

pub fn get_equity_metric(conn: &Connection, metric_id: &str) -> Result<Option<EquityMetric>, DatabaseError> {
    let metric = conn
        .query_row(
            "SELECT metric_id, metric_name, benchmark_value, equity_target, higher_is_better
             FROM equity_metrics WHERE metric_id = ?1",
            params![metric_id],
            metric_from_row,
        )
        .optional()?;
    Ok(metric)
}

pub fn list_equity_metrics(conn: &Connection) -> Result<Vec<EquityMetric>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT metric_id, metric_name, benchmark_value, equity_target, higher_is_better
         FROM equity_metrics ORDER BY metric_id",
    )?;
    let metrics = stmt
        .query_map([], metric_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(metrics)
}

fn metric_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EquityMetric> {
    Ok(EquityMetric {
        metric_id: row.get(0)?,
        metric_name: row.get(1)?,
        benchmark_value: row.get(2)?,
        equity_target: row.get(3)?,
        higher_is_better: row.get::<_, i32>(4)? != 0,
    })
}

// ── Observations ───────────────────────────────────────────

pub fn insert_outcome_observation(conn: &Connection, obs: &OutcomeObservation) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO outcome_observations (id, patient_id, metric_id, stratification_type,
         group_name, value, observed_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            obs.id.to_string(),
            obs.patient_id.map(|id| id.to_string()),
            obs.metric_id,
            obs.stratification_type,
            obs.group_name,
            obs.value,
            obs.observed_on.to_string(),
        ],
    )?;
    Ok(())
}

pub fn list_outcome_observations(
    conn: &Connection,
    filter: &EquityFilter,
) -> Result<Vec<OutcomeObservation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, patient_id, metric_id, stratification_type, group_name, value, observed_on
         FROM outcome_observations
         WHERE (?1 IS NULL OR metric_id = ?1) AND (?2 IS NULL OR stratification_type = ?2)
         ORDER BY metric_id, stratification_type, group_name, observed_on",
    )?;
    let rows = stmt.query_map(
        params![filter.metric_id, filter.stratification_type],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, String>(6)?,
            ))
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        let (id, patient_id, metric_id, stratification_type, group_name, value, observed_on) = row?;
        out.push(OutcomeObservation {
            id: parse_uuid(&id)?,
            patient_id: parse_opt_uuid(patient_id)?,
            metric_id,
            stratification_type,
            group_name,
            value,
            observed_on: parse_date(&observed_on)?,
        });
    }
    Ok(out)
}

// ── Snapshots ──────────────────────────────────────────────

/// Replace every snapshot row dated `snapshot_date` with `rows`.
pub fn replace_equity_snapshot(
    conn: &Connection,
    snapshot_date: NaiveDate,
    rows: &[EquitySnapshotRow],
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM equity_snapshots WHERE snapshot_date = ?1",
        params![snapshot_date.to_string()],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO equity_snapshots (id, snapshot_date, metric_id, metric_name,
             stratification_type, group_name, value, sample_size, disparity, alert_level,
             benchmark_value, equity_target)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for r in rows {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                snapshot_date.to_string(),
                r.metric_id,
                r.metric_name,
                r.stratification_type,
                r.group_name,
                r.value,
                r.sample_size,
                r.disparity,
                r.alert_level.as_str(),
                r.benchmark_value,
                r.equity_target,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Rows of the most recent snapshot date that holds rows matching the filter.
pub fn latest_equity_snapshot(
    conn: &Connection,
    filter: &EquityFilter,
) -> Result<Vec<EquitySnapshotRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT snapshot_date, metric_id, metric_name, stratification_type, group_name, value,
                sample_size, disparity, alert_level, benchmark_value, equity_target
         FROM equity_snapshots
         WHERE snapshot_date = (
                 SELECT MAX(snapshot_date) FROM equity_snapshots
                 WHERE (?1 IS NULL OR metric_id = ?1)
                   AND (?2 IS NULL OR stratification_type = ?2)
               )
           AND (?1 IS NULL OR metric_id = ?1)
           AND (?2 IS NULL OR stratification_type = ?2)
         ORDER BY metric_id, stratification_type, group_name",
    )?;
    let rows = stmt.query_map(
        params![filter.metric_id, filter.stratification_type],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, f64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, f64>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, Option<f64>>(9)?,
                row.get::<_, Option<f64>>(10)?,
            ))
        },
    )?;

    let mut out = Vec::new();
    for row in rows {
        let (date, metric_id, metric_name, strat, group_name, value, sample_size, disparity, level, bench, target) =
            row?;
        out.push(EquitySnapshotRow {
            snapshot_date: parse_date(&date)?,
            metric_id,
            metric_name,
            stratification_type: strat,
            group_name,
            value,
            sample_size,
            disparity,
            alert_level: EquityAlertLevel::from_str(&level)?,
            benchmark_value: bench,
            equity_target: target,
        });
    }
    Ok(out)
}
