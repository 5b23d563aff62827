//! Repository layer: entity-scoped database operations.
//!
//! One sub-module per record family; every public function takes a
//! borrowed `Connection` and is re-exported here.

mod audit;
mod diversion;
mod dosing;
mod dual_eligible;
mod equity;
mod facility;
mod insurance;
mod lab;
mod otp_billing;
mod patient;
mod pmp;
mod prior_auth;
mod staff;
mod support;
mod vaccination;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{DatabaseError, DATETIME_FORMAT};

pub use audit::*;
pub use diversion::*;
pub use dosing::*;
pub use dual_eligible::*;
pub use equity::*;
pub use facility::*;
pub use insurance::*;
pub use lab::*;
pub use otp_billing::*;
pub use patient::*;
pub use pmp::*;
pub use prior_auth::*;
pub use staff::*;
pub use support::*;
pub use vaccination::*;

// ── Guarded updates ───────────────────────────────────────

/// Error for a status-guarded update that matched no row: either the row is
/// gone, or its status moved on since the caller read it.
pub(crate) fn guarded_update_miss(
    conn: &Connection,
    table: &str,
    entity: &str,
    id: &Uuid,
    expected_status: &str,
) -> DatabaseError {
    let exists = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1"),
            params![id.to_string()],
            |_| Ok(()),
        )
        .optional();
    match exists {
        Ok(Some(())) => DatabaseError::ConstraintViolation(format!(
            "{entity} {id} is no longer {expected_status}"
        )),
        Ok(None) => DatabaseError::not_found(entity, id),
        Err(e) => e.into(),
    }
}

// ── Column conversion helpers ──────────────────────────────

pub(crate) fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid id {s}: {e}")))
}

pub(crate) fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    s.as_deref().map(parse_uuid).transpose()
}

pub(crate) fn parse_datetime(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid timestamp {s}: {e}")))
}

pub(crate) fn parse_opt_datetime(s: Option<String>) -> Result<Option<NaiveDateTime>, DatabaseError> {
    s.as_deref().map(parse_datetime).transpose()
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid date {s}: {e}")))
}

pub(crate) fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, DatabaseError> {
    s.as_deref().map(parse_date).transpose()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_helpers_use_storage_format() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        let s = fmt_datetime(&dt);
        assert_eq!(s, "2024-05-06 07:08:09");
        assert_eq!(parse_datetime(&s).unwrap(), dt);
    }

    #[test]
    fn malformed_values_are_constraint_violations() {
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
        assert!(matches!(
            parse_date("2024-13-01"),
            Err(DatabaseError::ConstraintViolation(_))
        ));
        assert_eq!(parse_opt_date(None).unwrap(), None);
    }
}
