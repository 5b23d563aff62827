use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(
    conn: &Connection,
    entries: &[(String, String, String, String)], // (timestamp, source, action, entity)
) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO audit_log (timestamp, source, action, entity) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (timestamp, source, action, entity) in entries {
            stmt.execute(params![timestamp, source, action, entity])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Prune audit entries older than the given number of days.
pub fn prune_audit_log(conn: &Connection, retention_days: i64) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM audit_log WHERE timestamp < datetime('now', ?1)",
        params![format!("-{retention_days} days")],
    )?;
    Ok(deleted)
}

/// Audit entries recorded for one staff source within the last N days.
/// Returns (timestamp, action, entity) tuples, newest first.
pub fn query_audit_by_source(
    conn: &Connection,
    source: &str,
    days: i64,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT timestamp, action, entity FROM audit_log
         WHERE source = ?1 AND timestamp >= datetime('now', ?2)
         ORDER BY timestamp DESC",
    )?;
    let rows = stmt
        .query_map(params![source, format!("-{days} days")], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{fmt_datetime, test_support::test_db};

    #[test]
    fn entries_are_queryable_by_source() {
        let conn = test_db();
        let now = fmt_datetime(&crate::db::now());
        insert_audit_entries(
            &conn,
            &[
                (now.clone(), "staff:alex".into(), "GET /api/patients".into(), "status:200".into()),
                (now, "staff:sam".into(), "GET /api/lab/orders".into(), "status:200".into()),
            ],
        )
        .unwrap();

        let alex = query_audit_by_source(&conn, "staff:alex", 1).unwrap();
        assert_eq!(alex.len(), 1);
        assert_eq!(alex[0].1, "GET /api/patients");
    }

    #[test]
    fn prune_removes_only_old_entries() {
        let conn = test_db();
        insert_audit_entries(
            &conn,
            &[
                ("2001-01-01 00:00:00".into(), "staff:old".into(), "GET /".into(), "status:200".into()),
                (fmt_datetime(&crate::db::now()), "staff:new".into(), "GET /".into(), "status:200".into()),
            ],
        )
        .unwrap();
        assert_eq!(prune_audit_log(&conn, 365).unwrap(), 1);
    }
}
