//! Shared application state for the HTTP server.
//!
//! `CoreState` holds the database location, diversion thresholds and
//! the buffered audit log. Handlers open a fresh SQLite connection per
//! request through [`CoreState::open_db`].

use std::path::PathBuf;
use std::sync::Mutex;

use uuid::Uuid;

use crate::db;
use crate::diversion::DiversionSettings;

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

/// Audit entries older than this are pruned on flush.
const AUDIT_RETENTION_DAYS: i64 = 365;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    db_path: PathBuf,
    pub diversion: DiversionSettings,
    audit: AuditLogger,
}

impl CoreState {
    /// Create state over an already-migrated database file.
    pub fn new(db_path: impl Into<PathBuf>, diversion: DiversionSettings) -> Self {
        Self {
            db_path: db_path.into(),
            diversion,
            audit: AuditLogger::new(),
        }
    }

    /// Open a database connection. The schema was migrated at startup.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::connect(&self.db_path).map_err(CoreError::Database)
    }

    // ── Audit logging ───────────────────────────────────────

    /// Log an access event. Auto-flushes to DB when buffer is full.
    pub fn log_access(&self, source: AccessSource, action: &str, entity: &str) {
        let needs_flush = self.audit.log(source, action, entity);
        if needs_flush {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    /// Flush audit buffer to DB and prune entries past retention.
    pub fn flush_and_prune_audit(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        self.audit.flush_to_db(&conn)?;
        if let Err(e) = db::repository::prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Access source tracking
// ═══════════════════════════════════════════════════════════

/// Identifies who touched the data, for audit logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessSource {
    /// An authenticated staff member.
    Staff { staff_id: Uuid, staff_name: String },
    /// Startup and maintenance work performed by the server itself.
    System,
}

impl std::fmt::Display for AccessSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Staff { staff_name, .. } => write!(f, "staff:{staff_name}"),
            Self::System => write!(f, "system"),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditEntry>>,
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: chrono::NaiveDateTime,
    pub source: AccessSource,
    pub action: String,
    pub entity: String,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Log an access event to the in-memory buffer.
    /// Returns `true` if the buffer has reached flush threshold.
    pub fn log(&self, source: AccessSource, action: &str, entity: &str) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(AuditEntry {
                timestamp: db::now(),
                source,
                action: action.to_string(),
                entity: entity.to_string(),
            });
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Drain all buffered entries (for flush to SQLite).
    pub fn drain(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    /// Flush buffered entries to SQLite.
    pub fn flush_to_db(&self, conn: &rusqlite::Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }

        let tuples: Vec<(String, String, String, String)> = entries
            .iter()
            .map(|e| {
                (
                    db::repository::fmt_datetime(&e.timestamp),
                    e.source.to_string(),
                    e.action.clone(),
                    e.entity.clone(),
                )
            })
            .collect();

        let count = tuples.len();
        db::repository::insert_audit_entries(conn, &tuples)?;

        tracing::debug!(count, "Flushed audit entries to database");
        Ok(count)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(name: &str) -> AccessSource {
        AccessSource::Staff {
            staff_id: Uuid::new_v4(),
            staff_name: name.into(),
        }
    }

    fn temp_state() -> (tempfile::TempDir, CoreState) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.db");
        db::open_database(&path).unwrap();
        let state = CoreState::new(path, DiversionSettings::default());
        (dir, state)
    }

    #[test]
    fn access_source_display() {
        assert_eq!(staff("alex").to_string(), "staff:alex");
        assert_eq!(AccessSource::System.to_string(), "system");
    }

    #[test]
    fn log_access_buffers_entries() {
        let (_dir, state) = temp_state();
        state.log_access(staff("alex"), "GET /api/patients", "status:200");
        let entries = state.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "GET /api/patients");
    }

    #[test]
    fn flush_writes_to_database_and_empties_buffer() {
        let (_dir, state) = temp_state();
        state.log_access(staff("sam"), "POST /api/otp/claims", "status:201");
        state.log_access(staff("sam"), "GET /api/otp/claims", "status:200");
        state.flush_and_prune_audit().unwrap();

        assert!(state.audit_entries().is_empty());
        let conn = state.open_db().unwrap();
        let rows = db::repository::query_audit_by_source(&conn, "staff:sam", 1).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn buffer_flushes_itself_at_capacity() {
        let (_dir, state) = temp_state();
        for i in 0..AUDIT_BUFFER_CAPACITY {
            state.log_access(staff("bulk"), &format!("GET /api/labs/orders?page={i}"), "status:200");
        }
        assert!(state.audit_entries().is_empty());
        let conn = state.open_db().unwrap();
        let rows = db::repository::query_audit_by_source(&conn, "staff:bulk", 1).unwrap();
        assert_eq!(rows.len(), AUDIT_BUFFER_CAPACITY);
    }

    #[test]
    fn logger_reports_threshold() {
        let logger = AuditLogger::new();
        for _ in 0..AUDIT_BUFFER_CAPACITY - 1 {
            assert!(!logger.log(AccessSource::System, "startup", "-"));
        }
        assert!(logger.log(AccessSource::System, "startup", "-"));
        assert_eq!(logger.buffer_len(), AUDIT_BUFFER_CAPACITY);
    }
}
