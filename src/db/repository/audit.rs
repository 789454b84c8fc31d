use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// One row of the request audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRow {
    pub timestamp: String,
    pub account_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status: u16,
}

/// Insert a batch of audit entries into the audit_log table.
pub fn insert_audit_entries(conn: &Connection, entries: &[AuditRow]) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(
        "INSERT INTO audit_log (timestamp, account_id, method, path, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for entry in entries {
        stmt.execute(params![
            entry.timestamp,
            entry.account_id,
            entry.method,
            entry.path,
            entry.status,
        ])?;
    }
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

pub fn count_audit_entries(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(count)
}
