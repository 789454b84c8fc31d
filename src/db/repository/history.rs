use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::db::columns::{self, fmt_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::ChangeKind;
use crate::models::{AuditedEntity, HistoryEntry};

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let raw: String = row.get(7)?;
    let snapshot = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(HistoryEntry {
        seq: row.get(0)?,
        entity_type: row.get(1)?,
        entity_id: columns::uuid(row, 2)?,
        version: row.get(3)?,
        change: columns::parsed(row, 4)?,
        changed_by: columns::uuid_opt(row, 5)?,
        changed_at: columns::timestamp(row, 6)?,
        snapshot,
    })
}

/// Append the next version of an entity's saved state.
///
/// Run inside the transaction that performed the primary write.
pub fn append_history<T: Serialize>(
    conn: &Connection,
    entity: AuditedEntity,
    entity_id: &Uuid,
    change: ChangeKind,
    changed_by: Option<&Uuid>,
    changed_at: &DateTime<Utc>,
    state: &T,
) -> Result<i64, DatabaseError> {
    let snapshot = serde_json::to_string(state)?;
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM record_history
         WHERE entity_type = ?1 AND entity_id = ?2",
        params![entity.as_str(), entity_id.to_string()],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO record_history (entity_type, entity_id, version, change_kind, changed_by,
         changed_at, snapshot)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entity.as_str(),
            entity_id.to_string(),
            version,
            change.as_str(),
            changed_by.map(Uuid::to_string),
            fmt_timestamp(changed_at),
            snapshot,
        ],
    )?;
    Ok(version)
}

/// Versions oldest first.
pub fn list_history(
    conn: &Connection,
    entity: AuditedEntity,
    entity_id: &Uuid,
) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, entity_type, entity_id, version, change_kind, changed_by, changed_at, snapshot
         FROM record_history
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY version ASC",
    )?;
    let rows = stmt
        .query_map(params![entity.as_str(), entity_id.to_string()], history_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
