//! Shared application state.
//!
//! `CoreState` is built once at startup from an explicit [`AppConfig`] and
//! shared by every request through an `Arc`. The single SQLite connection
//! sits behind a `Mutex`; handlers take it for their synchronous store
//! work and release it before any `.await`.

use std::fs;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::attachments::AttachmentStore;
use crate::config::{AppConfig, AUDIT_RETENTION_DAYS};
use crate::db::repository::{insert_audit_entries, prune_audit_log, AuditRow};
use crate::db::{self, columns::fmt_timestamp};

/// Maximum audit buffer size before flush.
const AUDIT_BUFFER_CAPACITY: usize = 100;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    db: Mutex<Connection>,
    pub attachments: AttachmentStore,
    audit: AuditLogger,
}

impl CoreState {
    /// Open (and migrate) the configured database and media directory.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        fs::create_dir_all(&config.data_dir)?;
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&config.media_dir)?;
        let conn = db::open_database(&config.db_path)?;
        tracing::info!(db = %config.db_path.display(), "Database opened");
        Ok(Self::with_connection(config, conn))
    }

    /// State over an already-open connection (in-memory for tests).
    pub fn with_connection(config: AppConfig, conn: Connection) -> Self {
        let attachments = AttachmentStore::new(&config.media_dir, config.max_upload_bytes);
        Self {
            config,
            db: Mutex::new(conn),
            attachments,
            audit: AuditLogger::new(),
        }
    }

    /// Lock the connection. Never hold the guard across an `.await`.
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    // ── Audit logging ───────────────────────────────────────

    /// Record one API request. Auto-flushes to the DB when the buffer is full.
    pub fn log_request(&self, row: AuditRow) {
        if self.audit.log(row) {
            if let Err(e) = self.flush_and_prune_audit() {
                tracing::warn!("Auto-flush audit failed: {e}");
            }
        }
    }

    /// Get the current audit buffer contents.
    pub fn audit_entries(&self) -> Vec<AuditRow> {
        self.audit.entries()
    }

    /// Flush the audit buffer and prune entries past retention.
    pub fn flush_and_prune_audit(&self) -> Result<usize, CoreError> {
        let conn = self.db()?;
        let flushed = self.audit.flush_to_db(&conn)?;
        if let Err(e) = prune_audit_log(&conn, AUDIT_RETENTION_DAYS) {
            tracing::warn!("Failed to prune audit log: {e}");
        }
        Ok(flushed)
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// In-memory audit log buffer. Entries are flushed to SQLite
/// when the buffer reaches capacity or on explicit flush.
pub struct AuditLogger {
    buffer: Mutex<Vec<AuditRow>>,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    /// Buffer an entry. Returns `true` once the flush threshold is reached.
    pub fn log(&self, row: AuditRow) -> bool {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(row);
            buf.len() >= AUDIT_BUFFER_CAPACITY
        } else {
            false
        }
    }

    pub fn entries(&self) -> Vec<AuditRow> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    fn drain(&self) -> Vec<AuditRow> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn flush_to_db(&self, conn: &Connection) -> Result<usize, CoreError> {
        let entries = self.drain();
        if entries.is_empty() {
            return Ok(0);
        }
        insert_audit_entries(conn, &entries)?;
        tracing::debug!(count = entries.len(), "Flushed audit entries to database");
        Ok(entries.len())
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

/// Audit row for a request finishing now.
pub fn audit_row(account_id: Option<String>, method: &str, path: &str, status: u16) -> AuditRow {
    AuditRow {
        timestamp: fmt_timestamp(&chrono::Utc::now()),
        account_id,
        method: method.to_string(),
        path: path.to_string(),
        status,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
