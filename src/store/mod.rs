//! SQLite-backed session store and audit log
//!
//! Holds each caller's last-known working directory between calls plus an
//! append-only log of executed commands, in `~/.shellgate/sessions.db` by
//! default.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::session::{AuditSink, PreferenceStore};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    caller      TEXT PRIMARY KEY,
    working_dir TEXT NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    caller      TEXT NOT NULL,
    command     TEXT NOT NULL,
    executed_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_caller ON audit_log(caller, executed_at);
"#;

/// One audit log row.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub command: String,
    /// Milliseconds since the Unix epoch.
    pub executed_at: i64,
}

/// Database wrapper shared across server threads.
#[derive(Clone)]
pub struct SessionDb {
    conn: Arc<Mutex<Connection>>,
}

impl SessionDb {
    /// Open or create the database at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create session dir: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("Session DB lock poisoned")
    }

    /// Most recent audited commands for a caller, newest first.
    pub fn recent_commands(&self, caller: &str, limit: usize) -> Result<Vec<AuditEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT command, executed_at FROM audit_log
             WHERE caller = ?1 ORDER BY executed_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![caller, limit as i64], |row| {
            Ok(AuditEntry {
                command: row.get(0)?,
                executed_at: row.get(1)?,
            })
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

impl PreferenceStore for SessionDb {
    fn get_dir(&self, caller: &str) -> Result<Option<String>> {
        let dir = self
            .conn()
            .query_row(
                "SELECT working_dir FROM sessions WHERE caller = ?1",
                [caller],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dir)
    }

    fn set_dir(&self, caller: &str, dir: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO sessions (caller, working_dir, updated_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![caller, dir, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn clear_dir(&self, caller: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM sessions WHERE caller = ?1", [caller])?;
        Ok(())
    }
}

impl AuditSink for SessionDb {
    fn record(&self, caller: &str, command: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO audit_log (caller, command, executed_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![caller, command, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }
}
