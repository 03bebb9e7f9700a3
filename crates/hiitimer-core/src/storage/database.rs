//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Finished sessions and the users who took part
//! - Session statistics (all users or one user)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{data_dir, migrations};
use crate::error::{DatabaseError, Result};
use crate::format::format_duration_ms;
use crate::ports::{NewSessionRecord, SessionRecorder};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub total_duration_ms: u64,
    pub total_duration_formatted: String,
}

impl SessionStats {
    fn new(total_sessions: u64, total_duration_ms: u64) -> Self {
        Self {
            total_sessions,
            total_duration_ms,
            total_duration_formatted: format_duration_ms(total_duration_ms),
        }
    }
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/hiitimer/hiitimer.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("hiitimer.db"))
    }

    /// Open (or create) the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::migrate(&self.conn)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    /// Record a finished session with its participants.
    ///
    /// # Errors
    /// Returns an error if the insert fails; nothing is written in that case.
    pub fn record_session(&self, record: &NewSessionRecord) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO sessions (timestamp, duration_ms) VALUES (?1, ?2)",
            params![record.timestamp.to_rfc3339(), record.duration_ms],
        )?;
        let session_id = tx.last_insert_rowid();
        for user_id in &record.user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO session_users (session_id, user_id) VALUES (?1, ?2)",
                params![session_id, user_id],
            )?;
        }
        tx.commit()?;
        debug!(session_id, users = record.user_ids.len(), "session row inserted");
        Ok(session_id)
    }

    pub fn stats_all(&self) -> Result<SessionStats> {
        let (count, total) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_ms), 0) FROM sessions",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(SessionStats::new(count, total))
    }

    pub fn stats_for_user(&self, user_id: i64) -> Result<SessionStats> {
        let (count, total) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(s.duration_ms), 0)
             FROM sessions s
             JOIN session_users su ON su.session_id = s.id
             WHERE su.user_id = ?1",
            params![user_id],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(SessionStats::new(count, total))
    }

    /// Most recent sessions first.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, duration_ms FROM sessions
             ORDER BY timestamp DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut users_stmt = self
            .conn
            .prepare("SELECT user_id FROM session_users WHERE session_id = ?1 ORDER BY user_id")?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, duration_ms) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp {timestamp}: {e}")))?;
            let user_ids = users_stmt
                .query_map(params![id], |r| r.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            records.push(SessionRecord {
                id,
                timestamp,
                duration_ms,
                user_ids,
            });
        }
        Ok(records)
    }
}

impl SessionRecorder for Database {
    fn insert(&self, record: &NewSessionRecord) -> Result<usize> {
        self.record_session(record)?;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(duration_ms: u64, user_ids: Vec<i64>, day: u32) -> NewSessionRecord {
        NewSessionRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            duration_ms,
            user_ids,
        }
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(30_000, vec![1, 2], 1)).unwrap();
        db.record_session(&record(60_000, vec![1], 2)).unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_duration_ms, 90_000);
        assert_eq!(stats.total_duration_formatted, "1min 30s");
    }

    #[test]
    fn stats_per_user() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(30_000, vec![1, 2], 1)).unwrap();
        db.record_session(&record(60_000, vec![1], 2)).unwrap();

        assert_eq!(db.stats_for_user(1).unwrap().total_sessions, 2);
        assert_eq!(db.stats_for_user(2).unwrap().total_duration_ms, 30_000);
        assert_eq!(db.stats_for_user(3).unwrap(), SessionStats::new(0, 0));
    }

    #[test]
    fn recent_sessions_newest_first() {
        let db = Database::open_memory().unwrap();
        db.record_session(&record(30_000, vec![2, 1], 1)).unwrap();
        db.record_session(&record(60_000, vec![], 2)).unwrap();

        let recent = db.recent_sessions(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].duration_ms, 60_000);
        assert!(recent[0].user_ids.is_empty());
        assert_eq!(recent[1].user_ids, vec![1, 2]);

        assert_eq!(db.recent_sessions(1).unwrap().len(), 1);
    }

    #[test]
    fn recorder_reports_one_row() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.insert(&record(30_000, vec![1], 1)).unwrap(), 1);
    }

    #[test]
    fn open_at_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.record_session(&record(30_000, vec![1], 1)).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.stats_all().unwrap().total_sessions, 1);
    }
}
