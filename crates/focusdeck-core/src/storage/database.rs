//! SQLite-based session storage and statistics.
//!
//! Provides persistent storage for:
//! - Completed sessions, per user
//! - Daily work-minute aggregates
//! - Key-value store for application state (e.g. the saved timer)

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;
use crate::timer::Mode;

use super::data_dir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: String,
    pub mode: Mode,
    pub duration_secs: u64,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub work_sessions: u64,
    pub total_work_min: u64,
    pub total_break_min: u64,
    pub today_work_sessions: u64,
    pub today_work_min: u64,
}

/// One row of the daily aggregate table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyStat {
    pub day: NaiveDate,
    pub work_minutes: u64,
    pub work_sessions: u64,
}

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Open the database at `~/.config/focusdeck/focusdeck.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> crate::error::Result<Self> {
        let path = data_dir()?.join("focusdeck.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests and dry runs).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       TEXT NOT NULL,
                mode          TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                completed     INTEGER NOT NULL DEFAULT 1,
                started_at    TEXT,
                completed_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS daily_stats (
                user_id       TEXT NOT NULL,
                day           TEXT NOT NULL,
                work_minutes  INTEGER NOT NULL DEFAULT 0,
                work_sessions INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, day)
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            -- Create indexes for common query patterns
            CREATE INDEX IF NOT EXISTS idx_sessions_user_completed_at ON sessions(user_id, completed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_mode ON sessions(mode);",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Record a finished session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        user_id: &str,
        mode: Mode,
        duration_secs: u64,
        completed: bool,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO sessions (user_id, mode, duration_secs, completed, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                mode.as_str(),
                duration_secs,
                completed,
                started_at.map(|t| t.to_rfc3339()),
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Add one work session of `work_minutes` to the aggregate for `day`.
    pub fn add_daily_work(
        &self,
        user_id: &str,
        day: NaiveDate,
        work_minutes: u64,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO daily_stats (user_id, day, work_minutes, work_sessions)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT(user_id, day) DO UPDATE SET
                work_minutes = work_minutes + excluded.work_minutes,
                work_sessions = work_sessions + 1",
            params![user_id, day.to_string(), work_minutes],
        )?;
        Ok(())
    }

    /// Daily aggregates for the last `days` days, newest first.
    pub fn daily_stats(&self, user_id: &str, days: u32) -> Result<Vec<DailyStat>, DatabaseError> {
        let since = Utc::now().date_naive() - chrono::Duration::days(i64::from(days.max(1)) - 1);
        let mut stmt = self.conn.prepare(
            "SELECT day, work_minutes, work_sessions FROM daily_stats
             WHERE user_id = ?1 AND day >= ?2
             ORDER BY day DESC",
        )?;
        let rows = stmt.query_map(params![user_id, since.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (day, work_minutes, work_sessions) = row?;
            let day = day.parse::<NaiveDate>().map_err(|e| DatabaseError::CorruptRow {
                table: "daily_stats".into(),
                message: e.to_string(),
            })?;
            out.push(DailyStat {
                day,
                work_minutes,
                work_sessions,
            });
        }
        Ok(out)
    }

    pub fn stats_today(&self, user_id: &str) -> Result<Stats, DatabaseError> {
        self.stats_since(user_id, Some(today_start()))
    }

    pub fn stats_all(&self, user_id: &str) -> Result<Stats, DatabaseError> {
        let mut stats = self.stats_since(user_id, None)?;
        let today = self.stats_since(user_id, Some(today_start()))?;
        stats.today_work_sessions = today.today_work_sessions;
        stats.today_work_min = today.today_work_min;
        Ok(stats)
    }

    fn stats_since(&self, user_id: &str, since: Option<String>) -> Result<Stats, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT mode, COUNT(*), COALESCE(SUM(duration_secs), 0)
             FROM sessions
             WHERE user_id = ?1 AND completed = 1 AND (?2 IS NULL OR completed_at >= ?2)
             GROUP BY mode",
        )?;

        let is_today = since.is_some();
        let mut stats = Stats::default();
        let rows = stmt.query_map(params![user_id, since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        for row in rows {
            let (mode, count, secs) = row?;
            let minutes = secs / 60;
            stats.total_sessions += count;
            match mode.parse::<Mode>() {
                Ok(Mode::Work) => {
                    stats.work_sessions += count;
                    stats.total_work_min += minutes;
                    if is_today {
                        stats.today_work_sessions += count;
                        stats.today_work_min += minutes;
                    }
                }
                Ok(Mode::Break | Mode::LongBreak) => {
                    stats.total_break_min += minutes;
                }
                Err(_) => {}
            }
        }
        Ok(stats)
    }

    /// Most recent sessions for `user_id`, newest first.
    pub fn recent_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, mode, duration_secs, completed, started_at, completed_at
             FROM sessions
             WHERE user_id = ?1
             ORDER BY completed_at DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, u64>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, user_id, mode, duration_secs, completed, started_at, completed_at) = row?;
            let corrupt = |message: String| DatabaseError::CorruptRow {
                table: "sessions".into(),
                message,
            };
            out.push(SessionRecord {
                id,
                user_id,
                mode: mode.parse().map_err(|e: crate::error::ValidationError| corrupt(e.to_string()))?,
                duration_secs,
                completed,
                started_at: started_at
                    .map(|s| parse_timestamp(&s))
                    .transpose()
                    .map_err(corrupt)?,
                completed_at: parse_timestamp(&completed_at).map_err(corrupt)?,
            });
        }
        Ok(out)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn today_start() -> String {
    format!("{}T00:00:00+00:00", Utc::now().format("%Y-%m-%d"))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session("alice", Mode::Work, 25 * 60, true, Some(now), now)
            .unwrap();
        db.record_session("alice", Mode::Break, 5 * 60, true, None, now)
            .unwrap();
        db.record_session("bob", Mode::Work, 50 * 60, true, None, now)
            .unwrap();

        let stats = db.stats_all("alice").unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.work_sessions, 1);
        assert_eq!(stats.total_work_min, 25);
        assert_eq!(stats.total_break_min, 5);
        assert_eq!(stats.today_work_sessions, 1);
        assert_eq!(stats.today_work_min, 25);
    }

    #[test]
    fn stats_today_ignores_old_sessions() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        let last_week = now - chrono::Duration::days(7);
        db.record_session("alice", Mode::Work, 25 * 60, true, None, last_week)
            .unwrap();
        db.record_session("alice", Mode::Work, 25 * 60, true, None, now)
            .unwrap();

        assert_eq!(db.stats_today("alice").unwrap().work_sessions, 1);
        assert_eq!(db.stats_all("alice").unwrap().work_sessions, 2);
    }

    #[test]
    fn daily_work_accumulates() {
        let db = Database::open_memory().unwrap();
        let today = Utc::now().date_naive();
        db.add_daily_work("alice", today, 25).unwrap();
        db.add_daily_work("alice", today, 25).unwrap();
        db.add_daily_work("alice", today - chrono::Duration::days(30), 25)
            .unwrap();

        let days = db.daily_stats("alice", 7).unwrap();
        assert_eq!(
            days,
            vec![DailyStat {
                day: today,
                work_minutes: 50,
                work_sessions: 2,
            }]
        );
    }

    #[test]
    fn recent_sessions_newest_first() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session("alice", Mode::Work, 1500, true, None, now - chrono::Duration::minutes(30))
            .unwrap();
        db.record_session("alice", Mode::Break, 300, true, Some(now), now)
            .unwrap();

        let recent = db.recent_sessions("alice", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].mode, Mode::Break);
        assert_eq!(recent[0].started_at.map(|t| t.timestamp()), Some(now.timestamp()));
        assert_eq!(recent[1].mode, Mode::Work);
        assert!(db.recent_sessions("bob", 10).unwrap().is_empty());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
