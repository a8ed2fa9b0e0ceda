use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::SessionGateway;
use crate::error::GatewayError;
use crate::storage::Database;
use crate::timer::Mode;

/// [`SessionGateway`] over the local SQLite [`Database`].
#[derive(Debug)]
pub struct SqliteGateway {
    db: Mutex<Database>,
}

impl SqliteGateway {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Run a read against the underlying database.
    pub fn with_db<R>(&self, f: impl FnOnce(&Database) -> R) -> R {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionGateway for SqliteGateway {
    async fn save_completed_session(
        &self,
        user_id: &str,
        mode: Mode,
        duration_secs: u64,
        completed: bool,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let id = self.lock().record_session(
            user_id,
            mode,
            duration_secs,
            completed,
            started_at,
            completed_at,
        )?;
        tracing::debug!(id, user_id, %mode, "session row written");
        Ok(true)
    }

    async fn update_daily_stats(
        &self,
        user_id: &str,
        day: NaiveDate,
        work_minutes: u64,
    ) -> Result<bool, GatewayError> {
        self.lock().add_daily_work(user_id, day, work_minutes)?;
        Ok(true)
    }
}
