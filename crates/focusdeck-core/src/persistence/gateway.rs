use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::GatewayError;
use crate::timer::Mode;

/// Backend that stores completed sessions and daily aggregates.
///
/// Timestamps come from the session itself, so a write that lands after
/// midnight still counts toward the day the session finished.
///
/// Both calls may fail independently. `Ok(false)` means the backend
/// declined the write without an error; callers treat it as a failure.
/// Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    async fn save_completed_session(
        &self,
        user_id: &str,
        mode: Mode,
        duration_secs: u64,
        completed: bool,
        started_at: Option<DateTime<Utc>>,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError>;

    async fn update_daily_stats(
        &self,
        user_id: &str,
        day: NaiveDate,
        work_minutes: u64,
    ) -> Result<bool, GatewayError>;
}
