use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::SessionGateway;
use crate::error::{DispatchError, GatewayError};
use crate::timer::{CompletedSession, CompletionDispatcher, Mode, Notifier};

#[derive(Debug)]
struct PersistJob {
    user_id: String,
    session: CompletedSession,
}

/// Queues finished sessions for the background writer.
///
/// Dispatch fails synchronously only when no user is configured or the
/// writer has shut down.
#[derive(Debug, Clone)]
pub struct PersistenceDispatcher {
    user_id: Option<String>,
    tx: mpsc::UnboundedSender<PersistJob>,
}

impl CompletionDispatcher for PersistenceDispatcher {
    fn dispatch(&self, session: CompletedSession) -> Result<(), DispatchError> {
        let user_id = self
            .user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(DispatchError::MissingUser)?;
        debug!(id = %session.id, mode = %session.mode, "queueing session for persistence");
        self.tx
            .send(PersistJob {
                user_id: user_id.to_string(),
                session,
            })
            .map_err(|_| DispatchError::WriterClosed)
    }
}

/// Totals reported when the writer drains and exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterReport {
    pub saved: u32,
    pub failed: u32,
}

/// Drains queued sessions into a [`SessionGateway`].
///
/// Runs until every [`PersistenceDispatcher`] clone is dropped.
pub struct PersistenceWriter {
    rx: mpsc::UnboundedReceiver<PersistJob>,
    gateway: Arc<dyn SessionGateway>,
    notifier: Arc<dyn Notifier>,
}

impl PersistenceWriter {
    /// Create a connected dispatcher/writer pair.
    pub fn channel(
        user_id: Option<String>,
        gateway: Arc<dyn SessionGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> (PersistenceDispatcher, PersistenceWriter) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            PersistenceDispatcher { user_id, tx },
            PersistenceWriter {
                rx,
                gateway,
                notifier,
            },
        )
    }

    pub fn spawn(self) -> JoinHandle<WriterReport> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> WriterReport {
        let Self {
            mut rx,
            gateway,
            notifier,
        } = self;
        let mut report = WriterReport::default();
        while let Some(job) = rx.recv().await {
            if persist(gateway.as_ref(), notifier.as_ref(), &job).await {
                report.saved += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(saved = report.saved, failed = report.failed, "persistence writer stopped");
        report
    }
}

async fn persist(gateway: &dyn SessionGateway, notifier: &dyn Notifier, job: &PersistJob) -> bool {
    let session = &job.session;
    let saved = gateway
        .save_completed_session(
            &job.user_id,
            session.mode,
            session.duration_secs,
            session.completed,
            session.started_at,
            session.completed_at,
        )
        .await;
    let mut ok = check(notifier, saved, session, "session");

    if session.mode == Mode::Work {
        let updated = gateway
            .update_daily_stats(
                &job.user_id,
                session.completed_at.date_naive(),
                session.duration_min(),
            )
            .await;
        ok &= check(notifier, updated, session, "daily stats");
    }
    ok
}

fn check(
    notifier: &dyn Notifier,
    result: Result<bool, GatewayError>,
    session: &CompletedSession,
    what: &str,
) -> bool {
    let reason = match result {
        Ok(true) => {
            debug!(id = %session.id, what, "persisted");
            return true;
        }
        Ok(false) => "the backend declined the write".to_string(),
        Err(e) => e.to_string(),
    };
    error!(id = %session.id, mode = %session.mode, what, %reason, "failed to persist");
    notifier.notify(
        &format!("Could not save {what}"),
        &format!(
            "Your {} session was not recorded: {reason}",
            session.mode.label().to_lowercase()
        ),
    );
    false
}
