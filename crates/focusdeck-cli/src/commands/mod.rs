pub mod config;
pub mod run;
pub mod sessions;
pub mod stats;
pub mod timer;

use std::sync::Arc;

use focusdeck_core::persistence::WriterReport;
use focusdeck_core::timer::{Collaborators, LogCuePlayer, Notifier};
use focusdeck_core::{
    Config, Database, PersistenceWriter, SqliteGateway, TimerEngine, TimerSettings, TimerState,
};
use serde::{Deserialize, Serialize};

const TIMER_KEY: &str = "timer_state";

/// Timer record kept in the kv table between invocations.
#[derive(Debug, Serialize, Deserialize)]
struct SavedTimer {
    state: TimerState,
    settings: TimerSettings,
}

/// Prints notifications to stderr, keeping stdout for JSON.
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    pub enabled: bool,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, description: &str) {
        if self.enabled {
            eprintln!("{title} {description}");
        } else {
            tracing::debug!(title, description, "notification suppressed");
        }
    }
}

/// An engine restored from the kv table, wired to persist completed sessions.
pub struct Session {
    pub engine: TimerEngine,
    pub gateway: Arc<SqliteGateway>,
    pub writer: PersistenceWriter,
}

impl Session {
    /// Restore the saved timer and bring it in line with `config.timer`.
    pub fn open(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let gateway = Arc::new(SqliteGateway::new(Database::open()?));
        let saved = gateway.with_db(load_saved)?;
        let notifier = Arc::new(TerminalNotifier {
            enabled: config.notifications.enabled,
        });
        let (dispatcher, writer) = PersistenceWriter::channel(
            Some(config.persistence.user_id.clone()),
            gateway.clone(),
            notifier.clone(),
        );

        let (state, settings) = match saved {
            Some(saved) => (saved.state, saved.settings),
            None => (TimerState::new(&config.timer), config.timer),
        };
        let mut engine = TimerEngine::restore(state, settings).with_collaborators(Collaborators {
            dispatcher: Arc::new(dispatcher),
            cue: Arc::new(LogCuePlayer {
                audible: config.notifications.sound,
            }),
            notifier,
        });
        engine.sync_settings(config.timer)?;

        Ok(Self {
            engine,
            gateway,
            writer,
        })
    }

    /// Persist the engine state, then wait for queued sessions to be written.
    pub async fn close(self) -> Result<WriterReport, Box<dyn std::error::Error>> {
        let Self {
            engine,
            gateway,
            writer,
        } = self;
        save_engine(&gateway, &engine)?;
        // Dropping the engine closes the dispatch channel so the writer drains and exits.
        drop(engine);
        Ok(writer.run().await)
    }
}

fn load_saved(db: &Database) -> Result<Option<SavedTimer>, Box<dyn std::error::Error>> {
    let Some(json) = db.kv_get(TIMER_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_str(&json) {
        Ok(saved) => Ok(Some(saved)),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable timer state");
            Ok(None)
        }
    }
}

pub fn save_engine(
    gateway: &SqliteGateway,
    engine: &TimerEngine,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(&SavedTimer {
        state: engine.state().clone(),
        settings: *engine.settings(),
    })?;
    gateway.with_db(|db| db.kv_set(TIMER_KEY, &json))?;
    Ok(())
}

pub fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
