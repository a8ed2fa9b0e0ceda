//! Collaborators called by the completion pipeline.
//!
//! The engine owns none of these side effects. It hands a finished session
//! to a [`CompletionDispatcher`], asks a [`CuePlayer`] for a sound and tells
//! a [`Notifier`] what happened. Each trait has a logging implementation so
//! the engine runs headless.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Mode;
use crate::error::{CueError, DispatchError};

/// A session that ran to zero and is ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub id: Uuid,
    pub mode: Mode,
    pub duration_secs: u64,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedSession {
    pub fn duration_min(&self) -> u64 {
        self.duration_secs / 60
    }
}

/// Hands finished sessions to persistence.
///
/// `dispatch` must return quickly; the write itself happens elsewhere.
/// An `Err` means the hand-off failed and the pipeline must not advance.
pub trait CompletionDispatcher: Send + Sync {
    fn dispatch(&self, session: CompletedSession) -> Result<(), DispatchError>;
}

/// Plays the completion sound for a mode. Best-effort.
pub trait CuePlayer: Send + Sync {
    fn play_completion_sound(&self, mode: Mode) -> Result<(), CueError>;
}

/// User-facing notification sink. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, description: &str);
}

/// The engine's external collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub dispatcher: Arc<dyn CompletionDispatcher>,
    pub cue: Arc<dyn CuePlayer>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            dispatcher: Arc::new(DiscardDispatcher),
            cue: Arc::new(LogCuePlayer::default()),
            notifier: Arc::new(LogNotifier),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Accepts every session and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardDispatcher;

impl CompletionDispatcher for DiscardDispatcher {
    fn dispatch(&self, session: CompletedSession) -> Result<(), DispatchError> {
        tracing::debug!(id = %session.id, mode = %session.mode, "discarding completed session");
        Ok(())
    }
}

/// Rings the terminal bell on stderr when `audible` is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCuePlayer {
    pub audible: bool,
}

impl CuePlayer for LogCuePlayer {
    fn play_completion_sound(&self, mode: Mode) -> Result<(), CueError> {
        tracing::debug!(%mode, audible = self.audible, "completion cue");
        if self.audible {
            let mut err = std::io::stderr();
            err.write_all(b"\x07")?;
            err.flush()?;
        }
        Ok(())
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, description: &str) {
        tracing::info!(title, description, "notification");
    }
}

/// Title and description announcing that `finished` is over.
pub fn completion_message(finished: Mode, next: Mode) -> (String, String) {
    let title = match finished {
        Mode::Work => "Focus session complete!",
        Mode::Break => "Break is over!",
        Mode::LongBreak => "Long break is over!",
    };
    let description = match next {
        Mode::Work => "Ready to focus again?".to_string(),
        Mode::Break | Mode::LongBreak => format!("Time for a {}.", next.label().to_lowercase()),
    };
    (title.to_string(), description)
}
