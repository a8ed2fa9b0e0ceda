use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Mode, TimerSnapshot};

/// Every state change in the timer produces an Event.
/// The CLI prints them; subscribers use them to refresh titles and views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        remaining_secs: u64,
        resumed: bool,
        at: DateTime<Utc>,
    },
    TimerPaused {
        mode: Mode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: Mode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    ModeChanged {
        from: Mode,
        to: Mode,
        duration_secs: u64,
        /// False when the completion pipeline advanced the mode.
        manual: bool,
        at: DateTime<Utc>,
    },
    Tick {
        mode: Mode,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Remaining time was corrected after the host was hidden.
    Reconciled {
        elapsed_secs: u64,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SettingsSynced {
        /// False when the timer was running and the settings were deferred.
        applied: bool,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted {
        mode: Mode,
        duration_secs: u64,
        completed_sessions: u32,
        next_mode: Mode,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    /// The finished session could not be handed to persistence; the timer
    /// holds at zero in `mode`.
    CompletionAborted {
        mode: Mode,
        reason: String,
        at: DateTime<Utc>,
    },
    StateSnapshot(TimerSnapshot),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerReset { .. } => "timer_reset",
            Event::ModeChanged { .. } => "mode_changed",
            Event::Tick { .. } => "tick",
            Event::Reconciled { .. } => "reconciled",
            Event::SettingsSynced { .. } => "settings_synced",
            Event::SessionCompleted { .. } => "session_completed",
            Event::CompletionAborted { .. } => "completion_aborted",
            Event::StateSnapshot(_) => "state_snapshot",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let ev = Event::TimerPaused {
            mode: Mode::Work,
            remaining_secs: 42,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "timer_paused");
        assert_eq!(json["remaining_secs"], 42);
        assert_eq!(ev.name(), "timer_paused");
    }
}
