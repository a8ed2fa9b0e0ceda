//! The timer's authoritative record and the read-only snapshot handed to UIs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::clock::epoch_ms_to_datetime;
use super::{Mode, TimerSettings};

/// Mutable timer record. Only [`TimerEngine`](super::TimerEngine) writes it.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub mode: Mode,
    pub is_running: bool,
    /// Seconds left in the current mode.
    pub time_remaining: u64,
    /// Work sessions finished within the current long-break cycle.
    pub current_session_index: u32,
    /// Work sessions finished by the completion pipeline.
    #[serde(default)]
    pub completed_sessions: u32,
    /// Value `start()` resumes from. Only set while paused.
    #[serde(default)]
    pub paused_time: Option<u64>,
    #[serde(default)]
    pub session_start_time: Option<u64>,
    #[serde(default)]
    pub last_tick_timestamp: Option<u64>,
    #[serde(default)]
    pub hidden_at: Option<u64>,
    #[serde(default)]
    pub is_transitioning: bool,
}

impl TimerState {
    pub fn new(settings: &TimerSettings) -> Self {
        Self {
            mode: Mode::Work,
            is_running: false,
            time_remaining: settings.duration_secs(Mode::Work),
            current_session_index: 0,
            completed_sessions: 0,
            paused_time: None,
            session_start_time: None,
            last_tick_timestamp: None,
            hidden_at: None,
            is_transitioning: false,
        }
    }

    /// Check the settled-state invariants against `settings`.
    pub fn is_consistent(&self, settings: &TimerSettings) -> bool {
        let bounded = self.time_remaining <= settings.duration_secs(self.mode);
        let pause_bookkeeping = !(self.is_running && self.paused_time.is_some());
        bounded && pause_bookkeeping && !self.is_transitioning
    }
}

/// Read-only view of the timer for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub mode: Mode,
    pub is_running: bool,
    pub is_paused: bool,
    pub time_remaining: u64,
    pub total_time: u64,
    pub current_session_index: u32,
    pub completed_sessions: u32,
    pub sessions_until_long_break: u32,
    pub session_started_at: Option<DateTime<Utc>>,
    pub is_transitioning: bool,
    pub at: DateTime<Utc>,
}

impl TimerSnapshot {
    pub(crate) fn capture(state: &TimerState, settings: &TimerSettings, now_ms: u64) -> Self {
        Self {
            mode: state.mode,
            is_running: state.is_running,
            is_paused: state.paused_time.is_some(),
            time_remaining: state.time_remaining,
            total_time: settings.duration_secs(state.mode),
            current_session_index: state.current_session_index,
            completed_sessions: state.completed_sessions,
            sessions_until_long_break: settings.sessions_until_long_break,
            session_started_at: state.session_start_time.map(epoch_ms_to_datetime),
            is_transitioning: state.is_transitioning,
            at: epoch_ms_to_datetime(now_ms),
        }
    }

    /// 0.0 .. 1.0 elapsed fraction of the current mode.
    pub fn progress(&self) -> f64 {
        if self.total_time == 0 {
            return 0.0;
        }
        1.0 - (self.time_remaining as f64 / self.total_time as f64)
    }

    /// Position within the long-break cycle, for progress dots.
    pub fn cycle_position(&self) -> u32 {
        self.current_session_index % self.sessions_until_long_break.max(1)
    }

    /// `MM:SS` countdown.
    pub fn clock_face(&self) -> String {
        format!("{:02}:{:02}", self.time_remaining / 60, self.time_remaining % 60)
    }

    /// Window/tab title, e.g. `"24:59 - Focus"`.
    pub fn title(&self) -> String {
        let suffix = if self.is_paused { " (paused)" } else { "" };
        format!("{} - {}{}", self.clock_face(), self.mode.label(), suffix)
    }
}
