//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (usually [`TimerService`](super::TimerService))
//! is responsible for calling `tick()` about once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> Paused -> Running -> (expiry) -> Transitioning -> Idle | Running
//! ```
//!
//! Expiry runs the completion pipeline: cue, dispatch to persistence, mode
//! advance, optional auto-start, notification. `is_transitioning` guards it
//! so a given expiry is handled once.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default());
//! engine.start();
//! // In a loop:
//! engine.tick(); // Returns Some(Event::SessionCompleted) when the mode finishes
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::clock::{epoch_ms_to_datetime, Clock, SystemClock};
use super::completion::{completion_message, Collaborators, CompletedSession};
use super::mode::resolve_next;
use super::state::{TimerSnapshot, TimerState};
use super::{Mode, TimerSettings};
use crate::error::ValidationError;
use crate::events::Event;

/// Host visibility, as reported by the UI shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    Visible,
}

pub type ListenerId = u64;

type Listener = Box<dyn Fn(&Event) + Send + Sync>;

/// Core timer engine.
///
/// Owns the [`TimerState`] and is its only writer. Listeners registered with
/// [`subscribe`](Self::subscribe) see every event the engine produces; they
/// must not call back into the engine.
pub struct TimerEngine {
    state: TimerState,
    settings: TimerSettings,
    /// Settings received while running, adopted at the next recompute.
    pending_settings: Option<TimerSettings>,
    clock: Arc<dyn Clock>,
    collaborators: Collaborators,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: ListenerId,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("pending_settings", &self.pending_settings)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TimerEngine {
    /// Create an idle engine in work mode at the full work duration.
    pub fn new(settings: TimerSettings) -> Self {
        Self::restore(TimerState::new(&settings), settings)
    }

    /// Rebuild an engine from a previously saved state.
    ///
    /// The state is normalised: remaining time is clamped to the mode's
    /// duration and a stale transition flag is cleared.
    pub fn restore(mut state: TimerState, settings: TimerSettings) -> Self {
        state.time_remaining = state.time_remaining.min(settings.duration_secs(state.mode));
        if let Some(paused) = state.paused_time.as_mut() {
            *paused = (*paused).min(settings.duration_secs(state.mode));
        }
        if state.is_running {
            state.paused_time = None;
        }
        state.is_transitioning = false;
        Self {
            state,
            settings,
            pending_settings: None,
            clock: Arc::new(SystemClock),
            collaborators: Collaborators::default(),
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn pending_settings(&self) -> Option<&TimerSettings> {
        self.pending_settings.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn time_remaining(&self) -> u64 {
        self.state.time_remaining
    }

    /// Full duration of the current mode in seconds.
    pub fn total_secs(&self) -> u64 {
        self.settings.duration_secs(self.state.mode)
    }

    /// 0.0 .. 1.0 progress within the current mode.
    pub fn step_progress(&self) -> f64 {
        self.snapshot().progress()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::capture(&self.state, &self.settings, self.clock.now_ms())
    }

    /// Build a full state snapshot event.
    pub fn snapshot_event(&self) -> Event {
        Event::StateSnapshot(self.snapshot())
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.state.is_running {
            return None;
        }
        let now = self.clock.now_ms();
        let resumed_from = self.state.paused_time.take();
        if let Some(paused) = resumed_from {
            self.state.time_remaining = paused;
        }
        self.state.is_running = true;
        if self.state.session_start_time.is_none() {
            self.state.session_start_time = Some(now);
        }
        self.state.last_tick_timestamp = Some(now);
        info!(
            mode = %self.state.mode,
            remaining = self.state.time_remaining,
            resumed = resumed_from.is_some(),
            "timer started"
        );
        self.emit(Event::TimerStarted {
            mode: self.state.mode,
            remaining_secs: self.state.time_remaining,
            resumed: resumed_from.is_some(),
            at: epoch_ms_to_datetime(now),
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.state.is_running {
            return None;
        }
        self.state.paused_time = Some(self.state.time_remaining);
        self.state.is_running = false;
        self.state.last_tick_timestamp = None;
        info!(mode = %self.state.mode, remaining = self.state.time_remaining, "timer paused");
        self.emit(Event::TimerPaused {
            mode: self.state.mode,
            remaining_secs: self.state.time_remaining,
            at: self.clock.now(),
        })
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.adopt_pending_settings();
        self.state.is_running = false;
        self.state.time_remaining = self.settings.duration_secs(self.state.mode);
        self.state.paused_time = None;
        self.state.session_start_time = None;
        self.state.last_tick_timestamp = None;
        info!(mode = %self.state.mode, remaining = self.state.time_remaining, "timer reset");
        self.emit(Event::TimerReset {
            mode: self.state.mode,
            remaining_secs: self.state.time_remaining,
            at: self.clock.now(),
        })
    }

    /// Manual mode switch. Switching to work restarts the long-break cycle.
    pub fn change_mode(&mut self, mode: Mode) -> Option<Event> {
        self.apply_mode(mode, true)
    }

    /// Take new settings from the settings provider.
    ///
    /// A running countdown is left alone and the settings are held until the
    /// next duration recompute. An idle timer adopts them immediately, which
    /// discards any paused progress.
    pub fn sync_settings(
        &mut self,
        settings: TimerSettings,
    ) -> Result<Option<Event>, ValidationError> {
        settings.validate()?;
        if settings == self.settings && self.pending_settings.is_none() {
            return Ok(None);
        }
        if self.state.is_running {
            debug!("settings changed while running, deferring");
            self.pending_settings = Some(settings);
            return Ok(self.emit(Event::SettingsSynced {
                applied: false,
                remaining_secs: self.state.time_remaining,
                at: self.clock.now(),
            }));
        }
        self.settings = settings;
        self.pending_settings = None;
        if self.state.paused_time.take().is_some() {
            debug!("discarding paused progress after settings change");
        }
        self.state.time_remaining = self.settings.duration_secs(self.state.mode);
        info!(mode = %self.state.mode, remaining = self.state.time_remaining, "settings applied");
        Ok(self.emit(Event::SettingsSynced {
            applied: true,
            remaining_secs: self.state.time_remaining,
            at: self.clock.now(),
        }))
    }

    /// Call about once per second while running.
    ///
    /// Decrements by the wall-clock seconds elapsed since the previous tick,
    /// rounded to the nearest second. `last_tick_timestamp` advances by the
    /// whole seconds consumed, so the sub-second remainder carries into the
    /// next tick and any tick cadence tracks wall time to within half a
    /// second. Returns `Some(Event::SessionCompleted)` when the countdown
    /// reaches zero.
    pub fn tick(&mut self) -> Option<Event> {
        if !self.state.is_running {
            return None;
        }
        let now = self.clock.now_ms();
        let last = self.state.last_tick_timestamp.unwrap_or(now);
        let elapsed_ms = now.saturating_sub(last);
        let elapsed_secs = (elapsed_ms + 500) / 1000;
        self.state.time_remaining = self.state.time_remaining.saturating_sub(elapsed_secs);
        // May land up to 500 ms past `now`; the next tick then waits it out.
        self.state.last_tick_timestamp = Some(last.saturating_add(elapsed_secs * 1000));

        if self.state.time_remaining == 0 {
            return self.complete();
        }
        if elapsed_secs == 0 {
            return None;
        }
        self.emit(Event::Tick {
            mode: self.state.mode,
            remaining_secs: self.state.time_remaining,
            at: epoch_ms_to_datetime(now),
        })
    }

    /// Report a visibility change from the host.
    ///
    /// On `Visible`, time spent hidden is subtracted in one step and the
    /// completion pipeline runs if that reaches zero. Only the part of the gap
    /// after the last tick is counted, so ticks that still fired while
    /// hidden are not charged twice.
    pub fn set_visibility(&mut self, visibility: Visibility) -> Option<Event> {
        let now = self.clock.now_ms();
        match visibility {
            Visibility::Hidden => {
                self.state.hidden_at = Some(now);
                debug!(running = self.state.is_running, "host hidden");
                None
            }
            Visibility::Visible => {
                let hidden_at = self.state.hidden_at.take()?;
                if !self.state.is_running {
                    return None;
                }
                let since = self
                    .state
                    .last_tick_timestamp
                    .map_or(hidden_at, |last| last.max(hidden_at));
                let elapsed_secs = now.saturating_sub(since) / 1000;
                if elapsed_secs == 0 {
                    return None;
                }
                self.state.time_remaining = self.state.time_remaining.saturating_sub(elapsed_secs);
                self.state.last_tick_timestamp = Some(since + elapsed_secs * 1000);
                debug!(
                    elapsed = elapsed_secs,
                    remaining = self.state.time_remaining,
                    "reconciled hidden gap"
                );
                if self.state.time_remaining == 0 {
                    return self.complete();
                }
                self.emit(Event::Reconciled {
                    elapsed_secs,
                    remaining_secs: self.state.time_remaining,
                    at: epoch_ms_to_datetime(now),
                })
            }
        }
    }

    // ── Completion pipeline ──────────────────────────────────────────

    fn complete(&mut self) -> Option<Event> {
        if self.state.is_transitioning {
            debug!("completion already in progress, ignoring trigger");
            return None;
        }
        self.state.is_transitioning = true;
        self.state.is_running = false;
        self.state.last_tick_timestamp = None;

        let mode = self.state.mode;
        if let Err(e) = self.collaborators.cue.play_completion_sound(mode) {
            warn!(%mode, error = %e, "completion cue failed");
        }

        let total_secs = self.settings.duration_secs(mode);
        let session = CompletedSession {
            id: Uuid::new_v4(),
            mode,
            duration_secs: total_secs,
            completed: true,
            started_at: self.state.session_start_time.map(epoch_ms_to_datetime),
            completed_at: self.clock.now(),
        };
        let session_id = session.id;
        if let Err(e) = self.collaborators.dispatcher.dispatch(session) {
            error!(%mode, error = %e, "session dispatch failed, holding timer at zero");
            self.state.time_remaining = 0;
            self.state.paused_time = None;
            self.state.is_transitioning = false;
            return self.emit(Event::CompletionAborted {
                mode,
                reason: e.to_string(),
                at: self.clock.now(),
            });
        }
        debug!(id = %session_id, %mode, total_secs, "session dispatched");

        if mode == Mode::Work {
            self.state.completed_sessions += 1;
            self.state.current_session_index += 1;
        }

        // Settings that arrived mid-session count from the next mode on.
        self.adopt_pending_settings();
        let transition = resolve_next(mode, self.state.completed_sessions, &self.settings);
        self.apply_mode(transition.next_mode, false);

        let auto_started = self.settings.auto_starts_after(mode);
        if auto_started {
            self.start();
        }

        let (title, description) = completion_message(mode, transition.next_mode);
        self.collaborators.notifier.notify(&title, &description);

        self.state.is_transitioning = false;
        info!(
            finished = %mode,
            next = %transition.next_mode,
            completed_sessions = self.state.completed_sessions,
            auto_started,
            "session completed"
        );
        self.emit(Event::SessionCompleted {
            mode,
            duration_secs: total_secs,
            completed_sessions: self.state.completed_sessions,
            next_mode: transition.next_mode,
            auto_started,
            at: self.clock.now(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn apply_mode(&mut self, mode: Mode, manual: bool) -> Option<Event> {
        self.adopt_pending_settings();
        let from = self.state.mode;
        self.state.is_running = false;
        self.state.mode = mode;
        if manual && mode == Mode::Work {
            self.state.current_session_index = 0;
        }
        self.state.time_remaining = self.settings.duration_secs(mode);
        self.state.paused_time = None;
        self.state.session_start_time = None;
        self.state.last_tick_timestamp = None;
        info!(%from, to = %mode, manual, "mode changed");
        self.emit(Event::ModeChanged {
            from,
            to: mode,
            duration_secs: self.state.time_remaining,
            manual,
            at: self.clock.now(),
        })
    }

    fn adopt_pending_settings(&mut self) {
        if let Some(settings) = self.pending_settings.take() {
            debug!("adopting deferred settings");
            self.settings = settings;
        }
    }

    fn emit(&self, event: Event) -> Option<Event> {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
        Some(event)
    }
}
