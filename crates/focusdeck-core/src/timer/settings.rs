use serde::{Deserialize, Serialize};

use super::Mode;
use crate::error::ValidationError;

/// Durations and behavior flags consumed by the timer engine.
///
/// Durations are expressed in minutes, the way users edit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    #[serde(default = "default_work_duration")]
    pub work_duration: u32,
    #[serde(default = "default_break_duration")]
    pub break_duration: u32,
    #[serde(default = "default_long_break_duration")]
    pub long_break_duration: u32,
    #[serde(default = "default_sessions_until_long_break")]
    pub sessions_until_long_break: u32,
    /// Start the break automatically once a work session completes.
    #[serde(default)]
    pub auto_start_breaks: bool,
    /// Start the next work session automatically once a break completes.
    #[serde(default)]
    pub auto_start_focus: bool,
}

fn default_work_duration() -> u32 {
    25
}
fn default_break_duration() -> u32 {
    5
}
fn default_long_break_duration() -> u32 {
    15
}
fn default_sessions_until_long_break() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            work_duration: default_work_duration(),
            break_duration: default_break_duration(),
            long_break_duration: default_long_break_duration(),
            sessions_until_long_break: default_sessions_until_long_break(),
            auto_start_breaks: false,
            auto_start_focus: false,
        }
    }
}

impl TimerSettings {
    /// Duration of `mode` in minutes.
    pub fn duration_min(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Work => self.work_duration,
            Mode::Break => self.break_duration,
            Mode::LongBreak => self.long_break_duration,
        }
    }

    /// Duration of `mode` in seconds.
    ///
    /// Uses saturating arithmetic to prevent overflow with large values.
    pub fn duration_secs(&self, mode: Mode) -> u64 {
        u64::from(self.duration_min(mode)).saturating_mul(60)
    }

    /// Whether completing `finished` should start the following mode on its own.
    pub fn auto_starts_after(&self, finished: Mode) -> bool {
        match finished {
            Mode::Work => self.auto_start_breaks,
            Mode::Break | Mode::LongBreak => self.auto_start_focus,
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("work_duration", self.work_duration),
            ("break_duration", self.break_duration),
            ("long_break_duration", self.long_break_duration),
            ("sessions_until_long_break", self.sessions_until_long_break),
        ] {
            if value == 0 {
                return Err(ValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be at least 1".into(),
                });
            }
        }
        Ok(())
    }
}
