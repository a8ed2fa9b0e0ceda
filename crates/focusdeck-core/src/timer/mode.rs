//! Timer modes and the transition resolver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TimerSettings;
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Work,
    Break,
    LongBreak,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Work => "work",
            Mode::Break => "break",
            Mode::LongBreak => "long_break",
        }
    }

    /// Human-readable label used in titles and notifications.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Work => "Focus",
            Mode::Break => "Short Break",
            Mode::LongBreak => "Long Break",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "work" | "focus" => Ok(Mode::Work),
            "break" | "short_break" => Ok(Mode::Break),
            "long_break" | "longbreak" => Ok(Mode::LongBreak),
            other => Err(ValidationError::UnknownMode(other.to_string())),
        }
    }
}

/// Outcome of [`resolve_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub next_mode: Mode,
    /// Duration of `next_mode` in seconds.
    pub next_duration: u64,
}

/// Decide which mode follows `mode` once it completes.
///
/// `completed_sessions` already counts the work session that just finished,
/// so the fourth of four sessions lands on a long break.
pub fn resolve_next(mode: Mode, completed_sessions: u32, settings: &TimerSettings) -> Transition {
    let next_mode = match mode {
        Mode::Work => {
            let cycle = settings.sessions_until_long_break.max(1);
            if completed_sessions % cycle == 0 {
                Mode::LongBreak
            } else {
                Mode::Break
            }
        }
        Mode::Break | Mode::LongBreak => Mode::Work,
    };
    Transition {
        next_mode,
        next_duration: settings.duration_secs(next_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_cycle() -> TimerSettings {
        TimerSettings {
            sessions_until_long_break: 4,
            ..TimerSettings::default()
        }
    }

    #[test]
    fn fourth_session_earns_long_break() {
        let t = resolve_next(Mode::Work, 4, &four_cycle());
        assert_eq!(t.next_mode, Mode::LongBreak);
        assert_eq!(t.next_duration, 15 * 60);
    }

    #[test]
    fn other_sessions_earn_short_break() {
        for n in [1, 2, 3, 5, 7] {
            let t = resolve_next(Mode::Work, n, &four_cycle());
            assert_eq!(t.next_mode, Mode::Break, "completed = {n}");
            assert_eq!(t.next_duration, 5 * 60);
        }
    }

    #[test]
    fn breaks_return_to_work() {
        let s = four_cycle();
        assert_eq!(resolve_next(Mode::Break, 1, &s).next_mode, Mode::Work);
        assert_eq!(resolve_next(Mode::LongBreak, 4, &s).next_mode, Mode::Work);
        assert_eq!(resolve_next(Mode::LongBreak, 4, &s).next_duration, 25 * 60);
    }

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!("focus".parse::<Mode>().unwrap(), Mode::Work);
        assert_eq!("long-break".parse::<Mode>().unwrap(), Mode::LongBreak);
        assert_eq!("Break".parse::<Mode>().unwrap(), Mode::Break);
        assert!("nap".parse::<Mode>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(serde_json::to_string(&Mode::LongBreak).unwrap(), "\"long_break\"");
    }
}
