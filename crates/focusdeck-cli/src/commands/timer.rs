use clap::Subcommand;
use focusdeck_core::{Config, Mode, Visibility};

use super::{current_thread_runtime, Session};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Reset the current mode to its full duration
    Reset,
    /// Switch mode (work, break, long_break)
    Mode {
        mode: Mode,
    },
    /// Print current timer state as JSON
    Status,
    /// Record that the terminal went away; the gap is settled by `show`
    Hide,
    /// Settle time spent hidden
    Show,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let runtime = current_thread_runtime()?;
    let mut session = Session::open(&config)?;
    let engine = &mut session.engine;

    let mut events = Vec::new();
    // Each invocation counts as a tick. `show` settles the gap itself.
    if !matches!(action, TimerAction::Show) {
        events.extend(engine.tick());
    }

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Reset => engine.reset(),
        TimerAction::Mode { mode } => engine.change_mode(mode),
        TimerAction::Status => None,
        TimerAction::Hide => engine.set_visibility(Visibility::Hidden),
        TimerAction::Show => engine.set_visibility(Visibility::Visible),
    };
    events.extend(event);
    let snapshot = engine.snapshot();

    let report = runtime.block_on(session.close())?;
    if report.failed > 0 {
        tracing::warn!(failed = report.failed, "some sessions were not saved");
    }

    let output = serde_json::json!({
        "events": events,
        "timer": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
