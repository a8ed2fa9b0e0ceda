//! Integration tests for the completion pipeline.
//!
//! Drives the engine with a manual clock through expiry, hidden-host
//! reconciliation and competing triggers, and checks what reaches the
//! persistence writer and the SQLite gateway.

use std::sync::{Arc, Mutex};

use focusdeck_core::error::DispatchError;
use focusdeck_core::timer::{
    Collaborators, CompletedSession, CompletionDispatcher, LogCuePlayer, ManualClock, Notifier,
};
use focusdeck_core::{
    Database, Event, Mode, PersistenceWriter, SqliteGateway, TimerEngine, TimerSettings,
    TimerState, Visibility,
};

#[derive(Default)]
struct CountingDispatcher {
    sessions: Mutex<Vec<CompletedSession>>,
}

impl CompletionDispatcher for CountingDispatcher {
    fn dispatch(&self, session: CompletedSession) -> Result<(), DispatchError> {
        self.sessions.lock().unwrap().push(session);
        Ok(())
    }
}

#[derive(Default)]
struct Notes(Mutex<Vec<String>>);

impl Notifier for Notes {
    fn notify(&self, title: &str, _description: &str) {
        self.0.lock().unwrap().push(title.to_string());
    }
}

fn settings() -> TimerSettings {
    TimerSettings {
        work_duration: 25,
        break_duration: 5,
        long_break_duration: 15,
        sessions_until_long_break: 4,
        auto_start_breaks: false,
        auto_start_focus: false,
    }
}

/// A running work session with `remaining` seconds left.
fn running_engine(
    settings: TimerSettings,
    remaining: u64,
) -> (TimerEngine, ManualClock, Arc<CountingDispatcher>) {
    let mut state = TimerState::new(&settings);
    state.time_remaining = remaining;
    let clock = ManualClock::new(1_700_000_000_000);
    let dispatcher = Arc::new(CountingDispatcher::default());
    let mut engine = TimerEngine::restore(state, settings)
        .with_clock(Arc::new(clock.clone()))
        .with_collaborators(Collaborators {
            dispatcher: dispatcher.clone(),
            cue: Arc::new(LogCuePlayer::default()),
            notifier: Arc::new(Notes::default()),
        });
    engine.start();
    (engine, clock, dispatcher)
}

#[test]
fn hidden_45_seconds_reconciles_without_completing() {
    let (mut engine, clock, dispatcher) = running_engine(settings(), 100);
    engine.set_visibility(Visibility::Hidden);
    clock.advance_secs(45);
    engine.set_visibility(Visibility::Visible);

    assert_eq!(engine.time_remaining(), 55);
    assert!(engine.is_running());
    assert!(dispatcher.sessions.lock().unwrap().is_empty());
}

#[test]
fn hidden_150_seconds_completes_exactly_once() {
    let (mut engine, clock, dispatcher) = running_engine(settings(), 100);
    engine.set_visibility(Visibility::Hidden);
    clock.advance_secs(150);
    let ev = engine.set_visibility(Visibility::Visible);

    assert!(matches!(
        ev,
        Some(Event::SessionCompleted {
            mode: Mode::Work,
            next_mode: Mode::Break,
            ..
        })
    ));
    assert_eq!(dispatcher.sessions.lock().unwrap().len(), 1);
    assert_eq!(engine.mode(), Mode::Break);

    // The tick that would have seen zero arrives late and finds nothing to do.
    clock.advance_ms(10);
    assert!(engine.tick().is_none());
    assert_eq!(dispatcher.sessions.lock().unwrap().len(), 1);
}

#[test]
fn tick_and_visibility_at_zero_complete_once() {
    for auto_start_breaks in [false, true] {
        let (mut engine, clock, dispatcher) = running_engine(
            TimerSettings {
                auto_start_breaks,
                ..settings()
            },
            3,
        );
        engine.set_visibility(Visibility::Hidden);
        clock.advance_secs(3);
        engine.tick();
        engine.set_visibility(Visibility::Visible);

        assert_eq!(
            dispatcher.sessions.lock().unwrap().len(),
            1,
            "auto_start_breaks = {auto_start_breaks}"
        );
        assert_eq!(engine.mode(), Mode::Break);
        assert_eq!(engine.time_remaining(), 5 * 60);
        assert_eq!(engine.is_running(), auto_start_breaks);
    }
}

#[test]
fn visibility_then_tick_at_zero_complete_once() {
    let (mut engine, clock, dispatcher) = running_engine(
        TimerSettings {
            auto_start_breaks: true,
            ..settings()
        },
        3,
    );
    engine.set_visibility(Visibility::Hidden);
    clock.advance_secs(3);
    engine.set_visibility(Visibility::Visible);
    engine.tick();

    assert_eq!(dispatcher.sessions.lock().unwrap().len(), 1);
    assert_eq!(engine.time_remaining(), 5 * 60);
}

#[test]
fn long_break_after_fourth_session() {
    let (mut engine, clock, dispatcher) = running_engine(settings(), 25 * 60);
    let mut next_modes = Vec::new();
    for _ in 0..8 {
        if !engine.is_running() {
            engine.start();
        }
        clock.advance_secs(engine.time_remaining());
        if let Some(Event::SessionCompleted { next_mode, .. }) = engine.tick() {
            next_modes.push(next_mode);
        }
    }
    assert_eq!(
        next_modes,
        vec![
            Mode::Break,
            Mode::Work,
            Mode::Break,
            Mode::Work,
            Mode::Break,
            Mode::Work,
            Mode::LongBreak,
            Mode::Work,
        ]
    );
    let sessions = dispatcher.sessions.lock().unwrap();
    assert_eq!(sessions.len(), 8);
    assert_eq!(sessions[7].mode, Mode::LongBreak);
    assert_eq!(sessions[7].duration_secs, 15 * 60);
}

#[tokio::test]
async fn completed_work_session_lands_in_sqlite() {
    let gateway = Arc::new(SqliteGateway::new(Database::open_memory().unwrap()));
    let notes = Arc::new(Notes::default());
    let (dispatcher, writer) =
        PersistenceWriter::channel(Some("alice".into()), gateway.clone(), notes.clone());
    let writer = writer.spawn();

    let clock = ManualClock::new(1_700_000_000_000);
    let mut engine = TimerEngine::new(settings())
        .with_clock(Arc::new(clock.clone()))
        .with_collaborators(Collaborators {
            dispatcher: Arc::new(dispatcher),
            cue: Arc::new(LogCuePlayer::default()),
            notifier: notes.clone(),
        });

    engine.start();
    clock.advance_secs(25 * 60);
    assert!(matches!(engine.tick(), Some(Event::SessionCompleted { .. })));
    drop(engine);

    let report = writer.await.unwrap();
    assert_eq!(report.saved, 1);
    assert_eq!(report.failed, 0);

    let (recent, days) = gateway.with_db(|db| {
        (
            db.recent_sessions("alice", 5).unwrap(),
            db.daily_stats("alice", 100_000).unwrap(),
        )
    });
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].mode, Mode::Work);
    assert_eq!(recent[0].duration_secs, 25 * 60);
    assert!(recent[0].started_at.is_some());
    // Stamped with the engine clock, not the time the writer ran.
    assert_eq!(
        recent[0].completed_at.timestamp_millis(),
        1_700_000_000_000 + 25 * 60 * 1000
    );
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].day, recent[0].completed_at.date_naive());
    assert_eq!(days[0].work_minutes, 25);
    assert_eq!(
        notes.0.lock().unwrap().as_slice(),
        &["Focus session complete!".to_string()]
    );
}

#[tokio::test]
async fn closed_writer_aborts_completion() {
    let gateway = Arc::new(SqliteGateway::new(Database::open_memory().unwrap()));
    let (dispatcher, writer) = PersistenceWriter::channel(
        Some("alice".into()),
        gateway,
        Arc::new(Notes::default()),
    );
    drop(writer);

    let clock = ManualClock::new(0);
    let mut engine = TimerEngine::new(settings())
        .with_clock(Arc::new(clock.clone()))
        .with_collaborators(Collaborators {
            dispatcher: Arc::new(dispatcher),
            ..Collaborators::default()
        });
    engine.start();
    clock.advance_secs(25 * 60);

    assert!(matches!(
        engine.tick(),
        Some(Event::CompletionAborted { mode: Mode::Work, .. })
    ));
    assert_eq!(engine.mode(), Mode::Work);
    assert!(!engine.is_running());
    assert_eq!(engine.time_remaining(), 0);
}
