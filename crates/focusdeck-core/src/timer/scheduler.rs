//! Tick scheduling on top of tokio.
//!
//! [`TickScheduler`] owns a single interval task that calls
//! [`TimerEngine::tick`] once per period while the engine runs. It keeps no
//! countdown state of its own; the engine measures real elapsed time, so a
//! late or throttled tick only makes the next decrement larger.
//!
//! [`TimerService`] is the handle UIs hold. It forwards each operation to the
//! engine under one lock and then starts or tears down the tick task to
//! match the engine's running flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::engine::{ListenerId, TimerEngine, Visibility};
use super::state::TimerSnapshot;
use super::{Mode, TimerSettings};
use crate::error::ValidationError;
use crate::events::Event;

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

fn lock(engine: &Mutex<TimerEngine>) -> MutexGuard<'_, TimerEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the handle of the running tick task, if any.
#[derive(Debug, Default)]
pub struct TickScheduler {
    handle: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the tick task unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ensure_started(&mut self, engine: Arc<Mutex<TimerEngine>>, period: Duration) {
        if self.is_active() {
            return;
        }
        debug!(?period, "starting tick task");
        self.handle = Some(tokio::spawn(run_ticks(engine, period)));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("cancelling tick task");
            handle.abort();
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run_ticks(engine: Arc<Mutex<TimerEngine>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let running = {
            let mut engine = lock(&engine);
            engine.tick();
            engine.is_running()
        };
        if !running {
            debug!("engine stopped, tick task exiting");
            break;
        }
    }
}

/// Shared handle over a [`TimerEngine`] and its tick task.
///
/// Methods that may start the timer must run inside a tokio runtime.
#[derive(Debug)]
pub struct TimerService {
    engine: Arc<Mutex<TimerEngine>>,
    scheduler: Mutex<TickScheduler>,
    period: Duration,
}

impl TimerService {
    pub fn new(engine: TimerEngine) -> Self {
        Self::with_period(engine, DEFAULT_TICK_PERIOD)
    }

    pub fn with_period(engine: TimerEngine, period: Duration) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            scheduler: Mutex::new(TickScheduler::new()),
            period,
        }
    }

    /// Read the engine under its lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&TimerEngine) -> R) -> R {
        f(&lock(&self.engine))
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        lock(&self.engine).snapshot()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler().is_active()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        lock(&self.engine).subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.engine).unsubscribe(id)
    }

    pub fn start(&self) -> Option<Event> {
        let event = lock(&self.engine).start();
        self.follow_engine();
        event
    }

    pub fn pause(&self) -> Option<Event> {
        self.scheduler().cancel();
        lock(&self.engine).pause()
    }

    pub fn reset(&self) -> Option<Event> {
        self.scheduler().cancel();
        lock(&self.engine).reset()
    }

    pub fn change_mode(&self, mode: Mode) -> Option<Event> {
        self.scheduler().cancel();
        lock(&self.engine).change_mode(mode)
    }

    pub fn sync_settings(
        &self,
        settings: TimerSettings,
    ) -> Result<Option<Event>, ValidationError> {
        lock(&self.engine).sync_settings(settings)
    }

    /// Forward a host visibility change. May run the completion pipeline,
    /// which may auto-start the next mode.
    pub fn set_visibility(&self, visibility: Visibility) -> Option<Event> {
        let event = lock(&self.engine).set_visibility(visibility);
        self.follow_engine();
        event
    }

    fn scheduler(&self) -> MutexGuard<'_, TickScheduler> {
        self.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn follow_engine(&self) {
        let running = lock(&self.engine).is_running();
        let mut scheduler = self.scheduler();
        if running {
            scheduler.ensure_started(self.engine.clone(), self.period);
        } else {
            scheduler.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::clock::Clock;

    /// Wall clock derived from tokio's (pausable) time.
    struct TokioClock {
        origin: tokio::time::Instant,
    }

    impl Clock for TokioClock {
        fn now_ms(&self) -> u64 {
            1_700_000_000_000 + self.origin.elapsed().as_millis() as u64
        }
    }

    fn one_minute_service() -> TimerService {
        let settings = TimerSettings {
            work_duration: 1,
            break_duration: 1,
            ..TimerSettings::default()
        };
        let engine = TimerEngine::new(settings).with_clock(Arc::new(TokioClock {
            origin: tokio::time::Instant::now(),
        }));
        TimerService::new(engine)
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_while_running() {
        let service = one_minute_service();
        service.start();
        assert!(service.is_ticking());
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(service.snapshot().time_remaining, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_cancels_ticks() {
        let service = one_minute_service();
        service.start();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        service.pause();
        assert!(!service.is_ticking());
        let held = service.snapshot().time_remaining;
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(service.snapshot().time_remaining, held);

        service.start();
        assert!(service.is_ticking());
        assert_eq!(service.snapshot().time_remaining, held);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_advances_mode_and_stops_ticking() {
        let service = one_minute_service();
        service.start();
        tokio::time::sleep(Duration::from_secs(65)).await;
        let snap = service.snapshot();
        assert_eq!(snap.mode, Mode::Break);
        assert!(!snap.is_running);
        assert_eq!(snap.completed_sessions, 1);
        assert!(!service.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn change_mode_tears_down_ticks() {
        let service = one_minute_service();
        service.start();
        service.change_mode(Mode::LongBreak);
        assert!(!service.is_ticking());
        assert_eq!(service.snapshot().time_remaining, 15 * 60);
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_see_ticks() {
        let service = one_minute_service();
        let ticks = Arc::new(Mutex::new(0u32));
        let sink = ticks.clone();
        service.subscribe(move |ev| {
            if matches!(ev, Event::Tick { .. }) {
                *sink.lock().unwrap() += 1;
            }
        });
        service.start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(*ticks.lock().unwrap(), 3);
    }
}
