//! # Focusdeck Core Library
//!
//! This library provides the timer scheduling engine behind Focusdeck, a
//! Pomodoro-style focus timer. All operations are available through the
//! `focusdeck` CLI, and any other front end is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. The caller (or a
//!   [`TimerService`]) invokes `tick()` about once per second and reports host
//!   visibility so suspension gaps are reconciled in one step
//! - **Completion Pipeline**: Runs once per expiry: cue, persistence hand-off,
//!   mode advance, optional auto-start, notification
//! - **Persistence**: An async [`SessionGateway`] fed by a background writer;
//!   SQLite is the bundled backend
//! - **Configuration**: TOML-based settings, including the timer durations
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerService`]: Engine plus its tokio tick task
//! - [`resolve_next`]: Which mode follows a completed one
//! - [`Database`]: Session and statistics persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod persistence;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, DispatchError, GatewayError, ValidationError};
pub use events::Event;
pub use persistence::{PersistenceDispatcher, PersistenceWriter, SessionGateway, SqliteGateway};
pub use storage::{Config, Database};
pub use timer::{
    resolve_next, Collaborators, Mode, TimerEngine, TimerService, TimerSettings, TimerSnapshot,
    TimerState, Visibility,
};
