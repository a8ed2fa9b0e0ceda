mod clock;
mod completion;
mod engine;
mod mode;
mod scheduler;
mod settings;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{
    completion_message, Collaborators, CompletedSession, CompletionDispatcher, CuePlayer,
    DiscardDispatcher, LogCuePlayer, LogNotifier, Notifier,
};
pub use engine::{ListenerId, TimerEngine, Visibility};
pub use mode::{resolve_next, Mode, Transition};
pub use scheduler::{TickScheduler, TimerService};
pub use settings::TimerSettings;
pub use state::{TimerSnapshot, TimerState};
