//! Playback and progress state machine for one media resource.
//!
//! `transition` is a pure `(state, event) -> effects` function;
//! `PlaybackSession` runs the effects against host collaborators and
//! drives timers through an injectable clock and scheduler.

mod controller;
mod driver;
mod effects;
mod events;
mod scheduler;
mod state;
mod transitions;


pub use controller::PlaybackController;
pub use driver::{
    ListeningAnalytics, MediaElement, MemoryAnalytics, MemoryProgressStore, PlaybackSession,
    ProgressStore, SessionNotice,
};
pub use effects::{FlushReason, ListeningWrite, PlaybackEffect, ProgressWrite};
pub use events::{PlayableUnit, PlaybackEvent, TimerKind};
pub use scheduler::{Clock, IntervalScheduler, ManualClock, Scheduler, SystemClock};
pub use state::{
    Intent, Lifecycle, ListeningAccrual, PlaybackSnapshot, PlaybackState, ResumePoint, Transport,
    WriteTracker,
};
pub use transitions::transition;
