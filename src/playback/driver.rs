//! Executes controller effects against the host's collaborators and feeds
//! their outcomes back as events.

use super::controller::PlaybackController;
use super::effects::{PlaybackEffect, ProgressWrite};
use super::events::PlaybackEvent;
use super::scheduler::{Clock, IntervalScheduler, Scheduler};
use super::state::PlaybackSnapshot;
use crate::boundary::SavedProgress;
use crate::config::PlaybackTimings;
use crate::error::{ConfigurationError, PersistenceError, PlaybackError};
use crate::preferences::{PlaybackPreferences, PreferenceStore};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// The media engine. `play` reports whether playback actually started.
pub trait MediaElement {
    fn load(&mut self, unit_id: &str, source: &str);
    fn play(&mut self) -> Result<(), String>;
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn set_rate(&mut self, rate: f64);
    fn set_volume(&mut self, volume: f64, muted: bool);
}

/// Progress Persistence Service.
pub trait ProgressStore {
    fn get_progress(&mut self, resource_id: &str) -> Result<Option<SavedProgress>, PersistenceError>;
    fn set_progress(&mut self, write: &ProgressWrite) -> Result<(), PersistenceError>;
}

/// Listening Analytics Service.
pub trait ListeningAnalytics {
    fn log_listening(&mut self, language_id: u64, seconds: u64) -> Result<(), PersistenceError>;
}

/// In-memory progress store that keeps the write with the highest
/// sequence tag per resource.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    entries: HashMap<String, (u64, SavedProgress)>,
    pub received: Vec<ProgressWrite>,
    pub fail_writes: bool,
}

impl MemoryProgressStore {
    pub fn with_progress(resource_id: &str, progress: SavedProgress) -> Self {
        let mut store = Self::default();
        store.entries.insert(resource_id.to_string(), (0, progress));
        store
    }

    pub fn stored(&self, resource_id: &str) -> Option<&SavedProgress> {
        self.entries.get(resource_id).map(|(_, progress)| progress)
    }
}

impl ProgressStore for MemoryProgressStore {
    fn get_progress(&mut self, resource_id: &str) -> Result<Option<SavedProgress>, PersistenceError> {
        Ok(self.stored(resource_id).cloned())
    }

    fn set_progress(&mut self, write: &ProgressWrite) -> Result<(), PersistenceError> {
        self.received.push(write.clone());
        if self.fail_writes {
            return Err(PersistenceError::write("progress", "store offline"));
        }
        match self.entries.get(&write.resource_id) {
            Some((seq, _)) if *seq > write.seq => {
                debug!(
                    seq = write.seq,
                    stored = *seq,
                    "Discarding superseded progress write"
                );
            }
            _ => {
                self.entries.insert(
                    write.resource_id.clone(),
                    (
                        write.seq,
                        SavedProgress::new(write.unit_id.clone(), Some(write.position_seconds)),
                    ),
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAnalytics {
    pub logged: Vec<(u64, u64)>,
    pub fail: bool,
}

impl ListeningAnalytics for MemoryAnalytics {
    fn log_listening(&mut self, language_id: u64, seconds: u64) -> Result<(), PersistenceError> {
        if self.fail {
            return Err(PersistenceError::write("listening time", "analytics offline"));
        }
        self.logged.push((language_id, seconds));
        Ok(())
    }
}

/// Messages for the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    Error(PlaybackError),
    ErrorCleared,
    Info(ConfigurationError),
}

/// A controller wired to concrete collaborators, a clock and a scheduler.
pub struct PlaybackSession<M, S, A, P, C> {
    controller: PlaybackController,
    media: M,
    progress: S,
    analytics: A,
    preferences: PlaybackPreferences<P>,
    clock: C,
    scheduler: IntervalScheduler,
    queue: VecDeque<PlaybackEvent>,
    notices: Vec<SessionNotice>,
}

impl<M, S, A, P, C> PlaybackSession<M, S, A, P, C>
where
    M: MediaElement,
    S: ProgressStore,
    A: ListeningAnalytics,
    P: PreferenceStore,
    C: Clock,
{
    pub fn new(
        timings: PlaybackTimings,
        media: M,
        progress: S,
        analytics: A,
        preference_store: P,
        clock: C,
    ) -> Self {
        let preferences = PlaybackPreferences::init(preference_store, timings.default_rate);
        let controller = PlaybackController::new(timings, preferences.rate());
        Self {
            controller,
            media,
            progress,
            analytics,
            preferences,
            clock,
            scheduler: IntervalScheduler::default(),
            queue: VecDeque::new(),
            notices: Vec::new(),
        }
    }

    /// Handle an event and everything it causes, to completion.
    pub fn dispatch(&mut self, event: PlaybackEvent) {
        self.queue.push_back(event);
        while let Some(next) = self.queue.pop_front() {
            let now_ms = self.clock.now_ms();
            for effect in self.controller.handle(next, now_ms) {
                self.execute(effect, now_ms);
            }
        }
    }

    /// Fire whatever timers are due on the session clock.
    pub fn tick(&mut self) {
        let now_ms = self.clock.now_ms();
        for kind in self.scheduler.due(now_ms) {
            self.dispatch(PlaybackEvent::TimerFired(kind));
        }
    }

    fn execute(&mut self, effect: PlaybackEffect, now_ms: u64) {
        match effect {
            PlaybackEffect::LoadSource {
                unit_id, source, ..
            } => self.media.load(&unit_id, &source),
            PlaybackEffect::RequestProgress { resource_id } => {
                let result = self.progress.get_progress(&resource_id);
                self.queue.push_back(PlaybackEvent::ProgressLoaded {
                    resource_id,
                    result,
                });
            }
            PlaybackEffect::StartPlayback => match self.media.play() {
                Ok(()) => self.queue.push_back(PlaybackEvent::PlayStarted),
                Err(reason) => self.queue.push_back(PlaybackEvent::PlayRejected { reason }),
            },
            PlaybackEffect::PausePlayback => {
                self.media.pause();
                self.queue.push_back(PlaybackEvent::Paused);
            }
            PlaybackEffect::SeekMedia { position } => self.media.seek(position),
            PlaybackEffect::ApplyRate { rate } => self.media.set_rate(rate),
            PlaybackEffect::ApplyVolume { volume, muted } => self.media.set_volume(volume, muted),
            PlaybackEffect::StartTimer {
                kind,
                period_ms,
                repeating,
            } => self.scheduler.schedule(kind, period_ms, repeating, now_ms),
            PlaybackEffect::CancelTimer { kind } => self.scheduler.cancel(kind),
            PlaybackEffect::SaveProgress(write) => {
                let result = self.progress.set_progress(&write);
                self.queue.push_back(PlaybackEvent::ProgressSaved {
                    seq: write.seq,
                    result,
                });
            }
            PlaybackEffect::LogListening(write) => {
                let result = self.analytics.log_listening(write.language_id, write.seconds);
                self.queue.push_back(PlaybackEvent::ListeningLogged {
                    seq: write.seq,
                    result,
                });
            }
            PlaybackEffect::PersistRate { rate } => {
                self.preferences.set_rate(rate);
            }
            PlaybackEffect::SurfaceError(err) => {
                warn!("Surfacing playback error: {err}");
                self.notices.push(SessionNotice::Error(err));
            }
            PlaybackEffect::ClearError => self.notices.push(SessionNotice::ErrorCleared),
            PlaybackEffect::Notice(notice) => self.notices.push(SessionNotice::Info(notice)),
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot()
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn take_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn progress_store(&self) -> &S {
        &self.progress
    }

    pub fn progress_store_mut(&mut self) -> &mut S {
        &mut self.progress
    }

    pub fn analytics(&self) -> &A {
        &self.analytics
    }

    pub fn analytics_mut(&mut self) -> &mut A {
        &mut self.analytics
    }

    pub fn preferences(&self) -> &PlaybackPreferences<P> {
        &self.preferences
    }

    pub fn scheduler(&self) -> &IntervalScheduler {
        &self.scheduler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::effects::FlushReason;
    use crate::playback::events::{PlayableUnit, TimerKind};
    use crate::playback::scheduler::ManualClock;
    use crate::playback::state::{Intent, Lifecycle};
    use crate::preferences::{MemoryPreferenceStore, PLAYBACK_RATE_KEY};

    #[derive(Debug, Default)]
    struct FakeMedia {
        loaded: Vec<String>,
        seeks: Vec<f64>,
        plays: usize,
        pauses: usize,
        rate: Option<f64>,
        reject: Option<String>,
    }

    impl MediaElement for FakeMedia {
        fn load(&mut self, unit_id: &str, _source: &str) {
            self.loaded.push(unit_id.to_string());
        }

        fn play(&mut self) -> Result<(), String> {
            match &self.reject {
                Some(reason) => Err(reason.clone()),
                None => {
                    self.plays += 1;
                    Ok(())
                }
            }
        }

        fn pause(&mut self) {
            self.pauses += 1;
        }

        fn seek(&mut self, position: f64) {
            self.seeks.push(position);
        }

        fn set_rate(&mut self, rate: f64) {
            self.rate = Some(rate);
        }

        fn set_volume(&mut self, _volume: f64, _muted: bool) {}
    }

    type TestSession<'a> = PlaybackSession<
        FakeMedia,
        MemoryProgressStore,
        MemoryAnalytics,
        MemoryPreferenceStore,
        &'a ManualClock,
    >;

    fn session(clock: &ManualClock, progress: MemoryProgressStore) -> TestSession<'_> {
        PlaybackSession::new(
            PlaybackTimings::default(),
            FakeMedia::default(),
            progress,
            MemoryAnalytics::default(),
            MemoryPreferenceStore::default(),
            clock,
        )
    }

    fn assign_lesson(session: &mut TestSession<'_>) {
        session.dispatch(PlaybackEvent::SourceAssigned {
            resource_id: "lesson-1".to_string(),
            units: vec![PlayableUnit {
                id: "lesson-1".to_string(),
                source: "/audio/lesson-1.mp3".to_string(),
            }],
            language_id: Some(3),
        });
        session.dispatch(PlaybackEvent::MetadataReady { duration: 120.0 });
    }

    #[test]
    fn resumes_saved_position_and_flushes_on_timers() {
        let clock = ManualClock::new(1_000_000);
        let store =
            MemoryProgressStore::with_progress("lesson-1", SavedProgress::new(None, Some(12.0)));
        let mut session = session(&clock, store);
        assign_lesson(&mut session);
        assert_eq!(session.media().loaded, vec!["lesson-1"]);
        assert_eq!(session.media().seeks, vec![12.0]);
        assert!(!session.scheduler().is_scheduled(TimerKind::ProgressLoadTimeout));

        session.dispatch(PlaybackEvent::PlayRequested);
        assert_eq!(session.media().plays, 1);
        assert_eq!(session.snapshot().intent, Intent::Playing);

        clock.advance(15_000);
        session.dispatch(PlaybackEvent::TimeUpdate { position: 27.0 });
        session.tick();
        assert_eq!(
            session.progress_store().stored("lesson-1"),
            Some(&SavedProgress::new(None, Some(27.0)))
        );

        clock.advance(45_000);
        session.tick();
        assert_eq!(session.analytics().logged, vec![(3, 60)]);
        assert_eq!(session.controller().state().accrual.accumulated_ms, 0);
    }

    #[test]
    fn rejected_play_surfaces_notice() {
        let clock = ManualClock::new(5_000);
        let mut session = session(&clock, MemoryProgressStore::default());
        assign_lesson(&mut session);
        session.media_mut().reject = Some("NotAllowedError".to_string());
        session.dispatch(PlaybackEvent::PlayRequested);

        assert_eq!(session.controller().state().lifecycle, Lifecycle::Error);
        assert_eq!(
            session.take_notices(),
            vec![SessionNotice::Error(PlaybackError::Rejected(
                "NotAllowedError".to_string()
            ))]
        );
    }

    #[test]
    fn pause_request_round_trips_through_media() {
        let clock = ManualClock::new(5_000);
        let mut session = session(&clock, MemoryProgressStore::default());
        assign_lesson(&mut session);
        session.dispatch(PlaybackEvent::PlayRequested);
        clock.advance(9_000);
        session.dispatch(PlaybackEvent::TimeUpdate { position: 9.0 });
        session.dispatch(PlaybackEvent::PauseRequested);

        assert_eq!(session.media().pauses, 1);
        assert!(session.scheduler().active().is_empty());
        assert_eq!(
            session.progress_store().stored("lesson-1"),
            Some(&SavedProgress::new(None, Some(9.0)))
        );
        assert_eq!(session.analytics().logged, vec![(3, 9)]);
    }

    #[test]
    fn rate_persists_between_sessions() {
        let clock = ManualClock::new(5_000);
        let mut first = session(&clock, MemoryProgressStore::default());
        assign_lesson(&mut first);
        first.dispatch(PlaybackEvent::StepRate { steps: 3 });
        assert_eq!(first.media().rate, Some(1.15));
        let stored = first.preferences().store().clone();
        assert_eq!(
            stored.read(PLAYBACK_RATE_KEY).unwrap().as_deref(),
            Some("1.15")
        );

        let mut second = PlaybackSession::new(
            PlaybackTimings::default(),
            FakeMedia::default(),
            MemoryProgressStore::default(),
            MemoryAnalytics::default(),
            stored,
            &clock,
        );
        assign_lesson(&mut second);
        assert_eq!(second.media().rate, Some(1.15));
    }

    #[test]
    fn teardown_writes_final_progress() {
        let clock = ManualClock::new(5_000);
        let store =
            MemoryProgressStore::with_progress("lesson-1", SavedProgress::new(None, Some(40.0)));
        let mut session = session(&clock, store);
        assign_lesson(&mut session);
        clock.advance(1_000);
        session.dispatch(PlaybackEvent::Teardown);

        let last = session.progress_store().received.last().cloned();
        assert_eq!(last.map(|write| write.reason), Some(FlushReason::Teardown));
        assert!(session.scheduler().active().is_empty());
    }
}
