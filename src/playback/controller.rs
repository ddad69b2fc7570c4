use super::effects::PlaybackEffect;
use super::events::PlaybackEvent;
use super::state::{PlaybackSnapshot, PlaybackState};
use super::transitions::transition;
use crate::config::PlaybackTimings;
use tracing::trace;

/// Owns one resource's playback state exclusively.
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new(timings: PlaybackTimings, rate: f64) -> Self {
        Self {
            state: PlaybackState::new(timings, crate::preferences::normalize_rate(rate)),
        }
    }

    pub fn handle(&mut self, event: PlaybackEvent, now_ms: u64) -> Vec<PlaybackEffect> {
        let name = event.name();
        let effects = transition(&mut self.state, event, now_ms);
        trace!(
            event = name,
            lifecycle = self.state.lifecycle.label(),
            effects = effects.len(),
            "Playback transition"
        );
        effects
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.state.snapshot()
    }
}
