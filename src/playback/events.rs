use crate::boundary::SavedProgress;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One playable item of a resource. Single-file lessons have one unit;
/// audiobooks have one per track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlayableUnit {
    pub id: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TimerKind {
    PositionFlush,
    ListeningFlush,
    ProgressLoadTimeout,
}

impl TimerKind {
    pub fn name(self) -> &'static str {
        match self {
            TimerKind::PositionFlush => "position_flush",
            TimerKind::ListeningFlush => "listening_flush",
            TimerKind::ProgressLoadTimeout => "progress_load_timeout",
        }
    }
}

/// Everything that can advance the controller: media element lifecycle,
/// user input, timers and collaborator acknowledgements.
#[derive(Debug)]
pub enum PlaybackEvent {
    SourceAssigned {
        resource_id: String,
        units: Vec<PlayableUnit>,
        language_id: Option<u64>,
    },
    ProgressLoaded {
        resource_id: String,
        result: Result<Option<SavedProgress>, PersistenceError>,
    },
    MetadataReady {
        duration: f64,
    },
    MediaFailed {
        message: String,
    },
    PlayRequested,
    PauseRequested,
    TogglePlayPause,
    PlayStarted,
    PlayRejected {
        reason: String,
    },
    Paused,
    Ended,
    TimeUpdate {
        position: f64,
    },
    SeekTo {
        position: f64,
    },
    SeekBy {
        delta: f64,
    },
    SeekToFraction {
        fraction: f64,
    },
    /// Relative seek by whole steps of the configured skip length.
    Skip {
        steps: i32,
    },
    Seeked,
    Retry,
    TimerFired(TimerKind),
    ProgressSaved {
        seq: u64,
        result: Result<(), PersistenceError>,
    },
    ListeningLogged {
        seq: u64,
        result: Result<(), PersistenceError>,
    },
    SetRate {
        rate: f64,
    },
    StepRate {
        steps: i32,
    },
    NextUnit,
    PrevUnit,
    SelectUnit {
        index: usize,
    },
    SetVolume {
        volume: f64,
    },
    ToggleMute,
    Teardown,
}

impl PlaybackEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::SourceAssigned { .. } => "source_assigned",
            PlaybackEvent::ProgressLoaded { .. } => "progress_loaded",
            PlaybackEvent::MetadataReady { .. } => "metadata_ready",
            PlaybackEvent::MediaFailed { .. } => "media_failed",
            PlaybackEvent::PlayRequested => "play_requested",
            PlaybackEvent::PauseRequested => "pause_requested",
            PlaybackEvent::TogglePlayPause => "toggle_play_pause",
            PlaybackEvent::PlayStarted => "play_started",
            PlaybackEvent::PlayRejected { .. } => "play_rejected",
            PlaybackEvent::Paused => "paused",
            PlaybackEvent::Ended => "ended",
            PlaybackEvent::TimeUpdate { .. } => "time_update",
            PlaybackEvent::SeekTo { .. } => "seek_to",
            PlaybackEvent::SeekBy { .. } => "seek_by",
            PlaybackEvent::SeekToFraction { .. } => "seek_to_fraction",
            PlaybackEvent::Skip { .. } => "skip",
            PlaybackEvent::Seeked => "seeked",
            PlaybackEvent::Retry => "retry",
            PlaybackEvent::TimerFired(_) => "timer_fired",
            PlaybackEvent::ProgressSaved { .. } => "progress_saved",
            PlaybackEvent::ListeningLogged { .. } => "listening_logged",
            PlaybackEvent::SetRate { .. } => "set_rate",
            PlaybackEvent::StepRate { .. } => "step_rate",
            PlaybackEvent::NextUnit => "next_unit",
            PlaybackEvent::PrevUnit => "prev_unit",
            PlaybackEvent::SelectUnit { .. } => "select_unit",
            PlaybackEvent::SetVolume { .. } => "set_volume",
            PlaybackEvent::ToggleMute => "toggle_mute",
            PlaybackEvent::Teardown => "teardown",
        }
    }
}
