use super::events::TimerKind;
use crate::error::{ConfigurationError, PlaybackError};
use serde::{Deserialize, Serialize};

/// Why a progress write was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    Periodic,
    Pause,
    Ended,
    SourceChange,
    Teardown,
}

impl FlushReason {
    /// Final flushes capture completion and shutdown, so they bypass the
    /// zero-position and end-of-unit suppression.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            FlushReason::Ended | FlushReason::SourceChange | FlushReason::Teardown
        )
    }
}

/// A sequence-tagged progress write. Tags grow monotonically per
/// controller and follow the controller clock, so a store can discard any
/// write older than one it already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressWrite {
    pub seq: u64,
    pub resource_id: String,
    pub unit_id: Option<String>,
    pub position_seconds: f64,
    pub reason: FlushReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListeningWrite {
    pub seq: u64,
    pub language_id: u64,
    pub seconds: u64,
}

/// Side effects requested by a transition, executed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEffect {
    LoadSource {
        unit_index: usize,
        unit_id: String,
        source: String,
    },
    RequestProgress {
        resource_id: String,
    },
    StartPlayback,
    PausePlayback,
    SeekMedia {
        position: f64,
    },
    ApplyRate {
        rate: f64,
    },
    ApplyVolume {
        volume: f64,
        muted: bool,
    },
    StartTimer {
        kind: TimerKind,
        period_ms: u64,
        repeating: bool,
    },
    CancelTimer {
        kind: TimerKind,
    },
    SaveProgress(ProgressWrite),
    LogListening(ListeningWrite),
    PersistRate {
        rate: f64,
    },
    SurfaceError(PlaybackError),
    ClearError,
    Notice(ConfigurationError),
}

impl PlaybackEffect {
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEffect::LoadSource { .. } => "load_source",
            PlaybackEffect::RequestProgress { .. } => "request_progress",
            PlaybackEffect::StartPlayback => "start_playback",
            PlaybackEffect::PausePlayback => "pause_playback",
            PlaybackEffect::SeekMedia { .. } => "seek_media",
            PlaybackEffect::ApplyRate { .. } => "apply_rate",
            PlaybackEffect::ApplyVolume { .. } => "apply_volume",
            PlaybackEffect::StartTimer { .. } => "start_timer",
            PlaybackEffect::CancelTimer { .. } => "cancel_timer",
            PlaybackEffect::SaveProgress(_) => "save_progress",
            PlaybackEffect::LogListening(_) => "log_listening",
            PlaybackEffect::PersistRate { .. } => "persist_rate",
            PlaybackEffect::SurfaceError(_) => "surface_error",
            PlaybackEffect::ClearError => "clear_error",
            PlaybackEffect::Notice(_) => "notice",
        }
    }
}
