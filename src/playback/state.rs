use super::events::{PlayableUnit, TimerKind};
use crate::config::PlaybackTimings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Intent {
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Paused,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lifecycle {
    Idle,
    /// Ready is gated on both the saved progress and the media duration.
    Loading {
        awaiting_progress: bool,
        duration: Option<f64>,
    },
    Ready(Transport),
    /// `resume` is true when the media was playing as the seek began.
    Seeking {
        resume: bool,
    },
    Error,
}

impl Lifecycle {
    pub fn label(&self) -> &'static str {
        match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Loading { .. } => "loading",
            Lifecycle::Ready(Transport::Paused) => "ready_paused",
            Lifecycle::Ready(Transport::Playing) => "ready_playing",
            Lifecycle::Seeking { .. } => "seeking",
            Lifecycle::Error => "error",
        }
    }
}

/// Last known `(unit, position)` for a resource, kept independently of
/// server persistence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResumePoint {
    pub unit_index: usize,
    pub position: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListeningAccrual {
    pub accumulated_ms: u64,
    pub playing_since: Option<u64>,
    /// `(seq, ms)` of the flush awaiting acknowledgement.
    pub in_flight: Option<(u64, u64)>,
}

impl ListeningAccrual {
    /// Move elapsed play time since `playing_since` into the accumulator.
    pub fn fold(&mut self, now_ms: u64) {
        if let Some(since) = self.playing_since.take() {
            self.accumulated_ms += now_ms.saturating_sub(since);
        }
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
        self.playing_since = None;
        self.in_flight = None;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteTracker {
    pub last_seq: u64,
    pub latest_issued: Option<u64>,
    pub confirmed_seq: Option<u64>,
}

impl WriteTracker {
    /// Next tag: strictly greater than any previous one and never behind
    /// the clock.
    pub fn next_seq(&mut self, now_ms: u64) -> u64 {
        self.last_seq = now_ms.max(self.last_seq + 1);
        self.last_seq
    }
}

/// All state for one media resource, owned by the controller.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub resource_id: Option<String>,
    pub units: Vec<PlayableUnit>,
    pub language_id: Option<u64>,
    pub unit_index: usize,
    pub position: f64,
    pub duration: Option<f64>,
    pub intent: Intent,
    pub lifecycle: Lifecycle,
    pub dirty: bool,
    /// One-shot initial seek, applied at the next metadata-ready.
    pub pending_seek: Option<f64>,
    /// Saved progress was requested for this resource and not yet resolved.
    pub progress_pending: bool,
    pub start_pending: bool,
    pub source_loaded: bool,
    /// Any media data loaded for the current resource.
    pub media_loaded: bool,
    pub rate: f64,
    pub volume: f64,
    pub muted: bool,
    pub volume_before_mute: f64,
    pub last_error: Option<String>,
    pub accrual: ListeningAccrual,
    pub writes: WriteTracker,
    pub listening_seq: u64,
    pub active_timers: BTreeSet<TimerKind>,
    pub resume_points: HashMap<String, ResumePoint>,
    pub loaded_resources: HashSet<String>,
    pub timings: PlaybackTimings,
}

impl PlaybackState {
    pub fn new(timings: PlaybackTimings, rate: f64) -> Self {
        Self {
            resource_id: None,
            units: Vec::new(),
            language_id: None,
            unit_index: 0,
            position: 0.0,
            duration: None,
            intent: Intent::Paused,
            lifecycle: Lifecycle::Idle,
            dirty: false,
            pending_seek: None,
            progress_pending: false,
            start_pending: false,
            source_loaded: false,
            media_loaded: false,
            rate,
            volume: 1.0,
            muted: false,
            volume_before_mute: 1.0,
            last_error: None,
            accrual: ListeningAccrual::default(),
            writes: WriteTracker::default(),
            listening_seq: 0,
            active_timers: BTreeSet::new(),
            resume_points: HashMap::new(),
            loaded_resources: HashSet::new(),
            timings,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ready(Transport::Playing))
    }

    pub fn current_unit(&self) -> Option<&PlayableUnit> {
        self.units.get(self.unit_index)
    }

    /// Unit id as written to progress. Single-unit resources store a bare
    /// position.
    pub fn progress_unit_id(&self, unit_index: usize) -> Option<String> {
        if self.units.len() > 1 {
            self.units.get(unit_index).map(|unit| unit.id.clone())
        } else {
            None
        }
    }

    pub fn clamp_position(&self, position: f64) -> f64 {
        let position = if position.is_finite() { position } else { 0.0 };
        match self.duration {
            Some(duration) => position.clamp(0.0, duration.max(0.0)),
            None => position.max(0.0),
        }
    }

    pub fn remember_resume_point(&mut self) {
        if let Some(resource_id) = &self.resource_id {
            self.resume_points.insert(
                resource_id.clone(),
                ResumePoint {
                    unit_index: self.unit_index,
                    position: self.position,
                },
            );
        }
    }

    pub fn progress_percent(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => (self.position / duration * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            resource_id: self.resource_id.clone(),
            unit_index: self.unit_index,
            unit_count: self.units.len(),
            position_seconds: self.position,
            duration_seconds: self.duration,
            progress_percent: self.progress_percent(),
            intent: self.intent,
            lifecycle: self.lifecycle.label().to_string(),
            rate: self.rate,
            volume: self.volume,
            muted: self.muted,
            last_error: self.last_error.clone(),
            is_loading: matches!(self.lifecycle, Lifecycle::Loading { .. }),
        }
    }
}

/// Read model for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlaybackSnapshot {
    pub resource_id: Option<String>,
    #[ts(type = "number")]
    pub unit_index: usize,
    #[ts(type = "number")]
    pub unit_count: usize,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub progress_percent: f64,
    pub intent: Intent,
    pub lifecycle: String,
    pub rate: f64,
    pub volume: f64,
    pub muted: bool,
    pub last_error: Option<String>,
    pub is_loading: bool,
}
