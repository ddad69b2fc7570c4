use super::effects::{FlushReason, ListeningWrite, PlaybackEffect, ProgressWrite};
use super::events::{PlayableUnit, PlaybackEvent, TimerKind};
use super::state::{Intent, Lifecycle, PlaybackState, Transport};
use crate::boundary::SavedProgress;
use crate::error::{ConfigurationError, PersistenceError, PlaybackError};
use crate::preferences::normalize_rate;
use tracing::{debug, info, warn};

type Effects = Vec<PlaybackEffect>;

/// Advance `state` by one event. Never blocks; collaborator work is
/// returned as effects and its outcome comes back as later events.
pub fn transition(state: &mut PlaybackState, event: PlaybackEvent, now_ms: u64) -> Effects {
    let mut fx = Vec::new();
    match event {
        PlaybackEvent::SourceAssigned {
            resource_id,
            units,
            language_id,
        } => on_source_assigned(state, &mut fx, resource_id, units, language_id, now_ms),
        PlaybackEvent::ProgressLoaded {
            resource_id,
            result,
        } => on_progress_loaded(state, &mut fx, resource_id, result),
        PlaybackEvent::MetadataReady { duration } => on_metadata_ready(state, &mut fx, duration),
        PlaybackEvent::MediaFailed { message } => {
            fail(state, &mut fx, PlaybackError::MediaFailed(message), now_ms)
        }
        PlaybackEvent::PlayRequested => on_play_requested(state, &mut fx),
        PlaybackEvent::PauseRequested => on_pause_requested(state, &mut fx),
        PlaybackEvent::TogglePlayPause => match state.intent {
            Intent::Playing => on_pause_requested(state, &mut fx),
            Intent::Paused => on_play_requested(state, &mut fx),
        },
        PlaybackEvent::PlayStarted => on_play_started(state, &mut fx, now_ms),
        PlaybackEvent::PlayRejected { reason } => {
            state.start_pending = false;
            fail(state, &mut fx, PlaybackError::Rejected(reason), now_ms)
        }
        PlaybackEvent::Paused => on_paused(state, &mut fx, now_ms),
        PlaybackEvent::Ended => on_ended(state, &mut fx, now_ms),
        PlaybackEvent::TimeUpdate { position } => on_time_update(state, position),
        PlaybackEvent::SeekTo { position } => seek_to(state, &mut fx, position, now_ms),
        PlaybackEvent::SeekBy { delta } => {
            if delta.is_finite() {
                let target = state.position + delta;
                seek_to(state, &mut fx, target, now_ms);
            }
        }
        PlaybackEvent::SeekToFraction { fraction } => match state.duration {
            Some(duration) if fraction.is_finite() => {
                seek_to(state, &mut fx, fraction.clamp(0.0, 1.0) * duration, now_ms)
            }
            _ => debug!(fraction, "Ignoring fractional seek without a known duration"),
        },
        PlaybackEvent::Skip { steps } => {
            let target = state.position + f64::from(steps) * state.timings.seek_step_secs;
            seek_to(state, &mut fx, target, now_ms)
        }
        PlaybackEvent::Seeked => on_seeked(state, &mut fx, now_ms),
        PlaybackEvent::Retry => retry(state, &mut fx),
        PlaybackEvent::TimerFired(kind) => on_timer(state, &mut fx, kind, now_ms),
        PlaybackEvent::ProgressSaved { seq, result } => on_progress_saved(state, seq, result),
        PlaybackEvent::ListeningLogged { seq, result } => on_listening_logged(state, seq, result),
        PlaybackEvent::SetRate { rate } => set_rate(state, &mut fx, rate),
        PlaybackEvent::StepRate { steps } => {
            let rate = state.rate + f64::from(steps) * state.timings.rate_step;
            set_rate(state, &mut fx, rate)
        }
        PlaybackEvent::NextUnit => {
            let index = state.unit_index + 1;
            select_unit(state, &mut fx, index, now_ms)
        }
        PlaybackEvent::PrevUnit => match state.unit_index.checked_sub(1) {
            Some(index) => select_unit(state, &mut fx, index, now_ms),
            None => debug!("Already at the first unit"),
        },
        PlaybackEvent::SelectUnit { index } => select_unit(state, &mut fx, index, now_ms),
        PlaybackEvent::SetVolume { volume } => set_volume(state, &mut fx, volume),
        PlaybackEvent::ToggleMute => toggle_mute(state, &mut fx),
        PlaybackEvent::Teardown => on_teardown(state, &mut fx, now_ms),
    }
    fx
}

fn on_source_assigned(
    state: &mut PlaybackState,
    fx: &mut Effects,
    resource_id: String,
    units: Vec<PlayableUnit>,
    language_id: Option<u64>,
    now_ms: u64,
) {
    if state.resource_id.is_some() {
        leave_resource(state, fx, FlushReason::SourceChange, now_ms);
    }

    state.resource_id = Some(resource_id.clone());
    state.units = units;
    state.language_id = language_id;
    state.unit_index = 0;
    state.position = 0.0;
    state.duration = None;
    state.intent = Intent::Paused;
    state.dirty = false;
    state.pending_seek = None;
    state.progress_pending = false;
    state.start_pending = false;
    state.source_loaded = false;
    state.media_loaded = false;
    state.last_error = None;
    state.accrual.reset();
    state.writes.latest_issued = None;

    if state.units.is_empty() {
        warn!(%resource_id, "Resource has no playable units");
        state.lifecycle = Lifecycle::Idle;
        fx.push(PlaybackEffect::Notice(ConfigurationError::NoPlayableUnits));
        return;
    }

    let first_load = state.loaded_resources.insert(resource_id.clone());
    state.lifecycle = Lifecycle::Loading {
        awaiting_progress: first_load,
        duration: None,
    };
    info!(
        %resource_id,
        units = state.units.len(),
        first_load,
        "Assigned media source"
    );

    if first_load {
        state.progress_pending = true;
        // Multi-unit resources wait for progress to know which unit to load.
        if state.units.len() == 1 {
            load_unit(state, fx, 0);
        }
        fx.push(PlaybackEffect::RequestProgress { resource_id });
        let timeout = state.timings.progress_load_timeout_ms;
        start_timer(state, fx, TimerKind::ProgressLoadTimeout, timeout, false);
    } else {
        let point = state.resume_points.get(&resource_id).copied();
        let (unit_index, position) = point
            .map(|point| (point.unit_index, point.position))
            .unwrap_or((0, 0.0));
        debug!(
            %resource_id,
            unit_index, position, "Resuming from local position cache"
        );
        apply_resume(state, fx, unit_index, position);
    }
}

fn on_progress_loaded(
    state: &mut PlaybackState,
    fx: &mut Effects,
    resource_id: String,
    result: Result<Option<SavedProgress>, PersistenceError>,
) {
    if state.resource_id.as_deref() != Some(resource_id.as_str()) {
        debug!(
            %resource_id,
            current = ?state.resource_id,
            "Ignoring stale progress for different resource"
        );
        return;
    }
    if !state.progress_pending {
        debug!(%resource_id, "Ignoring progress response outside initial load");
        return;
    }
    cancel_timer(state, fx, TimerKind::ProgressLoadTimeout);

    let saved = match result {
        Ok(saved) => saved,
        Err(err) => {
            warn!(%resource_id, "Failed to load saved progress; starting from zero: {err}");
            None
        }
    };
    if state.lifecycle == Lifecycle::Error {
        // Held until retry reloads the media.
        state.progress_pending = false;
        let (unit_index, position) = saved_resume_point(state, saved);
        debug!(unit_index, position, "Stored saved progress during playback error");
        if unit_index != state.unit_index {
            state.unit_index = unit_index;
            state.position = 0.0;
            state.duration = None;
            state.pending_seek = None;
        }
        if state.pending_seek.is_none() {
            state.pending_seek = (position.is_finite() && position > 0.0).then_some(position);
        }
        return;
    }
    resolve_progress(state, fx, saved);
}

fn saved_resume_point(state: &PlaybackState, saved: Option<SavedProgress>) -> (usize, f64) {
    match saved {
        Some(progress) => {
            let unit_index = match (&progress.unit_id, state.units.len()) {
                (_, 1) | (None, _) => Some(0),
                (Some(id), _) => state.units.iter().position(|unit| &unit.id == id),
            };
            match unit_index {
                Some(index) => (index, progress.position_seconds.unwrap_or(0.0)),
                None => {
                    debug!(unit_id = ?progress.unit_id, "Saved unit not found; starting from first unit");
                    (0, 0.0)
                }
            }
        }
        None => (0, 0.0),
    }
}

fn resolve_progress(state: &mut PlaybackState, fx: &mut Effects, saved: Option<SavedProgress>) {
    let (unit_index, position) = saved_resume_point(state, saved);
    state.progress_pending = false;
    // A seek the user made while progress was loading wins on the same unit.
    if unit_index != state.unit_index {
        state.pending_seek = None;
    }
    let position = state.pending_seek.unwrap_or(position);
    if let Lifecycle::Loading { duration, .. } = state.lifecycle {
        state.lifecycle = Lifecycle::Loading {
            awaiting_progress: false,
            duration,
        };
    }
    debug!(unit_index, position, "Resolved saved progress");
    apply_resume(state, fx, unit_index, position);
}

fn apply_resume(state: &mut PlaybackState, fx: &mut Effects, unit_index: usize, position: f64) {
    let unit_index = unit_index.min(state.units.len().saturating_sub(1));
    state.pending_seek = (position.is_finite() && position > 0.0).then_some(position);
    if !state.source_loaded || state.unit_index != unit_index {
        load_unit(state, fx, unit_index);
    } else {
        maybe_settle(state, fx);
    }
}

fn load_unit(state: &mut PlaybackState, fx: &mut Effects, unit_index: usize) {
    let Some(unit) = state.units.get(unit_index).cloned() else {
        return;
    };
    state.unit_index = unit_index;
    state.duration = None;
    state.source_loaded = true;
    let awaiting_progress = matches!(
        state.lifecycle,
        Lifecycle::Loading {
            awaiting_progress: true,
            ..
        }
    );
    state.lifecycle = Lifecycle::Loading {
        awaiting_progress,
        duration: None,
    };
    info!(unit_index, unit_id = %unit.id, "Loading media unit");
    fx.push(PlaybackEffect::LoadSource {
        unit_index,
        unit_id: unit.id,
        source: unit.source,
    });
}

fn on_metadata_ready(state: &mut PlaybackState, fx: &mut Effects, duration: f64) {
    if !duration.is_finite() || duration < 0.0 {
        warn!(duration, "Ignoring unusable media duration");
        return;
    }
    match state.lifecycle {
        Lifecycle::Loading {
            awaiting_progress, ..
        } => {
            state.media_loaded = true;
            state.duration = Some(duration);
            state.lifecycle = Lifecycle::Loading {
                awaiting_progress,
                duration: Some(duration),
            };
            maybe_settle(state, fx);
        }
        Lifecycle::Ready(_) | Lifecycle::Seeking { .. } => {
            state.duration = Some(duration);
            state.position = state.clamp_position(state.position);
        }
        Lifecycle::Idle | Lifecycle::Error => {
            debug!(duration, lifecycle = state.lifecycle.label(), "Ignoring metadata");
        }
    }
}

fn maybe_settle(state: &mut PlaybackState, fx: &mut Effects) {
    if let Lifecycle::Loading {
        awaiting_progress: false,
        duration: Some(duration),
    } = state.lifecycle
    {
        settle(state, fx, duration);
    }
}

fn settle(state: &mut PlaybackState, fx: &mut Effects, duration: f64) {
    state.duration = Some(duration);
    state.position = 0.0;
    if let Some(seek) = state.pending_seek.take() {
        if seek < duration {
            state.position = seek;
            fx.push(PlaybackEffect::SeekMedia { position: seek });
        } else {
            debug!(seek, duration, "Saved position beyond unit end; starting from zero");
        }
    }
    fx.push(PlaybackEffect::ApplyRate { rate: state.rate });
    fx.push(PlaybackEffect::ApplyVolume {
        volume: state.volume,
        muted: state.muted,
    });
    state.lifecycle = Lifecycle::Ready(Transport::Paused);
    state.remember_resume_point();
    info!(
        unit_index = state.unit_index,
        position = state.position,
        duration,
        "Playback ready"
    );
    if state.intent == Intent::Playing {
        request_start(state, fx);
    }
}

fn request_start(state: &mut PlaybackState, fx: &mut Effects) {
    if !state.start_pending {
        state.start_pending = true;
        fx.push(PlaybackEffect::StartPlayback);
    }
}

fn on_play_requested(state: &mut PlaybackState, fx: &mut Effects) {
    state.intent = Intent::Playing;
    match state.lifecycle {
        Lifecycle::Ready(Transport::Paused) => request_start(state, fx),
        Lifecycle::Error => retry(state, fx),
        // Loading and Seeking honor the intent once they settle.
        _ => {}
    }
}

fn on_pause_requested(state: &mut PlaybackState, fx: &mut Effects) {
    state.intent = Intent::Paused;
    match state.lifecycle {
        Lifecycle::Ready(Transport::Playing) => fx.push(PlaybackEffect::PausePlayback),
        Lifecycle::Seeking { resume: true } => {
            state.lifecycle = Lifecycle::Seeking { resume: false };
            fx.push(PlaybackEffect::PausePlayback);
        }
        _ => {}
    }
}

fn on_play_started(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    let was_pending = std::mem::replace(&mut state.start_pending, false);
    match state.lifecycle {
        Lifecycle::Ready(Transport::Paused) => {
            if was_pending && state.intent == Intent::Paused {
                debug!("Pause requested while start was in flight");
                fx.push(PlaybackEffect::PausePlayback);
                return;
            }
            enter_playing(state, fx, now_ms);
        }
        Lifecycle::Ready(Transport::Playing) => {}
        _ => debug!(lifecycle = state.lifecycle.label(), "Ignoring play start"),
    }
}

fn enter_playing(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    state.lifecycle = Lifecycle::Ready(Transport::Playing);
    state.intent = Intent::Playing;
    state.accrual.playing_since = Some(now_ms);
    let position_ms = state.timings.position_flush_ms;
    let listening_ms = state.timings.listening_flush_ms;
    start_timer(state, fx, TimerKind::PositionFlush, position_ms, true);
    start_timer(state, fx, TimerKind::ListeningFlush, listening_ms, true);
    debug!(position = state.position, "Playback started");
}

/// Stop accrual and timers. The caller picks the next lifecycle.
fn leave_playing(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    if state.is_playing() {
        state.accrual.fold(now_ms);
    }
    cancel_timer(state, fx, TimerKind::PositionFlush);
    cancel_timer(state, fx, TimerKind::ListeningFlush);
}

fn on_paused(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    if !state.is_playing() {
        debug!(lifecycle = state.lifecycle.label(), "Ignoring pause outside playback");
        return;
    }
    leave_playing(state, fx, now_ms);
    state.lifecycle = Lifecycle::Ready(Transport::Paused);
    state.intent = Intent::Paused;
    flush(state, fx, FlushReason::Pause, now_ms);
    flush_listening(state, fx, now_ms, false);
}

fn on_ended(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    if !matches!(state.lifecycle, Lifecycle::Ready(_) | Lifecycle::Seeking { .. }) {
        debug!(lifecycle = state.lifecycle.label(), "Ignoring ended");
        return;
    }
    leave_playing(state, fx, now_ms);
    state.start_pending = false;
    state.position = state.duration.unwrap_or(state.position);
    flush_listening(state, fx, now_ms, false);

    let next = state.unit_index + 1;
    if next < state.units.len() {
        let unit_id = state.progress_unit_id(next);
        write_progress(state, fx, unit_id, 0.0, FlushReason::Ended, now_ms);
        info!(from = state.unit_index, to = next, "Unit ended; advancing");
        state.intent = Intent::Playing;
        state.position = 0.0;
        state.pending_seek = None;
        load_unit(state, fx, next);
        state.remember_resume_point();
    } else {
        flush(state, fx, FlushReason::Ended, now_ms);
        info!(unit_index = state.unit_index, "Resource finished");
        state.lifecycle = Lifecycle::Ready(Transport::Paused);
        state.intent = Intent::Paused;
        state.remember_resume_point();
    }
}

fn on_time_update(state: &mut PlaybackState, position: f64) {
    if !matches!(state.lifecycle, Lifecycle::Ready(_)) {
        return;
    }
    let position = state.clamp_position(position);
    if position != state.position {
        state.position = position;
        state.dirty = true;
        state.remember_resume_point();
    }
}

fn seek_to(state: &mut PlaybackState, fx: &mut Effects, target: f64, now_ms: u64) {
    if !target.is_finite() {
        return;
    }
    match state.lifecycle {
        Lifecycle::Loading { .. } => {
            debug!(target, "Deferring seek until media is ready");
            state.pending_seek = Some(target.max(0.0));
        }
        Lifecycle::Ready(transport) => {
            let resume = transport == Transport::Playing;
            leave_playing(state, fx, now_ms);
            state.lifecycle = Lifecycle::Seeking { resume };
            apply_seek(state, fx, target);
        }
        Lifecycle::Seeking { .. } => apply_seek(state, fx, target),
        Lifecycle::Idle | Lifecycle::Error => {
            debug!(target, lifecycle = state.lifecycle.label(), "Ignoring seek");
        }
    }
}

fn apply_seek(state: &mut PlaybackState, fx: &mut Effects, target: f64) {
    let position = state.clamp_position(target);
    state.position = position;
    state.dirty = true;
    state.remember_resume_point();
    fx.push(PlaybackEffect::SeekMedia { position });
}

fn on_seeked(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    let Lifecycle::Seeking { resume } = state.lifecycle else {
        debug!(lifecycle = state.lifecycle.label(), "Ignoring seeked");
        return;
    };
    state.lifecycle = Lifecycle::Ready(Transport::Paused);
    if state.intent == Intent::Playing {
        if resume {
            enter_playing(state, fx, now_ms);
        } else {
            request_start(state, fx);
        }
    }
}

fn retry(state: &mut PlaybackState, fx: &mut Effects) {
    if state.lifecycle != Lifecycle::Error {
        debug!(lifecycle = state.lifecycle.label(), "Nothing to retry");
        return;
    }
    state.last_error = None;
    fx.push(PlaybackEffect::ClearError);
    let recovered_duration = state
        .duration
        .filter(|_| state.media_loaded && !state.progress_pending);
    if let Some(duration) = recovered_duration {
        state.lifecycle = Lifecycle::Ready(Transport::Paused);
        info!("Recovered from playback error");
        if let Some(seek) = state.pending_seek.take().filter(|seek| *seek < duration) {
            state.position = seek;
            state.remember_resume_point();
            fx.push(PlaybackEffect::SeekMedia { position: seek });
        }
        if state.intent == Intent::Playing {
            request_start(state, fx);
        }
    } else if !state.units.is_empty() {
        info!(unit_index = state.unit_index, "Reloading media after error");
        if state.pending_seek.is_none() && state.position > 0.0 {
            state.pending_seek = Some(state.position);
        }
        state.lifecycle = Lifecycle::Loading {
            awaiting_progress: state.progress_pending,
            duration: None,
        };
        let unit_index = state.unit_index;
        load_unit(state, fx, unit_index);
        if state.progress_pending {
            let timeout = state.timings.progress_load_timeout_ms;
            start_timer(state, fx, TimerKind::ProgressLoadTimeout, timeout, false);
        }
    } else {
        state.lifecycle = Lifecycle::Idle;
    }
}

fn fail(state: &mut PlaybackState, fx: &mut Effects, err: PlaybackError, now_ms: u64) {
    if matches!(state.lifecycle, Lifecycle::Idle | Lifecycle::Error) {
        debug!(lifecycle = state.lifecycle.label(), "Ignoring playback failure: {err}");
        return;
    }
    let was_playing = state.is_playing();
    leave_playing(state, fx, now_ms);
    cancel_timer(state, fx, TimerKind::ProgressLoadTimeout);
    if was_playing {
        flush(state, fx, FlushReason::Pause, now_ms);
        flush_listening(state, fx, now_ms, false);
    }
    warn!(lifecycle = state.lifecycle.label(), "Playback error: {err}");
    state.lifecycle = Lifecycle::Error;
    state.intent = Intent::Paused;
    state.start_pending = false;
    state.last_error = Some(err.to_string());
    fx.push(PlaybackEffect::SurfaceError(err));
}

fn on_timer(state: &mut PlaybackState, fx: &mut Effects, kind: TimerKind, now_ms: u64) {
    if !state.active_timers.contains(&kind) {
        debug!(timer = kind.name(), "Ignoring stale timer");
        return;
    }
    match kind {
        TimerKind::PositionFlush => {
            flush(state, fx, FlushReason::Periodic, now_ms);
        }
        TimerKind::ListeningFlush => {
            state.accrual.fold(now_ms);
            state.accrual.playing_since = Some(now_ms);
            flush_listening(state, fx, now_ms, false);
        }
        TimerKind::ProgressLoadTimeout => {
            state.active_timers.remove(&kind);
            if matches!(
                state.lifecycle,
                Lifecycle::Loading {
                    awaiting_progress: true,
                    ..
                }
            ) {
                warn!(resource_id = ?state.resource_id, "Saved progress did not arrive in time; starting from zero");
                resolve_progress(state, fx, None);
            }
        }
    }
}

/// Issue a progress write for the current unit if the suppression rules
/// allow it.
fn flush(state: &mut PlaybackState, fx: &mut Effects, reason: FlushReason, now_ms: u64) -> bool {
    if state.resource_id.is_none() || state.units.is_empty() {
        return false;
    }
    let position = state.position;
    if reason.is_final() {
        if !state.media_loaded {
            debug!(?reason, "Skipping final progress flush before any media loaded");
            return false;
        }
    } else {
        if !state.dirty {
            return false;
        }
        if position <= 0.0 {
            debug!(?reason, "Skipping progress flush at zero position");
            return false;
        }
        match state.duration {
            Some(duration) if duration - position < state.timings.end_epsilon_secs => {
                debug!(?reason, position, duration, "Skipping progress flush near end of unit");
                return false;
            }
            None => return false,
            Some(_) => {}
        }
    }
    let unit_id = state.progress_unit_id(state.unit_index);
    write_progress(state, fx, unit_id, position, reason, now_ms);
    true
}

fn write_progress(
    state: &mut PlaybackState,
    fx: &mut Effects,
    unit_id: Option<String>,
    position_seconds: f64,
    reason: FlushReason,
    now_ms: u64,
) {
    let Some(resource_id) = state.resource_id.clone() else {
        return;
    };
    let seq = state.writes.next_seq(now_ms);
    state.writes.latest_issued = Some(seq);
    state.dirty = false;
    debug!(seq, %resource_id, ?unit_id, position_seconds, ?reason, "Flushing progress");
    fx.push(PlaybackEffect::SaveProgress(ProgressWrite {
        seq,
        resource_id,
        unit_id,
        position_seconds,
        reason,
    }));
}

/// Send accrued listening time if it exceeds the minimum. A final flush
/// always resets the accumulator afterwards.
fn flush_listening(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64, is_final: bool) {
    let in_flight_ms = state.accrual.in_flight.map(|(_, ms)| ms).unwrap_or(0);
    let pending_ms = state.accrual.accumulated_ms.saturating_sub(in_flight_ms);
    let blocked = !is_final && state.accrual.in_flight.is_some();
    match state.language_id {
        Some(language_id) if !blocked && pending_ms > state.timings.min_listening_ms => {
            let seconds = pending_ms / 1000;
            state.listening_seq = now_ms.max(state.listening_seq + 1);
            let seq = state.listening_seq;
            state.accrual.in_flight = Some((seq, seconds * 1000));
            debug!(seq, language_id, seconds, is_final, "Logging listening time");
            fx.push(PlaybackEffect::LogListening(ListeningWrite {
                seq,
                language_id,
                seconds,
            }));
        }
        _ => {}
    }
    if is_final {
        state.accrual.reset();
    }
}

fn on_progress_saved(state: &mut PlaybackState, seq: u64, result: Result<(), PersistenceError>) {
    match result {
        Ok(()) => {
            if state.writes.confirmed_seq.is_some_and(|confirmed| confirmed >= seq) {
                debug!(seq, confirmed = ?state.writes.confirmed_seq, "Ignoring stale progress acknowledgement");
                return;
            }
            state.writes.confirmed_seq = Some(seq);
            debug!(seq, "Progress write confirmed");
        }
        Err(err) => {
            if state.writes.latest_issued == Some(seq) {
                warn!(seq, "Progress write failed; retrying at next flush: {err}");
                state.dirty = true;
            } else {
                debug!(
                    seq,
                    latest = ?state.writes.latest_issued,
                    "Ignoring failure of superseded progress write: {err}"
                );
            }
        }
    }
}

fn on_listening_logged(state: &mut PlaybackState, seq: u64, result: Result<(), PersistenceError>) {
    let Some((in_flight_seq, ms)) = state.accrual.in_flight else {
        debug!(seq, "Ignoring stale listening acknowledgement");
        return;
    };
    if in_flight_seq != seq {
        debug!(seq, current = in_flight_seq, "Ignoring stale listening acknowledgement");
        return;
    }
    state.accrual.in_flight = None;
    match result {
        Ok(()) => {
            state.accrual.accumulated_ms = state.accrual.accumulated_ms.saturating_sub(ms);
            debug!(seq, flushed_ms = ms, "Listening time logged");
        }
        Err(err) => warn!(seq, "Listening log failed; keeping accrued time: {err}"),
    }
}

fn set_rate(state: &mut PlaybackState, fx: &mut Effects, rate: f64) {
    let rate = normalize_rate(rate);
    if (rate - state.rate).abs() < 1e-9 {
        return;
    }
    state.rate = rate;
    info!(rate, "Playback rate changed");
    if state.source_loaded {
        fx.push(PlaybackEffect::ApplyRate { rate });
    }
    fx.push(PlaybackEffect::PersistRate { rate });
}

fn select_unit(state: &mut PlaybackState, fx: &mut Effects, index: usize, now_ms: u64) {
    if state.resource_id.is_none() || matches!(state.lifecycle, Lifecycle::Idle) {
        debug!(index, "Ignoring unit change without a resource");
        return;
    }
    if index >= state.units.len() {
        debug!(index, units = state.units.len(), "Ignoring unit change out of range");
        return;
    }
    if index == state.unit_index && state.source_loaded {
        return;
    }
    leave_playing(state, fx, now_ms);
    cancel_timer(state, fx, TimerKind::ProgressLoadTimeout);
    if state.lifecycle == Lifecycle::Error {
        state.last_error = None;
        fx.push(PlaybackEffect::ClearError);
    }
    state.start_pending = false;
    state.position = 0.0;
    state.pending_seek = None;
    state.dirty = true;
    state.lifecycle = Lifecycle::Loading {
        awaiting_progress: false,
        duration: None,
    };
    load_unit(state, fx, index);
    state.remember_resume_point();
}

fn set_volume(state: &mut PlaybackState, fx: &mut Effects, volume: f64) {
    if !volume.is_finite() {
        return;
    }
    state.volume = volume.clamp(0.0, 1.0);
    state.muted = state.volume <= 0.0;
    fx.push(PlaybackEffect::ApplyVolume {
        volume: state.volume,
        muted: state.muted,
    });
}

fn toggle_mute(state: &mut PlaybackState, fx: &mut Effects) {
    if state.muted {
        state.muted = false;
        state.volume = if state.volume_before_mute > 0.0 {
            state.volume_before_mute
        } else {
            1.0
        };
    } else {
        if state.volume > 0.0 {
            state.volume_before_mute = state.volume;
        }
        state.muted = true;
        state.volume = 0.0;
    }
    fx.push(PlaybackEffect::ApplyVolume {
        volume: state.volume,
        muted: state.muted,
    });
}

fn on_teardown(state: &mut PlaybackState, fx: &mut Effects, now_ms: u64) {
    if state.resource_id.is_some() {
        leave_resource(state, fx, FlushReason::Teardown, now_ms);
        info!(resource_id = ?state.resource_id, "Playback torn down");
    }
    for kind in state.active_timers.iter().copied().collect::<Vec<_>>() {
        cancel_timer(state, fx, kind);
    }
    state.resource_id = None;
    state.lifecycle = Lifecycle::Idle;
    state.intent = Intent::Paused;
    state.start_pending = false;
    state.progress_pending = false;
}

/// Best-effort final flushes for the resource being left.
fn leave_resource(state: &mut PlaybackState, fx: &mut Effects, reason: FlushReason, now_ms: u64) {
    leave_playing(state, fx, now_ms);
    cancel_timer(state, fx, TimerKind::ProgressLoadTimeout);
    if matches!(state.lifecycle, Lifecycle::Loading { .. }) {
        if let Some(seek) = state.pending_seek {
            state.position = seek;
        }
    }
    if !matches!(state.lifecycle, Lifecycle::Idle) {
        flush(state, fx, reason, now_ms);
        state.remember_resume_point();
    }
    flush_listening(state, fx, now_ms, true);
}

fn start_timer(
    state: &mut PlaybackState,
    fx: &mut Effects,
    kind: TimerKind,
    period_ms: u64,
    repeating: bool,
) {
    if state.active_timers.insert(kind) {
        fx.push(PlaybackEffect::StartTimer {
            kind,
            period_ms,
            repeating,
        });
    }
}

fn cancel_timer(state: &mut PlaybackState, fx: &mut Effects, kind: TimerKind) {
    if state.active_timers.remove(&kind) {
        fx.push(PlaybackEffect::CancelTimer { kind });
    }
}
