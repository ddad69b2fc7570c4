pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_position_flush_interval_secs() -> f32 {
    15.0
}

pub(crate) fn default_end_of_unit_epsilon_secs() -> f32 {
    0.5
}

pub(crate) fn default_listening_flush_interval_secs() -> f32 {
    60.0
}

pub(crate) fn default_min_listening_secs() -> f32 {
    5.0
}

pub(crate) fn default_progress_load_timeout_secs() -> f32 {
    5.0
}

pub(crate) fn default_seek_step_secs() -> f32 {
    30.0
}

pub(crate) fn default_playback_rate_step() -> f32 {
    0.05
}

pub(crate) fn default_playback_rate() -> f32 {
    1.0
}

pub(crate) fn default_word_extra_chars() -> String {
    "'".to_string()
}

pub(crate) fn default_sentence_terminators() -> String {
    ".!?".to_string()
}
