use serde::Deserialize;

/// High-level core configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "crate::config::defaults::default_position_flush_interval_secs")]
    pub position_flush_interval_secs: f32,
    #[serde(default = "crate::config::defaults::default_end_of_unit_epsilon_secs")]
    pub end_of_unit_epsilon_secs: f32,
    #[serde(default = "crate::config::defaults::default_listening_flush_interval_secs")]
    pub listening_flush_interval_secs: f32,
    #[serde(default = "crate::config::defaults::default_min_listening_secs")]
    pub min_listening_secs: f32,
    #[serde(default = "crate::config::defaults::default_progress_load_timeout_secs")]
    pub progress_load_timeout_secs: f32,
    #[serde(default = "crate::config::defaults::default_seek_step_secs")]
    pub seek_step_secs: f32,
    #[serde(default = "crate::config::defaults::default_playback_rate_step")]
    pub playback_rate_step: f32,
    #[serde(default = "crate::config::defaults::default_playback_rate")]
    pub default_playback_rate: f32,
    /// Regex character class body (for example `a-zA-Z`). Letters when unset.
    #[serde(default)]
    pub word_characters: Option<String>,
    #[serde(default = "crate::config::defaults::default_word_extra_chars")]
    pub word_extra_chars: String,
    #[serde(default = "crate::config::defaults::default_sentence_terminators")]
    pub sentence_terminators: String,
    /// Matched case-sensitively against the tokens ending at a terminator.
    #[serde(default)]
    pub sentence_exceptions: Vec<String>,
    /// Pipe-separated `old=new` pairs applied to lookup keys.
    #[serde(default)]
    pub character_substitutions: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            cache_dir: crate::config::defaults::default_cache_dir(),
            position_flush_interval_secs:
                crate::config::defaults::default_position_flush_interval_secs(),
            end_of_unit_epsilon_secs: crate::config::defaults::default_end_of_unit_epsilon_secs(),
            listening_flush_interval_secs:
                crate::config::defaults::default_listening_flush_interval_secs(),
            min_listening_secs: crate::config::defaults::default_min_listening_secs(),
            progress_load_timeout_secs:
                crate::config::defaults::default_progress_load_timeout_secs(),
            seek_step_secs: crate::config::defaults::default_seek_step_secs(),
            playback_rate_step: crate::config::defaults::default_playback_rate_step(),
            default_playback_rate: crate::config::defaults::default_playback_rate(),
            word_characters: None,
            word_extra_chars: crate::config::defaults::default_word_extra_chars(),
            sentence_terminators: crate::config::defaults::default_sentence_terminators(),
            sentence_exceptions: Vec::new(),
            character_substitutions: String::new(),
        }
    }
}

impl AppConfig {
    /// Timer periods and thresholds for the playback controller, clamped to
    /// ranges the controller can work with.
    pub fn playback_timings(&self) -> PlaybackTimings {
        PlaybackTimings {
            position_flush_ms: secs_to_ms(self.position_flush_interval_secs, 1.0, 3600.0),
            listening_flush_ms: secs_to_ms(self.listening_flush_interval_secs, 1.0, 3600.0),
            min_listening_ms: secs_to_ms(self.min_listening_secs, 0.0, 600.0),
            progress_load_timeout_ms: secs_to_ms(self.progress_load_timeout_secs, 0.5, 60.0),
            end_epsilon_secs: clamp_finite(self.end_of_unit_epsilon_secs, 0.0, 5.0, 0.5),
            seek_step_secs: clamp_finite(self.seek_step_secs, 1.0, 600.0, 30.0),
            rate_step: clamp_finite(self.playback_rate_step, 0.01, 0.5, 0.05),
            default_rate: clamp_finite(
                self.default_playback_rate,
                crate::preferences::MIN_PLAYBACK_RATE,
                crate::preferences::MAX_PLAYBACK_RATE,
                1.0,
            ),
        }
    }
}

/// Millisecond timer periods and second-based thresholds used by playback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackTimings {
    pub position_flush_ms: u64,
    pub listening_flush_ms: u64,
    pub min_listening_ms: u64,
    pub progress_load_timeout_ms: u64,
    pub end_epsilon_secs: f64,
    pub seek_step_secs: f64,
    pub rate_step: f64,
    pub default_rate: f64,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        AppConfig::default().playback_timings()
    }
}

fn clamp_finite(value: f32, min: f64, max: f64, fallback: f64) -> f64 {
    let value = f64::from(value);
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn secs_to_ms(value: f32, min: f64, max: f64) -> u64 {
    (clamp_finite(value, min, max, min) * 1000.0).round() as u64
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;

    #[test]
    fn default_timings_match_reference_periods() {
        let timings = AppConfig::default().playback_timings();
        assert_eq!(timings.position_flush_ms, 15_000);
        assert_eq!(timings.listening_flush_ms, 60_000);
        assert_eq!(timings.min_listening_ms, 5_000);
        assert_eq!(timings.progress_load_timeout_ms, 5_000);
        assert_eq!(timings.seek_step_secs, 30.0);
    }

    #[test]
    fn out_of_range_timings_are_clamped() {
        let config = AppConfig {
            position_flush_interval_secs: 0.0,
            end_of_unit_epsilon_secs: f32::NAN,
            default_playback_rate: 9.0,
            ..AppConfig::default()
        };
        let timings = config.playback_timings();
        assert_eq!(timings.position_flush_ms, 1_000);
        assert_eq!(timings.end_epsilon_secs, 0.5);
        assert_eq!(timings.default_rate, 2.0);
    }
}
