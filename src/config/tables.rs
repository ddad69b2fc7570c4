use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    language: LanguageConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            cache_dir: tables.storage.cache_dir,
            position_flush_interval_secs: tables.playback.position_flush_interval_secs,
            end_of_unit_epsilon_secs: tables.playback.end_of_unit_epsilon_secs,
            listening_flush_interval_secs: tables.playback.listening_flush_interval_secs,
            min_listening_secs: tables.playback.min_listening_secs,
            progress_load_timeout_secs: tables.playback.progress_load_timeout_secs,
            seek_step_secs: tables.playback.seek_step_secs,
            playback_rate_step: tables.playback.playback_rate_step,
            default_playback_rate: tables.playback.default_playback_rate,
            word_characters: tables.language.word_characters,
            word_extra_chars: tables.language.word_extra_chars,
            sentence_terminators: tables.language.sentence_terminators,
            sentence_exceptions: tables.language.sentence_exceptions,
            character_substitutions: tables.language.character_substitutions,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            storage: StorageConfig {
                cache_dir: config.cache_dir.clone(),
            },
            playback: PlaybackConfig {
                position_flush_interval_secs: config.position_flush_interval_secs,
                end_of_unit_epsilon_secs: config.end_of_unit_epsilon_secs,
                listening_flush_interval_secs: config.listening_flush_interval_secs,
                min_listening_secs: config.min_listening_secs,
                progress_load_timeout_secs: config.progress_load_timeout_secs,
                seek_step_secs: config.seek_step_secs,
                playback_rate_step: config.playback_rate_step,
                default_playback_rate: config.default_playback_rate,
            },
            language: LanguageConfig {
                word_characters: config.word_characters.clone(),
                word_extra_chars: config.word_extra_chars.clone(),
                sentence_terminators: config.sentence_terminators.clone(),
                sentence_exceptions: config.sentence_exceptions.clone(),
                character_substitutions: config.character_substitutions.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cache_dir: defaults::default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_position_flush_interval_secs")]
    position_flush_interval_secs: f32,
    #[serde(default = "defaults::default_end_of_unit_epsilon_secs")]
    end_of_unit_epsilon_secs: f32,
    #[serde(default = "defaults::default_listening_flush_interval_secs")]
    listening_flush_interval_secs: f32,
    #[serde(default = "defaults::default_min_listening_secs")]
    min_listening_secs: f32,
    #[serde(default = "defaults::default_progress_load_timeout_secs")]
    progress_load_timeout_secs: f32,
    #[serde(default = "defaults::default_seek_step_secs")]
    seek_step_secs: f32,
    #[serde(default = "defaults::default_playback_rate_step")]
    playback_rate_step: f32,
    #[serde(default = "defaults::default_playback_rate")]
    default_playback_rate: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            position_flush_interval_secs: defaults::default_position_flush_interval_secs(),
            end_of_unit_epsilon_secs: defaults::default_end_of_unit_epsilon_secs(),
            listening_flush_interval_secs: defaults::default_listening_flush_interval_secs(),
            min_listening_secs: defaults::default_min_listening_secs(),
            progress_load_timeout_secs: defaults::default_progress_load_timeout_secs(),
            seek_step_secs: defaults::default_seek_step_secs(),
            playback_rate_step: defaults::default_playback_rate_step(),
            default_playback_rate: defaults::default_playback_rate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LanguageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    word_characters: Option<String>,
    #[serde(default = "defaults::default_word_extra_chars")]
    word_extra_chars: String,
    #[serde(default = "defaults::default_sentence_terminators")]
    sentence_terminators: String,
    #[serde(default)]
    sentence_exceptions: Vec<String>,
    #[serde(default)]
    character_substitutions: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        LanguageConfig {
            word_characters: None,
            word_extra_chars: defaults::default_word_extra_chars(),
            sentence_terminators: defaults::default_sentence_terminators(),
            sentence_exceptions: Vec::new(),
            character_substitutions: String::new(),
        }
    }
}
