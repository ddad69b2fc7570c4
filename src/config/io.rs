use super::models::AppConfig;
use super::tables::ConfigTables;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load configuration from disk, falling back to defaults when the file is
/// missing or invalid.
pub fn load_config(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded base config");
            data
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                "Falling back to default config: {err}"
            );
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(cfg) => {
            debug!("Parsed configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err:#}");
            AppConfig::default()
        }
    }
}

/// Parse the table-structured TOML layout.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let tables: ConfigTables =
        toml::from_str(contents).context("failed to parse configuration tables")?;
    Ok(tables.into())
}

pub fn serialize_config(config: &AppConfig) -> Result<String> {
    toml::to_string_pretty(&ConfigTables::from(config)).context("failed to serialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn missing_tables_use_defaults() {
        let config = parse_config("[playback]\nseek_step_secs = 10.0\n").unwrap();
        assert_eq!(config.seek_step_secs, 10.0);
        assert_eq!(config.position_flush_interval_secs, 15.0);
        assert_eq!(config.sentence_terminators, ".!?");
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn serialized_config_parses_back() {
        let mut config = AppConfig::default();
        config.sentence_exceptions = vec!["Dr.".to_string(), "Mr.".to_string()];
        config.word_characters = Some("a-zA-Zäöü".to_string());
        config.log_level = LogLevel::Debug;
        let text = serialize_config(&config).unwrap();
        let parsed = parse_config(&text).unwrap();
        assert_eq!(parsed.sentence_exceptions, config.sentence_exceptions);
        assert_eq!(parsed.word_characters, config.word_characters);
        assert_eq!(parsed.log_level, LogLevel::Debug);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!(
            "linguaread-config-{}.toml",
            std::process::id()
        ));
        fs::write(&path, "[playback\nbroken").unwrap();
        let config = load_config(&path);
        assert_eq!(config.cache_dir, ".cache");
        let _ = fs::remove_file(&path);
    }
}
