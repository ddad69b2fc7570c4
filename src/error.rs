use std::path::PathBuf;
use thiserror::Error;

/// A malformed subtitle entry. Recovered locally: the entry is dropped and
/// logged, parsing continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("subtitle entry {entry}: {reason}")]
pub struct ParseIssue {
    /// 1-based position of the entry within the file.
    pub entry: usize,
    pub reason: String,
}

/// Reads and writes against progress, bookmark, analytics or preference
/// collaborators.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read {what}: {message}")]
    Read { what: &'static str, message: String },

    #[error("Failed to write {what}: {message}")]
    Write { what: &'static str, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode stored data: {0}")]
    Encode(String),

    #[error("Failed to decode stored data: {0}")]
    Decode(String),

    #[error("Persistence collaborator unavailable")]
    Unavailable,
}

impl PersistenceError {
    pub fn read(what: &'static str, message: impl Into<String>) -> Self {
        PersistenceError::Read {
            what,
            message: message.into(),
        }
    }

    pub fn write(what: &'static str, message: impl Into<String>) -> Self {
        PersistenceError::Write {
            what,
            message: message.into(),
        }
    }
}

/// The media engine refused an operation the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("Playback was rejected: {0}")]
    Rejected(String),

    #[error("Media failed to load: {0}")]
    MediaFailed(String),
}

/// Non-fatal setup problems that render an informational empty state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Resource has no playable units")]
    NoPlayableUnits,

    #[error("Vocabulary for language {language_id} is empty")]
    EmptyVocabulary { language_id: u64 },

    #[error("Invalid word character class `{pattern}`: {reason}")]
    InvalidWordCharacters { pattern: String, reason: String },

    #[error("Term status {0} is outside 1..=5")]
    InvalidStatus(u8),
}

/// Failures of vocabulary store operations started by the reader.
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_part() {
        let err = PersistenceError::write("progress", "timeout");
        assert_eq!(err.to_string(), "Failed to write progress: timeout");
        let issue = ParseIssue {
            entry: 3,
            reason: "bad time range".to_string(),
        };
        assert_eq!(issue.to_string(), "subtitle entry 3: bad time range");
    }
}
