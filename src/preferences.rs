//! Process-wide user preferences with an explicit init/read/write contract.

use crate::error::PersistenceError;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const MIN_PLAYBACK_RATE: f64 = 0.5;
pub const MAX_PLAYBACK_RATE: f64 = 2.0;
pub const PLAYBACK_RATE_KEY: &str = "audioPlaybackRate";

/// Key-value store for preferences that outlive a single resource.
pub trait PreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

impl<S: PreferenceStore + ?Sized> PreferenceStore for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        (**self).write(key, value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, String>,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Round to two decimals and clamp into the supported rate range.
pub fn normalize_rate(rate: f64) -> f64 {
    if !rate.is_finite() {
        return 1.0;
    }
    ((rate * 100.0).round() / 100.0).clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

/// Playback preferences backed by a `PreferenceStore`.
#[derive(Debug)]
pub struct PlaybackPreferences<S> {
    store: S,
    rate: f64,
}

impl<S: PreferenceStore> PlaybackPreferences<S> {
    /// Read the stored rate, falling back to `default_rate` when it is
    /// missing or unreadable.
    pub fn init(store: S, default_rate: f64) -> Self {
        let stored = match store.read(PLAYBACK_RATE_KEY) {
            Ok(value) => value.and_then(|raw| raw.trim().parse::<f64>().ok()),
            Err(err) => {
                warn!("Failed to read playback rate preference: {err}");
                None
            }
        };
        let rate = normalize_rate(stored.unwrap_or(default_rate));
        debug!(rate, "Initialized playback preferences");
        Self { store, rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Store a new rate. Returns the normalized value that was applied.
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        self.rate = normalize_rate(rate);
        if let Err(err) = self
            .store
            .write(PLAYBACK_RATE_KEY, &format!("{:.2}", self.rate))
        {
            warn!(rate = self.rate, "Failed to persist playback rate: {err}");
        }
        self.rate
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
