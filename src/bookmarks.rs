//! Sentence bookmarks per resource.

use crate::error::PersistenceError;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// The key-value collaborator that persists bookmarks.
pub trait BookmarkBackend {
    fn get(&self, resource_id: &str) -> Result<Vec<usize>, PersistenceError>;
    fn toggle(&mut self, resource_id: &str, sentence_index: usize) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryBookmarkBackend {
    sets: HashMap<String, BTreeSet<usize>>,
}

impl BookmarkBackend for MemoryBookmarkBackend {
    fn get(&self, resource_id: &str) -> Result<Vec<usize>, PersistenceError> {
        Ok(self
            .sets
            .get(resource_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn toggle(&mut self, resource_id: &str, sentence_index: usize) -> Result<(), PersistenceError> {
        flip(self.sets.entry(resource_id.to_string()).or_default(), sentence_index);
        Ok(())
    }
}

/// Returns the new membership.
pub(crate) fn flip(set: &mut BTreeSet<usize>, sentence_index: usize) -> bool {
    if set.remove(&sentence_index) {
        false
    } else {
        set.insert(sentence_index);
        true
    }
}

/// In-memory bookmark sets, loaded lazily from the backend. Toggles apply
/// in memory even when the backend write fails. A set whose load failed is
/// reloaded on the next access and replaced by what the backend holds.
#[derive(Debug)]
pub struct BookmarkStore<B> {
    backend: B,
    sets: HashMap<String, BTreeSet<usize>>,
    synced: HashSet<String>,
}

impl<B: BookmarkBackend> BookmarkStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sets: HashMap::new(),
            synced: HashSet::new(),
        }
    }

    fn loaded(&mut self, resource_id: &str) -> &mut BTreeSet<usize> {
        if !self.synced.contains(resource_id) {
            match self.backend.get(resource_id) {
                Ok(indices) => {
                    let stored: BTreeSet<usize> = indices.into_iter().collect();
                    debug!(resource_id, count = stored.len(), "Loaded bookmarks");
                    self.sets.insert(resource_id.to_string(), stored);
                    self.synced.insert(resource_id.to_string());
                }
                Err(err) => warn!(resource_id, "Failed to load bookmarks: {err}"),
            }
        }
        self.sets.entry(resource_id.to_string()).or_default()
    }

    /// Flip membership of a sentence. Returns whether it is now bookmarked.
    pub fn toggle(&mut self, resource_id: &str, sentence_index: usize) -> bool {
        let now_bookmarked = flip(self.loaded(resource_id), sentence_index);
        if let Err(err) = self.backend.toggle(resource_id, sentence_index) {
            warn!(resource_id, sentence_index, "Failed to persist bookmark toggle: {err}");
        }
        debug!(resource_id, sentence_index, now_bookmarked, "Toggled bookmark");
        now_bookmarked
    }

    /// Pure query against the sets already loaded.
    pub fn is_bookmarked(&self, resource_id: &str, sentence_index: usize) -> bool {
        self.sets
            .get(resource_id)
            .is_some_and(|set| set.contains(&sentence_index))
    }

    /// Ensure a resource's bookmarks are loaded and return them in order.
    pub fn bookmarks(&mut self, resource_id: &str) -> Vec<usize> {
        self.loaded(resource_id).iter().copied().collect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
