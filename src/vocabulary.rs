//! Vocabulary terms, immutable lookup snapshots and the store seam.

use crate::error::{ConfigurationError, PersistenceError, VocabularyError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};
use ts_rs::TS;
use unicode_normalization::UnicodeNormalization;

static TEXT_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{L}+(?:['-]\p{L}+)*").expect("valid word regex"));

/// Learning status: 0 untracked, 1-4 learning stages, 5 known.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(transparent)]
#[ts(export)]
pub struct TermStatus(u8);

impl TermStatus {
    pub const UNTRACKED: TermStatus = TermStatus(0);
    pub const KNOWN: TermStatus = TermStatus(5);

    pub fn new(value: u8) -> Option<Self> {
        (value <= 5).then_some(TermStatus(value))
    }

    /// Statuses a user can assign: 1 through 5.
    pub fn assignable(value: u8) -> Result<Self, ConfigurationError> {
        if (1..=5).contains(&value) {
            Ok(TermStatus(value))
        } else {
            Err(ConfigurationError::InvalidStatus(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_tracked(self) -> bool {
        self.0 > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VocabularyTerm {
    #[ts(type = "number | null")]
    pub id: Option<u64>,
    pub term_key: String,
    pub display_term: String,
    pub status: TermStatus,
    pub translation: Option<String>,
    pub is_phrase: bool,
}

impl VocabularyTerm {
    pub fn new(
        id: Option<u64>,
        display_term: &str,
        status: TermStatus,
        translation: Option<String>,
        folding: &CharFolding,
    ) -> Self {
        let display_term = display_term.trim().to_string();
        VocabularyTerm {
            id,
            term_key: folding.key(&display_term),
            is_phrase: display_term.chars().any(char::is_whitespace),
            display_term,
            status,
            translation: translation.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn has_translation(&self) -> bool {
        self.translation.is_some()
    }
}

/// Character substitutions and case folding applied when deriving lookup
/// keys. Source text is never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharFolding {
    substitutions: HashMap<char, char>,
}

impl CharFolding {
    /// Parse pipe-separated `old=new` pairs. Pairs that are not a single
    /// character on each side are skipped.
    pub fn parse(table: &str) -> Self {
        let mut substitutions = HashMap::new();
        for pair in table.split('|').filter(|pair| !pair.trim().is_empty()) {
            let Some((old, new)) = pair.split_once('=') else {
                warn!(pair, "Ignoring character substitution without `=`");
                continue;
            };
            let mut old_chars = old.chars();
            let mut new_chars = new.chars();
            match (old_chars.next(), old_chars.next(), new_chars.next(), new_chars.next()) {
                (Some(from), None, Some(to), None) => {
                    substitutions.insert(from, to);
                }
                _ => warn!(pair, "Ignoring multi-character substitution"),
            }
        }
        Self { substitutions }
    }

    pub fn substitute(&self, c: char) -> char {
        self.substitutions.get(&c).copied().unwrap_or(c)
    }

    /// Lowercased, substituted form of one source character.
    pub fn fold(&self, c: char) -> impl Iterator<Item = char> {
        self.substitute(c).to_lowercase()
    }

    pub fn key(&self, text: &str) -> String {
        text.trim()
            .chars()
            .flat_map(|c| self.fold(c))
            .collect::<String>()
            .nfc()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PhraseEntry {
    pub(crate) key: Vec<char>,
    pub(crate) term: VocabularyTerm,
}

/// Read-only view of the vocabulary used for one tokenization pass.
#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    folding: CharFolding,
    words: HashMap<String, VocabularyTerm>,
    // sorted by key char length desc, then key asc
    phrases: Vec<PhraseEntry>,
    phrases_by_first: HashMap<char, Vec<usize>>,
}

impl VocabularySnapshot {
    pub fn new(terms: impl IntoIterator<Item = VocabularyTerm>, folding: CharFolding) -> Self {
        let mut words = HashMap::new();
        let mut phrases: HashMap<String, VocabularyTerm> = HashMap::new();
        for term in terms {
            if term.term_key.is_empty() {
                continue;
            }
            if term.is_phrase {
                phrases.insert(term.term_key.clone(), term);
            } else {
                words.insert(term.term_key.clone(), term);
            }
        }

        let mut phrases: Vec<PhraseEntry> = phrases
            .into_values()
            .map(|term| PhraseEntry {
                key: term.term_key.chars().collect(),
                term,
            })
            .collect();
        phrases.sort_by(|a, b| {
            b.key
                .len()
                .cmp(&a.key.len())
                .then_with(|| a.term.term_key.cmp(&b.term.term_key))
        });

        let mut phrases_by_first: HashMap<char, Vec<usize>> = HashMap::new();
        for (idx, entry) in phrases.iter().enumerate() {
            if let Some(first) = entry.key.first() {
                phrases_by_first.entry(*first).or_default().push(idx);
            }
        }

        Self {
            folding,
            words,
            phrases,
            phrases_by_first,
        }
    }

    pub fn folding(&self) -> &CharFolding {
        &self.folding
    }

    pub fn word(&self, key: &str) -> Option<&VocabularyTerm> {
        self.words.get(key)
    }

    /// Look up any term, word or phrase, by its display form.
    pub fn find(&self, display: &str) -> Option<&VocabularyTerm> {
        let key = self.folding.key(display);
        self.words.get(&key).or_else(|| {
            self.phrases
                .iter()
                .find(|entry| entry.term.term_key == key)
                .map(|entry| &entry.term)
        })
    }

    pub fn word_status(&self, key: &str) -> TermStatus {
        self.words
            .get(key)
            .map(|term| term.status)
            .unwrap_or(TermStatus::UNTRACKED)
    }

    pub(crate) fn phrases_starting_with(&self, first: char) -> impl Iterator<Item = &PhraseEntry> {
        self.phrases_by_first
            .get(&first)
            .into_iter()
            .flatten()
            .map(|idx| &self.phrases[*idx])
    }

    pub fn has_phrases(&self) -> bool {
        !self.phrases.is_empty()
    }

    pub fn len(&self) -> usize {
        self.words.len() + self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn terms(&self) -> impl Iterator<Item = &VocabularyTerm> {
        self.words
            .values()
            .chain(self.phrases.iter().map(|entry| &entry.term))
    }

    /// Copy of this snapshot with `term` inserted or replaced.
    pub fn with_term(&self, term: VocabularyTerm) -> Self {
        let key = term.term_key.clone();
        let terms = self
            .terms()
            .filter(|existing| existing.term_key != key)
            .cloned()
            .chain(std::iter::once(term))
            .collect::<Vec<_>>();
        Self::new(terms, self.folding.clone())
    }
}

/// A term submitted through `batch_add_terms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewTerm {
    pub term: String,
    pub translation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub status: Option<TermStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct BatchSummary {
    pub added: u32,
    pub updated: u32,
    pub skipped: u32,
}

/// The vocabulary collaborator. Implementations live in the host.
pub trait VocabularyStore {
    fn fetch_all_terms(&self, language_id: u64) -> Result<Vec<VocabularyTerm>, PersistenceError>;

    fn create_term(
        &self,
        container_id: u64,
        term: &str,
        status: TermStatus,
        translation: Option<&str>,
    ) -> Result<VocabularyTerm, PersistenceError>;

    fn update_term(
        &self,
        id: u64,
        status: TermStatus,
        translation: Option<&str>,
    ) -> Result<VocabularyTerm, PersistenceError>;

    fn batch_add_terms(
        &self,
        language_id: u64,
        terms: &[NewTerm],
    ) -> Result<BatchSummary, PersistenceError>;
}

/// Shared holder of the current snapshot. Readers clone the `Arc`; writers
/// swap in a complete new snapshot, so a pass never sees a partial update.
#[derive(Debug, Default)]
pub struct VocabularyCache {
    current: RwLock<Arc<VocabularySnapshot>>,
}

impl VocabularyCache {
    pub fn new(snapshot: VocabularySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<VocabularySnapshot> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, snapshot: VocabularySnapshot) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(snapshot);
    }

    pub fn patch(&self, term: VocabularyTerm) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        let next = guard.with_term(term);
        *guard = Arc::new(next);
    }

    /// Reload every term for a language. An empty vocabulary still replaces
    /// the snapshot and is reported as a configuration notice.
    pub fn refresh(
        &self,
        store: &dyn VocabularyStore,
        language_id: u64,
    ) -> Result<Arc<VocabularySnapshot>, VocabularyError> {
        let fetched = store.fetch_all_terms(language_id)?;
        let folding = self.snapshot().folding().clone();
        let terms = fetched
            .into_iter()
            .map(|term| {
                VocabularyTerm::new(term.id, &term.display_term, term.status, term.translation, &folding)
            })
            .collect::<Vec<_>>();
        let count = terms.len();
        self.replace(VocabularySnapshot::new(terms, folding));
        info!(language_id, terms = count, "Refreshed vocabulary snapshot");
        if count == 0 {
            return Err(ConfigurationError::EmptyVocabulary { language_id }.into());
        }
        Ok(self.snapshot())
    }

    /// Set a term's status, updating a tracked term or creating a new one.
    pub fn save_term(
        &self,
        store: &dyn VocabularyStore,
        container_id: u64,
        term_text: &str,
        status: u8,
        translation: Option<&str>,
    ) -> Result<VocabularyTerm, VocabularyError> {
        let status = TermStatus::assignable(status)?;
        let snapshot = self.snapshot();
        let existing = snapshot.find(term_text).and_then(|term| term.id);
        let saved = match existing {
            Some(id) => {
                debug!(id, status = status.value(), "Updating vocabulary term");
                store.update_term(id, status, translation)?
            }
            None => {
                debug!(term = term_text, status = status.value(), "Creating vocabulary term");
                store.create_term(container_id, term_text, status, translation)?
            }
        };
        let saved = VocabularyTerm::new(
            saved.id,
            &saved.display_term,
            saved.status,
            saved.translation,
            snapshot.folding(),
        );
        self.patch(saved.clone());
        Ok(saved)
    }

    /// Add every untracked word in `text` as known, then reload.
    pub fn mark_untracked_known(
        &self,
        store: &dyn VocabularyStore,
        language_id: u64,
        text: &str,
    ) -> Result<BatchSummary, VocabularyError> {
        let words = untracked_words(text, &self.snapshot());
        if words.is_empty() {
            info!(language_id, "No untracked words to mark");
            return Ok(BatchSummary::default());
        }
        let terms = words
            .into_iter()
            .map(|term| NewTerm {
                term,
                translation: None,
                status: Some(TermStatus::KNOWN),
            })
            .collect::<Vec<_>>();
        let summary = store.batch_add_terms(language_id, &terms)?;
        info!(
            language_id,
            submitted = terms.len(),
            added = summary.added,
            "Marked untracked words as known"
        );
        self.refresh_after_batch(store, language_id);
        Ok(summary)
    }

    /// Store translations fetched for `words_needing_translation`. Entries
    /// with an empty translation are skipped.
    pub fn add_translations(
        &self,
        store: &dyn VocabularyStore,
        language_id: u64,
        translations: Vec<(String, String)>,
    ) -> Result<BatchSummary, VocabularyError> {
        let terms = translations
            .into_iter()
            .filter(|(_, translation)| !translation.trim().is_empty())
            .map(|(term, translation)| NewTerm {
                term,
                translation: Some(translation),
                status: None,
            })
            .collect::<Vec<_>>();
        if terms.is_empty() {
            return Ok(BatchSummary::default());
        }
        let summary = store.batch_add_terms(language_id, &terms)?;
        self.refresh_after_batch(store, language_id);
        Ok(summary)
    }

    fn refresh_after_batch(&self, store: &dyn VocabularyStore, language_id: u64) {
        if let Err(err) = self.refresh(store, language_id) {
            warn!(language_id, "Vocabulary refresh after batch failed: {err}");
        }
    }
}

/// Distinct words of `text` in first-seen order and casing.
fn distinct_words<'a>(text: &'a str, folding: &CharFolding) -> Vec<(String, &'a str)> {
    let mut seen = HashSet::new();
    TEXT_WORD_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter_map(|word| {
            let key = folding.key(word);
            seen.insert(key.clone()).then_some((key, word))
        })
        .collect()
}

/// Words in `text` with no vocabulary entry at all.
pub fn untracked_words(text: &str, snapshot: &VocabularySnapshot) -> Vec<String> {
    distinct_words(text, snapshot.folding())
        .into_iter()
        .filter(|(key, _)| snapshot.word(key).is_none())
        .map(|(_, word)| word.to_string())
        .collect()
}

/// Words in `text` that are untracked, or still early in learning (status
/// 2 or below) without a translation.
pub fn words_needing_translation(text: &str, snapshot: &VocabularySnapshot) -> Vec<String> {
    distinct_words(text, snapshot.folding())
        .into_iter()
        .filter(|(key, _)| match snapshot.word(key) {
            None => true,
            Some(term) => term.status.value() <= 2 && !term.has_translation(),
        })
        .map(|(_, word)| word.to_string())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;

    pub(crate) fn term(display: &str, status: u8) -> VocabularyTerm {
        VocabularyTerm::new(
            None,
            display,
            TermStatus::new(status).unwrap(),
            None,
            &CharFolding::default(),
        )
    }

    pub(crate) fn snapshot(terms: &[(&str, u8)]) -> VocabularySnapshot {
        VocabularySnapshot::new(
            terms.iter().map(|(display, status)| term(display, *status)),
            CharFolding::default(),
        )
    }

    #[derive(Default)]
    struct RecordingStore {
        terms: RefCell<Vec<VocabularyTerm>>,
        calls: RefCell<Vec<String>>,
        next_id: RefCell<u64>,
    }

    impl VocabularyStore for RecordingStore {
        fn fetch_all_terms(&self, _language_id: u64) -> Result<Vec<VocabularyTerm>, PersistenceError> {
            self.calls.borrow_mut().push("fetch".into());
            Ok(self.terms.borrow().clone())
        }

        fn create_term(
            &self,
            _container_id: u64,
            term: &str,
            status: TermStatus,
            translation: Option<&str>,
        ) -> Result<VocabularyTerm, PersistenceError> {
            self.calls.borrow_mut().push(format!("create {term}"));
            *self.next_id.borrow_mut() += 1;
            let created = VocabularyTerm::new(
                Some(*self.next_id.borrow()),
                term,
                status,
                translation.map(str::to_string),
                &CharFolding::default(),
            );
            self.terms.borrow_mut().push(created.clone());
            Ok(created)
        }

        fn update_term(
            &self,
            id: u64,
            status: TermStatus,
            translation: Option<&str>,
        ) -> Result<VocabularyTerm, PersistenceError> {
            self.calls.borrow_mut().push(format!("update {id}"));
            let mut terms = self.terms.borrow_mut();
            let found = terms
                .iter_mut()
                .find(|t| t.id == Some(id))
                .ok_or(PersistenceError::Unavailable)?;
            found.status = status;
            found.translation = translation.map(str::to_string);
            Ok(found.clone())
        }

        fn batch_add_terms(
            &self,
            _language_id: u64,
            terms: &[NewTerm],
        ) -> Result<BatchSummary, PersistenceError> {
            self.calls.borrow_mut().push(format!("batch {}", terms.len()));
            for new in terms {
                let status = new.status.unwrap_or(TermStatus::KNOWN);
                self.terms.borrow_mut().push(VocabularyTerm::new(
                    None,
                    &new.term,
                    status,
                    new.translation.clone(),
                    &CharFolding::default(),
                ));
            }
            Ok(BatchSummary {
                added: terms.len() as u32,
                ..BatchSummary::default()
            })
        }
    }

    #[test]
    fn keys_are_folded_and_phrases_detected() {
        let folding = CharFolding::parse("’='");
        let t = VocabularyTerm::new(None, "  Don’t Stop ", TermStatus::KNOWN, None, &folding);
        assert_eq!(t.term_key, "don't stop");
        assert_eq!(t.display_term, "Don’t Stop");
        assert!(t.is_phrase);
    }

    #[test]
    fn phrases_sorted_longest_then_lexical() {
        let snap = snapshot(&[("new york", 1), ("new jersey", 2), ("new york city", 3), ("new yorx", 1)]);
        let order: Vec<&str> = snap
            .phrases_starting_with('n')
            .map(|entry| entry.term.term_key.as_str())
            .collect();
        assert_eq!(order, vec!["new york city", "new jersey", "new york", "new yorx"]);
    }

    #[test]
    fn status_outside_assignable_range_is_rejected() {
        let cache = VocabularyCache::default();
        let store = RecordingStore::default();
        let err = cache.save_term(&store, 1, "hola", 0, None).unwrap_err();
        assert!(matches!(
            err,
            VocabularyError::Configuration(ConfigurationError::InvalidStatus(0))
        ));
        assert!(store.calls.borrow().is_empty());
    }

    #[test]
    fn save_term_creates_then_updates() {
        let cache = VocabularyCache::default();
        let store = RecordingStore::default();
        let created = cache.save_term(&store, 7, "Hola", 2, None).unwrap();
        assert_eq!(created.status.value(), 2);
        assert_eq!(cache.snapshot().word_status("hola").value(), 2);

        cache.save_term(&store, 7, "hola", 4, Some("hello")).unwrap();
        assert_eq!(*store.calls.borrow(), vec!["create Hola", "update 1"]);
        let snap = cache.snapshot();
        assert_eq!(snap.word_status("hola").value(), 4);
        assert_eq!(snap.word("hola").and_then(|t| t.translation.as_deref()), Some("hello"));
    }

    #[test]
    fn readers_keep_their_snapshot_across_patch() {
        let cache = VocabularyCache::new(snapshot(&[("uno", 1)]));
        let before = cache.snapshot();
        cache.patch(term("dos", 3));
        assert!(before.word("dos").is_none());
        assert_eq!(cache.snapshot().word_status("dos").value(), 3);
        assert_eq!(cache.snapshot().word_status("uno").value(), 1);
    }

    #[test]
    fn untracked_words_keep_first_casing() {
        let snap = snapshot(&[("the", 5)]);
        let words = untracked_words("The Cat saw the cat's CAT well-known", &snap);
        assert_eq!(words, vec!["Cat", "saw", "cat's", "well-known"]);
    }

    #[test]
    fn translation_candidates_skip_translated_and_advanced() {
        let mut translated = term("perro", 1);
        translated.translation = Some("dog".into());
        let snap = VocabularySnapshot::new(
            vec![translated, term("gato", 2), term("casa", 3)],
            CharFolding::default(),
        );
        let words = words_needing_translation("perro gato casa sol", &snap);
        assert_eq!(words, vec!["gato", "sol"]);
    }

    #[test]
    fn mark_untracked_known_batches_then_refreshes() {
        let cache = VocabularyCache::new(snapshot(&[("hola", 3)]));
        let store = RecordingStore::default();
        store.terms.borrow_mut().push(term("hola", 3));
        let summary = cache.mark_untracked_known(&store, 9, "Hola amigo, hola mundo").unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(*store.calls.borrow(), vec!["batch 2", "fetch"]);
        assert_eq!(cache.snapshot().word_status("amigo"), TermStatus::KNOWN);
    }

    #[test]
    fn empty_refresh_reports_configuration_notice() {
        let cache = VocabularyCache::new(snapshot(&[("hola", 3)]));
        let store = RecordingStore::default();
        let err = cache.refresh(&store, 4).unwrap_err();
        assert!(matches!(
            err,
            VocabularyError::Configuration(ConfigurationError::EmptyVocabulary { language_id: 4 })
        ));
        assert!(cache.snapshot().is_empty());
    }
}
