//! View models for the reading and transcript screens.

use crate::annotator::{Token, WordCharPolicy, tokenize};
use crate::bookmarks::{BookmarkBackend, BookmarkStore};
use crate::config::AppConfig;
use crate::error::ConfigurationError;
use crate::playback::PlaybackEvent;
use crate::segmenter::{Sentence, SentenceRules, segment};
use crate::subtitle::SubtitleTimeline;
use crate::vocabulary::{CharFolding, VocabularySnapshot};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;
use ts_rs::TS;

static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n[^\S\n]*(?:\r?\n\s*)+").expect("valid paragraph regex"));

/// Per-language tokenization and segmentation settings.
#[derive(Debug, Clone, Default)]
pub struct LanguageProfile {
    pub policy: WordCharPolicy,
    pub rules: SentenceRules,
    pub folding: CharFolding,
}

impl LanguageProfile {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigurationError> {
        let policy = match config.word_characters.as_deref().map(str::trim) {
            Some(pattern) if !pattern.is_empty() => {
                WordCharPolicy::class(pattern, &config.word_extra_chars)?
            }
            _ => WordCharPolicy::letters(&config.word_extra_chars),
        };
        Ok(Self {
            policy,
            rules: SentenceRules::new(
                &config.sentence_terminators,
                config.sentence_exceptions.iter().cloned(),
            ),
            folding: CharFolding::parse(&config.character_substitutions),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Paragraph {
    tokens: Vec<Token>,
    sentences: Vec<Sentence>,
}

/// A text split into paragraphs of annotated sentences. Sentence indices
/// are global across the document so bookmarks stay stable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotatedDocument {
    paragraphs: Vec<Paragraph>,
    sentence_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SentenceView {
    #[ts(type = "number")]
    pub index: usize,
    pub tokens: Vec<Token>,
    pub is_bookmarked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ParagraphView {
    pub sentences: Vec<SentenceView>,
}

impl AnnotatedDocument {
    pub fn build(text: &str, snapshot: &VocabularySnapshot, profile: &LanguageProfile) -> Self {
        let mut paragraphs = Vec::new();
        let mut next_index = 0;
        for raw in PARAGRAPH_BREAK_RE.split(text) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let tokens = tokenize(raw, snapshot, &profile.policy);
            let segmentation = segment(&tokens, next_index, &profile.rules);
            next_index = segmentation.next_index;
            paragraphs.push(Paragraph {
                tokens,
                sentences: segmentation.sentences,
            });
        }
        debug!(
            paragraphs = paragraphs.len(),
            sentences = next_index,
            "Annotated document"
        );
        Self {
            paragraphs,
            sentence_count: next_index,
        }
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    /// Tokens of the sentence with the given global index.
    pub fn sentence(&self, index: usize) -> Option<&[Token]> {
        self.paragraphs.iter().find_map(|paragraph| {
            paragraph
                .sentences
                .iter()
                .find(|sentence| sentence.index == index)
                .map(|sentence| sentence.tokens(&paragraph.tokens))
        })
    }

    /// Views with bookmark flags from `bookmarks`, loading the resource's
    /// set if needed.
    pub fn view<B: BookmarkBackend>(
        &self,
        resource_id: &str,
        bookmarks: &mut BookmarkStore<B>,
    ) -> Vec<ParagraphView> {
        let marked: BTreeSet<usize> = bookmarks.bookmarks(resource_id).into_iter().collect();
        self.view_with(|index| marked.contains(&index))
    }

    pub fn view_with(&self, is_bookmarked: impl Fn(usize) -> bool) -> Vec<ParagraphView> {
        self.paragraphs
            .iter()
            .map(|paragraph| ParagraphView {
                sentences: paragraph
                    .sentences
                    .iter()
                    .map(|sentence| SentenceView {
                        index: sentence.index,
                        tokens: sentence.tokens(&paragraph.tokens).to_vec(),
                        is_bookmarked: is_bookmarked(sentence.index),
                    })
                    .collect(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TranscriptLineView {
    pub id: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub tokens: Vec<Token>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TranscriptView {
    pub lines: Vec<TranscriptLineView>,
}

impl TranscriptView {
    pub fn build(
        timeline: &SubtitleTimeline,
        snapshot: &VocabularySnapshot,
        profile: &LanguageProfile,
        active_id: Option<u32>,
    ) -> Self {
        let lines = timeline
            .lines()
            .iter()
            .map(|line| TranscriptLineView {
                id: line.id,
                start_time: line.start_time,
                end_time: line.end_time,
                tokens: tokenize(&line.text, snapshot, &profile.policy),
                is_active: active_id == Some(line.id),
            })
            .collect();
        Self { lines }
    }

    /// Move the active flag without re-tokenizing.
    pub fn set_active(&mut self, active_id: Option<u32>) {
        for line in &mut self.lines {
            line.is_active = active_id == Some(line.id);
        }
    }

    pub fn active(&self) -> Option<&TranscriptLineView> {
        self.lines.iter().find(|line| line.is_active)
    }
}

/// Clicking a transcript line seeks to its start.
pub fn seek_to_line(timeline: &SubtitleTimeline, id: u32) -> Option<PlaybackEvent> {
    timeline.line(id).map(|line| PlaybackEvent::SeekTo {
        position: line.start_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::TokenKind;
    use crate::bookmarks::MemoryBookmarkBackend;
    use crate::vocabulary::tests::snapshot;

    fn sentence_text(tokens: &[Token]) -> String {
        tokens.iter().map(|token| token.text.as_str()).collect()
    }

    #[test]
    fn sentence_indices_continue_across_paragraphs() {
        let text = "One. Two!\n\n  \nThree? Four.\r\n\r\nFive";
        let doc = AnnotatedDocument::build(text, &snapshot(&[]), &LanguageProfile::default());
        assert_eq!(doc.paragraph_count(), 3);
        assert_eq!(doc.sentence_count(), 5);
        assert_eq!(sentence_text(doc.sentence(2).unwrap()), "Three?");
        assert_eq!(sentence_text(doc.sentence(3).unwrap()), " Four.");
        assert_eq!(sentence_text(doc.sentence(4).unwrap()), "Five");
        assert!(doc.sentence(5).is_none());
    }

    #[test]
    fn single_newline_stays_in_paragraph() {
        let doc = AnnotatedDocument::build(
            "First line\nsecond line.",
            &snapshot(&[]),
            &LanguageProfile::default(),
        );
        assert_eq!(doc.paragraph_count(), 1);
        assert_eq!(doc.sentence_count(), 1);
    }

    #[test]
    fn views_carry_bookmarks_and_status() {
        let vocab = snapshot(&[("hola", 2)]);
        let doc = AnnotatedDocument::build("Hola amigo. Adios.", &vocab, &LanguageProfile::default());

        let mut bookmarks = BookmarkStore::new(MemoryBookmarkBackend::default());
        bookmarks.toggle("lesson-1", 1);
        let views = doc.view("lesson-1", &mut bookmarks);
        let sentences = &views[0].sentences;
        assert_eq!(sentences.len(), 2);
        assert!(!sentences[0].is_bookmarked);
        assert!(sentences[1].is_bookmarked);
        assert_eq!(sentences[0].tokens[0].kind, TokenKind::Word);
        assert_eq!(sentences[0].tokens[0].status.value(), 2);
    }

    #[test]
    fn profile_from_config() {
        let config = AppConfig {
            word_characters: Some("a-z".to_string()),
            sentence_exceptions: vec!["Dr.".to_string()],
            character_substitutions: "’='".to_string(),
            ..AppConfig::default()
        };
        let profile = LanguageProfile::from_config(&config).unwrap();
        assert!(profile.policy.is_word_char('q'));
        assert!(!profile.policy.is_word_char('Q'));
        assert_eq!(profile.folding.substitute('’'), '\'');

        let doc = AnnotatedDocument::build("Dr. Who. Yes.", &snapshot(&[]), &profile);
        assert_eq!(doc.sentence_count(), 2);
    }

    #[test]
    fn invalid_word_class_is_configuration_error() {
        let config = AppConfig {
            word_characters: Some("z-a".to_string()),
            ..AppConfig::default()
        };
        assert!(matches!(
            LanguageProfile::from_config(&config),
            Err(ConfigurationError::InvalidWordCharacters { .. })
        ));
    }

    #[test]
    fn transcript_marks_active_line_and_seeks_on_click() {
        let timeline = SubtitleTimeline::parse(
            "1\n00:00:01,000 --> 00:00:03,000\nBuenos dias\n\n2\n00:00:03,500 --> 00:00:05,000\nHasta luego\n",
        );
        let mut view = TranscriptView::build(
            &timeline,
            &snapshot(&[]),
            &LanguageProfile::default(),
            timeline.lookup(1.5),
        );
        assert_eq!(view.active().map(|line| line.id), Some(1));
        assert_eq!(sentence_text(&view.lines[1].tokens), "Hasta luego");

        view.set_active(timeline.lookup(4.0));
        assert_eq!(view.active().map(|line| line.id), Some(2));
        view.set_active(timeline.lookup(3.2));
        assert!(view.active().is_none());

        assert!(matches!(
            seek_to_line(&timeline, 2),
            Some(PlaybackEvent::SeekTo { position }) if position == 3.5
        ));
        assert!(seek_to_line(&timeline, 9).is_none());
    }
}
