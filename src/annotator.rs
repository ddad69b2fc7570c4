//! Tokenizes text into word, phrase and separator tokens annotated with
//! vocabulary status.

use crate::error::ConfigurationError;
use crate::vocabulary::{CharFolding, TermStatus, VocabularySnapshot};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TokenKind {
    Word,
    Phrase,
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub term_key: Option<String>,
    pub status: TermStatus,
}

impl Token {
    pub fn separator(c: char) -> Self {
        Token {
            kind: TokenKind::Separator,
            text: c.to_string(),
            term_key: None,
            status: TermStatus::UNTRACKED,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.kind == TokenKind::Separator
    }

    pub fn is_whitespace(&self) -> bool {
        self.is_separator() && self.text.chars().all(char::is_whitespace)
    }
}

/// Decides which characters accumulate into word tokens.
#[derive(Debug, Clone)]
pub struct WordCharPolicy {
    class: Option<Regex>,
    extra: Vec<char>,
}

impl Default for WordCharPolicy {
    fn default() -> Self {
        Self::letters("'")
    }
}

impl WordCharPolicy {
    /// Unicode letters plus the given extra characters.
    pub fn letters(extra: &str) -> Self {
        Self {
            class: None,
            extra: extra.chars().collect(),
        }
    }

    /// A regex character class body such as `a-zA-Zà-ü`, plus extras.
    pub fn class(pattern: &str, extra: &str) -> Result<Self, ConfigurationError> {
        let regex = Regex::new(&format!("^[{pattern}]$")).map_err(|err| {
            ConfigurationError::InvalidWordCharacters {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            class: Some(regex),
            extra: extra.chars().collect(),
        })
    }

    pub fn is_word_char(&self, c: char) -> bool {
        if self.extra.contains(&c) {
            return true;
        }
        match &self.class {
            None => c.is_alphabetic(),
            Some(regex) => {
                let mut buf = [0u8; 4];
                regex.is_match(c.encode_utf8(&mut buf))
            }
        }
    }
}

/// Split `text` into tokens. Concatenating the token texts gives back
/// `text` exactly.
pub fn tokenize(text: &str, vocabulary: &VocabularySnapshot, policy: &WordCharPolicy) -> Vec<Token> {
    let folding = vocabulary.folding();
    let mut tokens = Vec::new();
    let mut cursor = 0usize;

    while cursor < text.len() {
        let rest = &text[cursor..];
        if let Some((matched_len, key, status)) = match_phrase(rest, vocabulary, folding) {
            tokens.push(Token {
                kind: TokenKind::Phrase,
                text: rest[..matched_len].to_string(),
                term_key: Some(key),
                status,
            });
            cursor += matched_len;
            continue;
        }

        let mut chars = rest.char_indices();
        let Some((_, first)) = chars.next() else {
            break;
        };
        if policy.is_word_char(first) {
            let end = chars
                .find(|(_, c)| !policy.is_word_char(*c))
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let word = &rest[..end];
            let key = folding.key(word);
            let status = vocabulary.word_status(&key);
            tokens.push(Token {
                kind: TokenKind::Word,
                text: word.to_string(),
                term_key: Some(key),
                status,
            });
            cursor += end;
        } else {
            tokens.push(Token::separator(first));
            cursor += first.len_utf8();
        }
    }

    tokens
}

/// Longest phrase whose key is a case-insensitive prefix of `rest`.
/// Returns the matched byte length in `rest`, the phrase key and status.
fn match_phrase(
    rest: &str,
    vocabulary: &VocabularySnapshot,
    folding: &CharFolding,
) -> Option<(usize, String, TermStatus)> {
    if !vocabulary.has_phrases() {
        return None;
    }
    let first = rest.chars().next()?;
    let first_folded = folding.fold(first).next()?;
    vocabulary
        .phrases_starting_with(first_folded)
        .find_map(|entry| {
            prefix_len(rest, &entry.key, folding)
                .map(|len| (len, entry.term.term_key.clone(), entry.term.status))
        })
}

/// Byte length of the shortest prefix of `text` whose folded form equals
/// `key`, if it ends on a character boundary.
fn prefix_len(text: &str, key: &[char], folding: &CharFolding) -> Option<usize> {
    let mut matched = 0usize;
    for (idx, c) in text.char_indices() {
        for folded in folding.fold(c) {
            if key.get(matched) != Some(&folded) {
                return None;
            }
            matched += 1;
        }
        if matched == key.len() {
            return Some(idx + c.len_utf8());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::tests::snapshot;

    fn joined(tokens: &[Token]) -> String {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn longest_phrase_wins_over_word() {
        let vocab = snapshot(&[("New York", 2), ("New", 4)]);
        let tokens = tokenize("I love New York.", &vocab, &WordCharPolicy::default());
        let phrases: Vec<&Token> = tokens.iter().filter(|t| t.kind == TokenKind::Phrase).collect();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].text, "New York");
        assert_eq!(phrases[0].status.value(), 2);
        assert!(!tokens.iter().any(|t| t.text == "New"));
        assert_eq!(tokens.last().map(|t| t.text.as_str()), Some("."));
    }

    #[test]
    fn lookup_ignores_case_and_keeps_casing() {
        let vocab = snapshot(&[("hello", 3)]);
        let tokens = tokenize("Hello HELLO hello", &vocab, &WordCharPolicy::default());
        let words: Vec<(&str, u8)> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| (t.text.as_str(), t.status.value()))
            .collect();
        assert_eq!(words, vec![("Hello", 3), ("HELLO", 3), ("hello", 3)]);
    }

    #[test]
    fn phrase_match_preserves_source_casing() {
        let vocab = snapshot(&[("good morning", 1)]);
        let tokens = tokenize("GOOD Morning!", &vocab, &WordCharPolicy::default());
        assert_eq!(tokens[0].kind, TokenKind::Phrase);
        assert_eq!(tokens[0].text, "GOOD Morning");
        assert_eq!(tokens[0].term_key.as_deref(), Some("good morning"));
    }

    #[test]
    fn untracked_words_and_separators() {
        let vocab = snapshot(&[]);
        let tokens = tokenize("don't, stop", &vocab, &WordCharPolicy::default());
        let kinds: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (TokenKind::Word, "don't"),
                (TokenKind::Separator, ","),
                (TokenKind::Separator, " "),
                (TokenKind::Word, "stop"),
            ]
        );
        assert!(tokens.iter().all(|t| t.status == TermStatus::UNTRACKED));
    }

    #[test]
    fn tokenization_is_lossless() {
        let vocab = snapshot(&[("über alles", 2), ("straße", 1), ("a b", 3)]);
        let inputs = [
            "",
            "   ",
            "Über alles!\n\nStraße—ÜBER ALLES…",
            "a b a  b ab\tc",
            "日本語のテキスト。Ελληνικά; 😀 emoji",
            "İstanbul'da \r\n x",
        ];
        for input in inputs {
            let tokens = tokenize(input, &vocab, &WordCharPolicy::default());
            assert_eq!(joined(&tokens), input);
        }
    }

    #[test]
    fn custom_word_class_limits_words() {
        let policy = WordCharPolicy::class("a-z", "").unwrap();
        let tokens = tokenize("abcÄd", &snapshot(&[]), &policy);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["abc", "Ä", "d"]);
        assert!(WordCharPolicy::class("a-", "").is_ok());
        assert!(WordCharPolicy::class("[", "").is_err());
    }

    #[test]
    fn substitutions_apply_to_lookup_only() {
        let folding = CharFolding::parse("’='");
        let vocab = crate::vocabulary::VocabularySnapshot::new(
            vec![crate::vocabulary::VocabularyTerm::new(
                None,
                "don't",
                TermStatus::new(4).unwrap(),
                None,
                &folding,
            )],
            folding,
        );
        let tokens = tokenize("Don’t", &vocab, &WordCharPolicy::letters("'’"));
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "Don’t");
        assert_eq!(tokens[0].status.value(), 4);
    }
}
