//! Groups a token stream into globally indexed sentences.

use crate::annotator::Token;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sentence {
    #[ts(type = "number")]
    pub index: usize,
    /// Half-open `[start, end)` range into the token stream.
    #[ts(type = "[number, number]")]
    pub token_range: (usize, usize),
}

impl Sentence {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.token_range.0..self.token_range.1
    }

    pub fn tokens<'a>(&self, tokens: &'a [Token]) -> &'a [Token] {
        &tokens[self.range()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub sentences: Vec<Sentence>,
    pub next_index: usize,
}

/// Sentence terminators and boundary exceptions for one language.
///
/// An exception suppresses a boundary when the tokens ending at the
/// terminator concatenate to exactly the exception string (case-sensitive)
/// and are preceded by a separator or the start of the sentence. `Dr.`
/// therefore matches "Dr." but not "dr." or "XDr.".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRules {
    terminators: Vec<char>,
    exceptions: Vec<String>,
}

impl Default for SentenceRules {
    fn default() -> Self {
        Self::new(".!?", Vec::<String>::new())
    }
}

impl SentenceRules {
    pub fn new<I, S>(terminators: &str, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut terminators: Vec<char> = terminators.chars().filter(|c| !c.is_whitespace()).collect();
        if terminators.is_empty() {
            terminators = vec!['.', '!', '?'];
        }
        Self {
            terminators,
            exceptions: exceptions
                .into_iter()
                .map(Into::into)
                .map(|exception: String| exception.trim().to_string())
                .filter(|exception| !exception.is_empty())
                .collect(),
        }
    }

    fn is_terminator(&self, token: &Token) -> bool {
        if !token.is_separator() {
            return false;
        }
        let mut chars = token.text.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if self.terminators.contains(&c))
    }

    /// Whether the tokens `run[..=end]` close on a configured exception.
    fn is_exception(&self, run: &[Token], end: usize) -> bool {
        self.exceptions
            .iter()
            .any(|exception| ends_with_exception(run, end, exception))
    }
}

fn ends_with_exception(run: &[Token], end: usize, exception: &str) -> bool {
    let mut suffix = String::new();
    let mut start = end + 1;
    while start > 0 && suffix.len() < exception.len() {
        start -= 1;
        suffix.insert_str(0, &run[start].text);
    }
    suffix == exception && (start == 0 || run[start - 1].is_separator())
}

/// Split `tokens` into sentences numbered from `start_index`.
pub fn segment(tokens: &[Token], start_index: usize, rules: &SentenceRules) -> Segmentation {
    let mut sentences = Vec::new();
    let mut next_index = start_index;
    let mut run_start = 0usize;

    let mut close = |run_start: usize, run_end: usize, next_index: &mut usize| {
        let run = &tokens[run_start..run_end];
        if run.is_empty() || run.iter().all(Token::is_whitespace) {
            return;
        }
        sentences.push(Sentence {
            index: *next_index,
            token_range: (run_start, run_end),
        });
        *next_index += 1;
    };

    for (idx, token) in tokens.iter().enumerate() {
        if !rules.is_terminator(token) {
            continue;
        }
        let at_boundary = tokens.get(idx + 1).is_none_or(Token::is_whitespace);
        if !at_boundary {
            continue;
        }
        if rules.is_exception(&tokens[run_start..], idx - run_start) {
            continue;
        }
        close(run_start, idx + 1, &mut next_index);
        run_start = idx + 1;
    }
    close(run_start, tokens.len(), &mut next_index);

    Segmentation {
        sentences,
        next_index,
    }
}
