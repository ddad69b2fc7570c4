//! Normalizes payloads from external collaborators into the canonical
//! internal types. Field names arrive in several casings
//! (`currentAudiobookTrackId`, `CurrentAudiobookTrackId`, `unitId`, ...);
//! nothing outside this module looks at raw payloads.

use crate::vocabulary::{BatchSummary, CharFolding, TermStatus, VocabularyTerm};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;
use ts_rs::TS;

const UNIT_KEYS: &[&str] = &["currentaudiobooktrackid", "unitid", "trackid"];
const POSITION_KEYS: &[&str] = &[
    "currentaudiobookposition",
    "currentposition",
    "positionseconds",
    "position",
];
const TERM_ID_KEYS: &[&str] = &["wordid", "termid", "id"];
const TERM_TEXT_KEYS: &[&str] = &["term", "displayterm", "word", "text"];
const TRANSLATION_KEYS: &[&str] = &["translation", "translationtext"];

/// Last saved progress for a resource. Absent fields mean "start from zero".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SavedProgress {
    pub unit_id: Option<String>,
    pub position_seconds: Option<f64>,
}

impl SavedProgress {
    pub fn new(unit_id: Option<String>, position_seconds: Option<f64>) -> Self {
        Self {
            unit_id,
            position_seconds: position_seconds.filter(|p| p.is_finite() && *p >= 0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unit_id.is_none() && self.position_seconds.is_none()
    }

    /// Accepts any of the known progress payload shapes. Returns `None` when
    /// the payload carries no usable progress.
    pub fn from_json(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let progress = SavedProgress::new(
            field(object, UNIT_KEYS).and_then(id_string),
            field(object, POSITION_KEYS).and_then(number),
        );
        if progress.is_empty() {
            debug!("Progress payload carried no usable fields");
            return None;
        }
        Some(progress)
    }
}

/// Outgoing progress payload in the shape the persistence service expects.
pub fn progress_to_json(unit_id: Option<&str>, position_seconds: f64) -> Value {
    match unit_id {
        Some(unit) => json!({
            "currentAudiobookTrackId": unit.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(unit)),
            "currentAudiobookPosition": position_seconds,
        }),
        None => json!({ "currentPosition": position_seconds }),
    }
}

/// A vocabulary term from the store, with derived key and phrase flag.
pub fn term_from_json(value: &Value, folding: &CharFolding) -> Option<VocabularyTerm> {
    let object = value.as_object()?;
    let display = field(object, TERM_TEXT_KEYS)?.as_str()?.trim();
    if display.is_empty() {
        return None;
    }
    let id = field(object, TERM_ID_KEYS).and_then(|v| match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    let status = field(object, &["status"])
        .and_then(Value::as_u64)
        .map(|s| s.min(5) as u8)
        .and_then(TermStatus::new)
        .unwrap_or_default();
    let translation = field(object, TRANSLATION_KEYS)
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(VocabularyTerm::new(id, display, status, translation, folding))
}

pub fn terms_from_json(value: &Value, folding: &CharFolding) -> Vec<VocabularyTerm> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| term_from_json(item, folding))
                .collect()
        })
        .unwrap_or_default()
}

pub fn batch_summary_from_json(value: &Value) -> BatchSummary {
    let Some(object) = value.as_object() else {
        return BatchSummary::default();
    };
    let count = |keys: &[&str]| {
        field(object, keys)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    BatchSummary {
        added: count(&["added", "addedcount", "created", "createdcount"]),
        updated: count(&["updated", "updatedcount"]),
        skipped: count(&["skipped", "skippedcount"]),
    }
}

/// First present, non-null field among `keys` (lowercase), matched without
/// regard to casing.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|wanted| {
        object
            .iter()
            .find(|(key, value)| !value.is_null() && key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value)
    })
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audiobook_progress_in_either_casing() {
        let camel = json!({"currentAudiobookTrackId": 12, "currentAudiobookPosition": 41.5});
        let pascal = json!({"CurrentAudiobookTrackId": "12", "CurrentAudiobookPosition": "41.5"});
        let expected = SavedProgress::new(Some("12".into()), Some(41.5));
        assert_eq!(SavedProgress::from_json(&camel), Some(expected.clone()));
        assert_eq!(SavedProgress::from_json(&pascal), Some(expected));
    }

    #[test]
    fn lesson_progress_has_no_unit() {
        let lesson = json!({"currentPosition": 9.25});
        assert_eq!(
            SavedProgress::from_json(&lesson),
            Some(SavedProgress::new(None, Some(9.25)))
        );
    }

    #[test]
    fn empty_or_invalid_progress_is_absent() {
        assert_eq!(SavedProgress::from_json(&Value::Null), None);
        assert_eq!(SavedProgress::from_json(&json!({})), None);
        assert_eq!(
            SavedProgress::from_json(&json!({"currentAudiobookTrackId": null, "currentAudiobookPosition": -3})),
            None
        );
    }

    #[test]
    fn outgoing_payload_matches_service_shape() {
        assert_eq!(
            progress_to_json(Some("4"), 10.0),
            json!({"currentAudiobookTrackId": 4, "currentAudiobookPosition": 10.0})
        );
        assert_eq!(progress_to_json(None, 2.5), json!({"currentPosition": 2.5}));
    }

    #[test]
    fn terms_normalized_once() {
        let payload = json!([
            {"WordId": 3, "Term": "New York", "Status": 2, "Translation": "Nueva York"},
            {"termId": "8", "term": "hola", "status": 9},
            {"term": "   "},
        ]);
        let terms = terms_from_json(&payload, &CharFolding::default());
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].id, Some(3));
        assert!(terms[0].is_phrase);
        assert_eq!(terms[0].term_key, "new york");
        assert_eq!(terms[1].id, Some(8));
        assert_eq!(terms[1].status, TermStatus::KNOWN);
    }

    #[test]
    fn batch_summary_any_casing() {
        let summary = batch_summary_from_json(&json!({"AddedCount": 3, "updated": 1}));
        assert_eq!(
            summary,
            BatchSummary {
                added: 3,
                updated: 1,
                skipped: 0
            }
        );
    }
}
