//! TypeScript bindings for the view and wire types the host UI consumes.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use ts_rs::TS;

use crate::annotator::{Token, TokenKind};
use crate::boundary::SavedProgress;
use crate::playback::{Intent, PlayableUnit, PlaybackSnapshot, TimerKind};
use crate::reader::{ParagraphView, SentenceView, TranscriptLineView, TranscriptView};
use crate::segmenter::Sentence;
use crate::subtitle::SubtitleLine;
use crate::vocabulary::{BatchSummary, NewTerm, TermStatus, VocabularyTerm};

fn export_single_type<T: TS + 'static>(out_dir: &Path) -> Result<()> {
    T::export_all_to(out_dir).with_context(|| format!("Failed to export {}", T::name()))
}

/// Write every exported type to `out_dir`, replacing stale `.ts` files.
pub fn export_ts_bindings(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for entry in
        fs::read_dir(out_dir).with_context(|| format!("Failed to list {}", out_dir.display()))?
    {
        let path = entry.context("Failed to read binding directory entry")?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ts") {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }

    export_single_type::<SubtitleLine>(out_dir)?;
    export_single_type::<TermStatus>(out_dir)?;
    export_single_type::<VocabularyTerm>(out_dir)?;
    export_single_type::<NewTerm>(out_dir)?;
    export_single_type::<BatchSummary>(out_dir)?;
    export_single_type::<TokenKind>(out_dir)?;
    export_single_type::<Token>(out_dir)?;
    export_single_type::<Sentence>(out_dir)?;
    export_single_type::<SentenceView>(out_dir)?;
    export_single_type::<ParagraphView>(out_dir)?;
    export_single_type::<TranscriptLineView>(out_dir)?;
    export_single_type::<TranscriptView>(out_dir)?;
    export_single_type::<SavedProgress>(out_dir)?;
    export_single_type::<PlayableUnit>(out_dir)?;
    export_single_type::<TimerKind>(out_dir)?;
    export_single_type::<Intent>(out_dir)?;
    export_single_type::<PlaybackSnapshot>(out_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn exports_view_types() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        let out_dir = std::env::temp_dir().join(format!("linguaread_bindings_{now}"));
        fs::create_dir_all(&out_dir).unwrap();
        fs::write(out_dir.join("Stale.ts"), "export type Stale = never;").unwrap();

        export_ts_bindings(&out_dir).unwrap();
        assert!(!out_dir.join("Stale.ts").exists());
        assert!(out_dir.join("PlaybackSnapshot.ts").exists());
        assert!(out_dir.join("TranscriptLineView.ts").exists());
        let _ = fs::remove_dir_all(&out_dir);
    }
}
