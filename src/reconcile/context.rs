//! Reference-language context annotations and forced-stage fixes.

use crate::keypath::{KeyPathCodec, TextMap};
use crate::remote::{TranslationRecord, STAGE_FORCE_REVIEW};

/// Flattened text of one reference language, labelled for display.
#[derive(Debug, Clone)]
pub struct ReferenceText {
    /// Section label, e.g. `EN`.
    pub label: String,
    pub texts: TextMap,
}

impl ReferenceText {
    pub fn new(label: impl Into<String>, texts: TextMap) -> Self {
        Self {
            label: label.into(),
            texts,
        }
    }
}

/// Render the annotation for `key`: one `LABEL:\ntext` section per reference,
/// separated by a blank line. Missing text renders as an empty section.
pub fn render_context(references: &[ReferenceText], key: &str) -> String {
    references
        .iter()
        .map(|reference| {
            let text = reference.texts.get(key).map(String::as_str).unwrap_or("");
            format!("{}:\n{}", reference.label, text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Set the context of every non-structural record.
pub fn apply_context(records: &mut [TranslationRecord], references: &[ReferenceText], codec: &KeyPathCodec) {
    for record in records.iter_mut() {
        if codec.is_structural_key(&record.key) {
            continue;
        }
        record.context = render_context(references, &record.key);
    }
}

/// Records that must be re-submitted with a forced write.
///
/// Picks up force-review sentinels and structural records whose translation
/// drifted from the original (the translation is reset to the original).
/// Each returned record's stage is recomputed from its translation.
pub fn collect_forced(records: &[TranslationRecord], codec: &KeyPathCodec) -> Vec<TranslationRecord> {
    records
        .iter()
        .filter(|record| !record.original.is_empty())
        .filter_map(|record| {
            let structural_drift =
                codec.is_structural_key(&record.key) && record.translation != record.original;
            if !structural_drift && record.stage != STAGE_FORCE_REVIEW {
                return None;
            }

            let mut forced = record.clone();
            if structural_drift {
                forced.translation = forced.original.clone();
            }
            forced.stage = forced.stage_from_translation();
            Some(forced)
        })
        .collect()
}
