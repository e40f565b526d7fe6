//! Recovery of translations detached by list-index shifts.
//!
//! Keys embed list indices, so inserting or removing a list element moves
//! every later sibling to a new key and the store treats them as new,
//! untranslated strings. Translations are rejoined on original text instead.
//! Two unrelated leaves with identical original text share a translation.

use crate::keypath::KeyPathCodec;
use crate::remote::{TranslationRecord, STAGE_TRANSLATED, STAGE_UNTRANSLATED};
use std::collections::HashMap;

/// Original text -> translation, taken from translated records.
pub type TranslationMemory = HashMap<String, String>;

/// Build the memory from records captured before an update.
///
/// Only non-structural records that carry a translation and are not
/// untranslated count. The first record seen for an original text wins.
pub fn translation_memory(records: &[TranslationRecord], codec: &KeyPathCodec) -> TranslationMemory {
    let mut memory = TranslationMemory::new();
    for record in records {
        if codec.is_structural_key(&record.key)
            || record.stage == STAGE_UNTRANSLATED
            || record.translation.is_empty()
        {
            continue;
        }
        memory
            .entry(record.original.clone())
            .or_insert_with(|| record.translation.clone());
    }
    memory
}

/// Untranslated records whose original text is remembered, with the
/// remembered translation filled in.
pub fn repair_shifted(
    records: &[TranslationRecord],
    memory: &TranslationMemory,
    codec: &KeyPathCodec,
) -> Vec<TranslationRecord> {
    if memory.is_empty() {
        return Vec::new();
    }

    records
        .iter()
        .filter(|record| record.stage == STAGE_UNTRANSLATED && !codec.is_structural_key(&record.key))
        .filter_map(|record| {
            memory.get(&record.original).map(|translation| TranslationRecord {
                translation: translation.clone(),
                stage: STAGE_TRANSLATED,
                ..record.clone()
            })
        })
        .collect()
}
