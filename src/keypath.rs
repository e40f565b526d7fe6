//! Key-path codec: converts nested asset documents into a flat `Key -> text`
//! mapping and overlays translated text back onto a document.
//!
//! A key is the path from the document root to one string leaf, joined with
//! [`KEY_SEPARATOR`]: `dataList->0->desc`, `dataList->3->lines->1->text`.
//! List elements contribute their zero-based index, mapping fields their name.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Root segment of every key.
pub const ROOT_SEGMENT: &str = "dataList";

/// Separator placed between key segments.
pub const KEY_SEPARATOR: &str = "->";

/// Field names that identify records or reference models rather than carry text.
pub const STRUCTURAL_FIELDS: [&str; 2] = ["id", "model"];

/// Flat `Key -> text` mapping. Ordered so repeated runs produce identical output.
pub type TextMap = BTreeMap<String, String>;

/// One localizable game-data file: `{"dataList": [ {...}, {...} ]}`.
///
/// Top-level fields other than `dataList` are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetDocument {
    #[serde(rename = "dataList", default, deserialize_with = "null_as_empty")]
    pub data_list: Vec<Map<String, Value>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Map<String, Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl AssetDocument {
    /// Parse a document from raw JSON bytes.
    pub fn from_slice(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// Append one segment to a key prefix.
fn join_key(prefix: &str, segment: &str) -> String {
    format!("{}{}{}", prefix, KEY_SEPARATOR, segment)
}

/// Flattens and patches asset documents.
///
/// Field names in the structural set are never overwritten by [`patch`](Self::patch)
/// and keys ending in them are reported by [`is_structural_key`](Self::is_structural_key).
#[derive(Debug, Clone)]
pub struct KeyPathCodec {
    structural_fields: Vec<String>,
}

impl Default for KeyPathCodec {
    fn default() -> Self {
        Self {
            structural_fields: STRUCTURAL_FIELDS.iter().map(|field| field.to_string()).collect(),
        }
    }
}

impl KeyPathCodec {
    /// Whether a field name is one of the structural fields.
    pub fn is_structural_field(&self, name: &str) -> bool {
        self.structural_fields.iter().any(|field| field == name)
    }

    /// Whether a key addresses a structural field (`...->id`, `...->model`).
    pub fn is_structural_key(&self, key: &str) -> bool {
        key.rsplit(KEY_SEPARATOR)
            .next()
            .is_some_and(|last| key != last && self.is_structural_field(last))
    }

    /// Collect every string leaf of the document under its key.
    ///
    /// Numbers, booleans and nulls are not translatable and are skipped.
    pub fn flatten(&self, document: &AssetDocument) -> TextMap {
        let mut out = TextMap::new();
        for (index, entry) in document.data_list.iter().enumerate() {
            let prefix = join_key(ROOT_SEGMENT, &index.to_string());
            for (name, value) in entry {
                flatten_value(value, &join_key(&prefix, name), &mut out);
            }
        }
        out
    }

    /// Return a copy of `document` with every leaf whose key has a non-empty
    /// entry in `translations` replaced by that entry.
    ///
    /// Structural fields (and everything nested under them) are left as-is.
    /// Keys absent from `translations` leave their leaf unchanged.
    pub fn patch(&self, document: &AssetDocument, translations: &TextMap) -> AssetDocument {
        let mut patched = document.clone();
        for (index, entry) in patched.data_list.iter_mut().enumerate() {
            let prefix = join_key(ROOT_SEGMENT, &index.to_string());
            self.patch_fields(entry, &prefix, translations);
        }
        patched
    }

    fn patch_fields(&self, fields: &mut Map<String, Value>, prefix: &str, translations: &TextMap) {
        for (name, value) in fields.iter_mut() {
            if self.is_structural_field(name) {
                continue;
            }
            self.patch_value(value, &join_key(prefix, name), translations);
        }
    }

    fn patch_value(&self, value: &mut Value, key: &str, translations: &TextMap) {
        match value {
            Value::String(text) => {
                if let Some(replacement) = translations.get(key) {
                    if !replacement.is_empty() {
                        *text = replacement.clone();
                    }
                }
            }
            Value::Object(fields) => self.patch_fields(fields, key, translations),
            Value::Array(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    self.patch_value(item, &join_key(key, &index.to_string()), translations);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }
}

fn flatten_value(value: &Value, key: &str, out: &mut TextMap) {
    match value {
        Value::String(text) => {
            out.insert(key.to_string(), text.clone());
        }
        Value::Object(fields) => {
            for (name, child) in fields {
                flatten_value(child, &join_key(key, name), out);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_value(item, &join_key(key, &index.to_string()), out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
