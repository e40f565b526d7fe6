//! Remote translation store.
//!
//! [`TranslationService`] is the seam the reconciler drives; [`ParatranzClient`]
//! implements it over the ParaTranz REST API.

#[cfg(test)]
pub(crate) mod memory;
mod paratranz;

pub use paratranz::{ParatranzClient, DEFAULT_API_URL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Translation stage: not translated yet.
pub const STAGE_UNTRANSLATED: i32 = 0;
/// Translation stage: translated and accepted.
pub const STAGE_TRANSLATED: i32 = 1;
/// Translation stage: sentinel asking for a forced re-review.
pub const STAGE_FORCE_REVIEW: i32 = -1;

/// Failures reported by the translation store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP 429. Transient; callers retry after waiting.
    #[error("rate limited by translation service")]
    RateLimited,

    /// The store found no translatable strings in an uploaded document.
    #[error("document has no translatable content")]
    EmptyDocument,

    #[error("translation service error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("request to translation service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode translation service response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RemoteError {
    /// Only rate limiting is worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::RateLimited)
    }
}

/// A file in the translation store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteFile {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Folder-relative path, e.g. `StoryData/S101.json`.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub format: String,
    #[serde(deserialize_with = "null_as_default")]
    pub total: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub translated: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub disputed: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub checked: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub reviewed: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub hidden: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub locked: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub words: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub hash: String,
    #[serde(deserialize_with = "null_as_default")]
    pub folder: String,
}

/// One translatable string of a remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub id: i64,
    pub key: String,
    pub original: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub translation: String,
    #[serde(default)]
    pub stage: i32,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub context: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

impl TranslationRecord {
    /// Stage implied by the current translation text.
    pub fn stage_from_translation(&self) -> i32 {
        if self.translation.is_empty() {
            STAGE_UNTRANSLATED
        } else {
            STAGE_TRANSLATED
        }
    }
}

/// Files keyed by their full path.
pub type RemoteFiles = BTreeMap<String, RemoteFile>;

/// Operations the reconciler needs from the translation store.
///
/// Every call may fail with [`RemoteError::RateLimited`]; callers wrap them in
/// a retry policy.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// All files of the project keyed by full path.
    async fn list_files(&self) -> Result<RemoteFiles, RemoteError>;

    /// Upload a new source document.
    async fn upload_file(&self, data: &[u8], folder: &str, name: &str) -> Result<RemoteFile, RemoteError>;

    /// Replace a file's content. With `raw_format` the payload is a JSON array
    /// of translation records (structural metadata) rather than a source document.
    async fn update_file(
        &self,
        id: i64,
        data: &[u8],
        folder: &str,
        name: &str,
        raw_format: bool,
    ) -> Result<(), RemoteError>;

    async fn delete_file(&self, id: i64) -> Result<(), RemoteError>;

    async fn get_translations(&self, id: i64) -> Result<Vec<TranslationRecord>, RemoteError>;

    /// Write translation content. `force` overrides reviewer locks.
    async fn replace_translations(
        &self,
        id: i64,
        data: &[u8],
        name: &str,
        raw_format: bool,
        force: bool,
    ) -> Result<(), RemoteError>;
}

/// Serialize records the way the store expects them in raw-format uploads.
pub fn encode_records(records: &[TranslationRecord]) -> Result<Vec<u8>, RemoteError> {
    Ok(serde_json::to_vec(records)?)
}
