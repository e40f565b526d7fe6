//! In-memory translation store used by unit tests.
//!
//! Uploads are flattened with the default codec so the store holds one record
//! per string leaf, and content updates keep translations for keys that
//! survive, the way the real service merges.

use super::{
    RemoteError, RemoteFile, RemoteFiles, TranslationRecord, TranslationService, STAGE_UNTRANSLATED,
};
use crate::keypath::{AssetDocument, KeyPathCodec};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListFiles,
    Upload { folder: String, name: String, data: Vec<u8> },
    UpdateFile { id: i64, name: String, raw_format: bool, data: Vec<u8> },
    Delete { id: i64 },
    GetTranslations { id: i64 },
    Replace { id: i64, name: String, raw_format: bool, force: bool, data: Vec<u8> },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::ListFiles | Call::GetTranslations { .. })
    }
}

#[derive(Default)]
struct State {
    files: RemoteFiles,
    records: HashMap<i64, Vec<TranslationRecord>>,
    calls: Vec<Call>,
    next_id: i64,
    pending_rate_limits: u32,
    pending_empty: u32,
}

#[derive(Default)]
pub struct MemoryService {
    state: Mutex<State>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing remote file with records.
    pub fn insert_file(&self, folder: &str, name: &str, records: Vec<TranslationRecord>) -> RemoteFile {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let file = remote_file(state.next_id, folder, name);
        state.records.insert(file.id, records);
        state.files.insert(file.name.clone(), file.clone());
        file
    }

    /// Answer the next `count` calls with a rate-limit signal.
    pub fn rate_limit_next(&self, count: u32) {
        self.state.lock().unwrap().pending_rate_limits = count;
    }

    /// Report the next `count` content uploads as having nothing to translate.
    pub fn empty_next(&self, count: u32) {
        self.state.lock().unwrap().pending_empty = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn records(&self, id: i64) -> Vec<TranslationRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn file(&self, full_path: &str) -> Option<RemoteFile> {
        self.state.lock().unwrap().files.get(full_path).cloned()
    }

    fn take_empty(state: &mut State) -> bool {
        if state.pending_empty > 0 {
            state.pending_empty -= 1;
            return true;
        }
        false
    }

    fn begin(&self, call: Call) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.pending_rate_limits > 0 {
            state.pending_rate_limits -= 1;
            return Err(RemoteError::RateLimited);
        }
        Ok(state)
    }
}

fn remote_file(id: i64, folder: &str, name: &str) -> RemoteFile {
    let full_path = if folder == "." {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    };
    RemoteFile {
        id,
        name: full_path,
        folder: folder.to_string(),
        format: "json".to_string(),
        ..RemoteFile::default()
    }
}

fn records_from_document(data: &[u8], first_id: i64) -> Result<Vec<TranslationRecord>, RemoteError> {
    let document = AssetDocument::from_slice(data)?;
    Ok(KeyPathCodec::default()
        .flatten(&document)
        .into_iter()
        .enumerate()
        .map(|(i, (key, original))| TranslationRecord {
            id: first_id + i as i64,
            key,
            original,
            translation: String::new(),
            stage: STAGE_UNTRANSLATED,
            context: String::new(),
        })
        .collect())
}

#[async_trait]
impl TranslationService for MemoryService {
    async fn list_files(&self) -> Result<RemoteFiles, RemoteError> {
        let state = self.begin(Call::ListFiles)?;
        Ok(state.files.clone())
    }

    async fn upload_file(&self, data: &[u8], folder: &str, name: &str) -> Result<RemoteFile, RemoteError> {
        let mut state = self.begin(Call::Upload {
            folder: folder.to_string(),
            name: name.to_string(),
            data: data.to_vec(),
        })?;

        let records = records_from_document(data, 1000)?;
        if records.is_empty() || Self::take_empty(&mut state) {
            return Err(RemoteError::EmptyDocument);
        }

        state.next_id += 1;
        let file = remote_file(state.next_id, folder, name);
        state.records.insert(file.id, records);
        state.files.insert(file.name.clone(), file.clone());
        Ok(file)
    }

    async fn update_file(
        &self,
        id: i64,
        data: &[u8],
        _folder: &str,
        name: &str,
        raw_format: bool,
    ) -> Result<(), RemoteError> {
        let mut state = self.begin(Call::UpdateFile {
            id,
            name: name.to_string(),
            raw_format,
            data: data.to_vec(),
        })?;

        if raw_format {
            let records: Vec<TranslationRecord> = serde_json::from_slice(data)?;
            state.records.insert(id, records);
            return Ok(());
        }

        let mut records = records_from_document(data, 2000)?;
        if records.is_empty() || Self::take_empty(&mut state) {
            return Err(RemoteError::EmptyDocument);
        }
        let previous: HashMap<String, TranslationRecord> = state
            .records
            .get(&id)
            .map(|old| old.iter().map(|r| (r.key.clone(), r.clone())).collect())
            .unwrap_or_default();
        for record in &mut records {
            if let Some(old) = previous.get(&record.key) {
                record.id = old.id;
                record.context = old.context.clone();
                if old.original == record.original {
                    record.translation = old.translation.clone();
                    record.stage = old.stage;
                }
            }
        }
        state.records.insert(id, records);
        Ok(())
    }

    async fn delete_file(&self, id: i64) -> Result<(), RemoteError> {
        let mut state = self.begin(Call::Delete { id })?;
        state.records.remove(&id);
        state.files.retain(|_, f| f.id != id);
        Ok(())
    }

    async fn get_translations(&self, id: i64) -> Result<Vec<TranslationRecord>, RemoteError> {
        let state = self.begin(Call::GetTranslations { id })?;
        state
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| RemoteError::Service {
                status: 404,
                body: format!("file {} not found", id),
            })
    }

    async fn replace_translations(
        &self,
        id: i64,
        data: &[u8],
        name: &str,
        raw_format: bool,
        force: bool,
    ) -> Result<(), RemoteError> {
        let mut state = self.begin(Call::Replace {
            id,
            name: name.to_string(),
            raw_format,
            force,
            data: data.to_vec(),
        })?;

        let incoming: Vec<TranslationRecord> = serde_json::from_slice(data)?;
        if let Some(records) = state.records.get_mut(&id) {
            for update in incoming {
                if let Some(record) = records.iter_mut().find(|r| r.key == update.key) {
                    record.translation = update.translation;
                    record.stage = update.stage;
                }
            }
        }
        Ok(())
    }
}
