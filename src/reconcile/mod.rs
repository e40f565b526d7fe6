//! Change reconciliation against the remote translation store.
//!
//! # Architecture
//!
//! - `context`: reference-language annotations and forced-stage fixes
//! - `shift`: recovery of translations detached by list-index shifts
//!
//! [`Reconciler`] drives one change entry at a time: it decides between
//! create, update and delete, then runs the context and shift-repair passes.
//! Every remote call goes through the configured [`RetryConfig`].

mod context;
mod shift;

pub use context::{apply_context, collect_forced, render_context, ReferenceText};
pub use shift::{repair_shifted, translation_memory, TranslationMemory};

use crate::assets::AssetStore;
use crate::changes::{read_change_list, ChangeEntry, ChangeKind, TranslationPath};
use crate::config::Config;
use crate::keypath::KeyPathCodec;
use crate::remote::{encode_records, RemoteError, RemoteFile, RemoteFiles, TranslationService};
use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use std::collections::HashSet;
use tracing::{error, info, warn};

/// Source language and the reference languages used for context.
#[derive(Debug, Clone)]
pub struct Languages {
    pub source: String,
    pub references: Vec<String>,
}

impl Languages {
    pub fn new(source: &str, references: &[&str]) -> Self {
        Self {
            source: source.to_string(),
            references: references.iter().map(|r| r.to_string()).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            source: config.source_language.clone(),
            references: config.reference_languages.clone(),
        }
    }
}

/// What the state machine decided for one change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Create,
    Update,
    Delete,
    Nothing,
}

impl Plan {
    pub fn decide(kind: ChangeKind, exists_remotely: bool) -> Self {
        match (kind, exists_remotely) {
            (ChangeKind::Added, false) | (ChangeKind::Modified, false) => Plan::Create,
            (ChangeKind::Added, true) => Plan::Nothing,
            (ChangeKind::Modified, true) => Plan::Update,
            (ChangeKind::Deleted, true) => Plan::Delete,
            (ChangeKind::Deleted, false) => Plan::Nothing,
        }
    }
}

/// Result of applying one change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Deleted,
    /// Nothing to do for this entry.
    Unchanged,
    /// The document had no translatable content.
    Skipped,
}

/// Tally of one synchronization run.
#[derive(Debug, Default, Clone)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub context_refreshed: usize,
    /// Translation paths already handled in this run.
    pub handled: HashSet<String>,
}

impl SyncReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct Reconciler<'a, S: TranslationService> {
    service: &'a S,
    assets: &'a AssetStore,
    languages: Languages,
    codec: KeyPathCodec,
    retry: RetryConfig,
}

impl<'a, S: TranslationService> Reconciler<'a, S> {
    pub fn new(service: &'a S, assets: &'a AssetStore, languages: Languages) -> Self {
        Self {
            service,
            assets,
            languages,
            codec: KeyPathCodec::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the current remote file listing.
    pub async fn remote_files(&self) -> Result<RemoteFiles> {
        self.retry
            .run("List files", || self.service.list_files())
            .await
            .context("Failed to list remote files")
    }

    /// Apply a source-language change list.
    pub async fn run(&self, entries: &[ChangeEntry]) -> Result<SyncReport> {
        let remote = self.remote_files().await?;
        let mut report = SyncReport::default();

        for entry in entries {
            let path = TranslationPath::from_asset_path(&entry.asset_path, &self.languages.source);
            report.handled.insert(path.full_path());
            let outcome = self.apply(entry.kind, &path, &remote).await?;
            report.record(outcome);
        }

        info!(
            "Sync finished: {} created, {} updated, {} deleted, {} unchanged, {} skipped",
            report.created, report.updated, report.deleted, report.unchanged, report.skipped
        );
        Ok(report)
    }

    /// Refresh context for files whose reference-language text changed.
    ///
    /// Only modified entries that exist remotely and were not handled earlier
    /// in the run are refreshed.
    pub async fn refresh_reference_changes(
        &self,
        language: &str,
        entries: &[ChangeEntry],
        remote: &RemoteFiles,
        report: &mut SyncReport,
    ) -> Result<()> {
        for entry in entries {
            let path = TranslationPath::from_asset_path(&entry.asset_path, language);
            if !report.handled.insert(path.full_path()) {
                continue;
            }
            if entry.kind != ChangeKind::Modified {
                continue;
            }
            if let Some(file) = remote.get(&path.full_path()) {
                self.refresh_context(file, &path).await?;
                report.context_refreshed += 1;
            }
        }
        Ok(())
    }

    /// Apply one change to the document at `path`.
    pub async fn apply(&self, kind: ChangeKind, path: &TranslationPath, remote: &RemoteFiles) -> Result<Outcome> {
        let existing = remote.get(&path.full_path());

        match (Plan::decide(kind, existing.is_some()), existing) {
            (Plan::Create, _) => self.create(path).await,
            (Plan::Update, Some(file)) => self.update(file, path).await,
            (Plan::Delete, Some(file)) => self.delete(file).await,
            _ => Ok(Outcome::Unchanged),
        }
    }

    /// Upload a document that does not exist remotely yet.
    pub async fn create(&self, path: &TranslationPath) -> Result<Outcome> {
        info!("Create {}", path);
        let asset = self.assets.load(&self.languages.source, path)?;

        if self.codec.flatten(&asset.document).is_empty() {
            warn!("Skip empty document {}", path);
            return Ok(Outcome::Skipped);
        }

        let uploaded = self
            .retry
            .run("Upload file", || {
                self.service.upload_file(&asset.raw, &path.folder, &path.name)
            })
            .await;

        let file = match uploaded {
            Ok(file) => file,
            Err(RemoteError::EmptyDocument) => {
                warn!("Upload of {} skipped: no translatable content", path);
                return Ok(Outcome::Skipped);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to upload {}", path)),
        };

        self.refresh_context(&file, path).await?;
        Ok(Outcome::Created)
    }

    /// Replace the content of an existing remote file and repair drift.
    pub async fn update(&self, file: &RemoteFile, path: &TranslationPath) -> Result<Outcome> {
        info!("Update {} ({})", path, file.id);
        let asset = self.assets.load(&self.languages.source, path)?;

        if self.codec.flatten(&asset.document).is_empty() {
            error!("Skip empty document {}", path);
            return Ok(Outcome::Skipped);
        }

        let snapshot = self
            .retry
            .run("Get translations", || self.service.get_translations(file.id))
            .await
            .with_context(|| format!("Failed to fetch translations of {}", path))?;

        let updated = self
            .retry
            .run("Update file", || {
                self.service
                    .update_file(file.id, &asset.raw, &path.folder, &path.name, false)
            })
            .await;

        match updated {
            Ok(()) => {}
            Err(RemoteError::EmptyDocument) => {
                error!("Update of {} skipped: no translatable content", path);
                return Ok(Outcome::Skipped);
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to update {}", path)),
        }

        self.refresh_context(file, path).await?;
        self.repair_shifts(file, path, &translation_memory(&snapshot, &self.codec))
            .await?;
        Ok(Outcome::Updated)
    }

    pub async fn delete(&self, file: &RemoteFile) -> Result<Outcome> {
        info!("Delete {} ({})", file.name, file.id);
        self.retry
            .run("Delete file", || self.service.delete_file(file.id))
            .await
            .with_context(|| format!("Failed to delete {}", file.name))?;
        Ok(Outcome::Deleted)
    }

    /// Rewrite record context from the reference languages, then force-fix
    /// sentinel and structural records.
    pub async fn refresh_context(&self, file: &RemoteFile, path: &TranslationPath) -> Result<()> {
        info!("Refresh context {} ({})", path, file.id);

        let mut records = self
            .retry
            .run("Get translations", || self.service.get_translations(file.id))
            .await
            .with_context(|| format!("Failed to fetch translations of {}", path))?;

        let mut references = Vec::with_capacity(self.languages.references.len());
        for language in &self.languages.references {
            let texts = self.assets.load_text_map(language, path, &self.codec)?;
            references.push(ReferenceText::new(language.to_uppercase(), texts));
        }

        apply_context(&mut records, &references, &self.codec);
        records.retain(|record| !record.original.is_empty());

        let payload = encode_records(&records)?;
        self.retry
            .run("Update context", || {
                self.service
                    .update_file(file.id, &payload, &path.folder, &path.name, true)
            })
            .await
            .with_context(|| format!("Failed to update context of {}", path))?;

        let forced = collect_forced(&records, &self.codec);
        if forced.is_empty() {
            return Ok(());
        }

        info!("Fix forces count {} for {}", forced.len(), path);
        let payload = encode_records(&forced)?;
        self.retry
            .run("Force translations", || {
                self.service
                    .replace_translations(file.id, &payload, &file.name, true, true)
            })
            .await
            .with_context(|| format!("Failed to force translations of {}", path))?;

        Ok(())
    }

    /// Reattach translations that lost their key to a list-index shift.
    pub async fn repair_shifts(
        &self,
        file: &RemoteFile,
        path: &TranslationPath,
        memory: &TranslationMemory,
    ) -> Result<usize> {
        if memory.is_empty() {
            return Ok(0);
        }

        let records = self
            .retry
            .run("Get translations", || self.service.get_translations(file.id))
            .await
            .with_context(|| format!("Failed to fetch translations of {}", path))?;

        let repaired = repair_shifted(&records, memory, &self.codec);
        if repaired.is_empty() {
            return Ok(0);
        }

        info!("Repair {} shifted translations in {}", repaired.len(), path);
        let payload = encode_records(&repaired)?;
        self.retry
            .run("Repair shifted translations", || {
                self.service
                    .replace_translations(file.id, &payload, &file.name, true, false)
            })
            .await
            .with_context(|| format!("Failed to repair translations of {}", path))?;

        Ok(repaired.len())
    }
}

/// Apply the source-language change list, then optionally refresh context
/// for reference-language changes.
pub async fn update_from_assets<S: TranslationService>(config: &Config, service: &S) -> Result<SyncReport> {
    info!("Start update from assets");

    let assets = AssetStore::new(&config.assets_root);
    let reconciler = Reconciler::new(service, &assets, Languages::from_config(config))
        .with_retry(RetryConfig::rate_limit(config.rate_limit_wait));

    let entries = read_change_list(&config.change_list_path(&config.source_language))?;
    let mut report = reconciler.run(&entries).await?;

    if !config.update_context {
        return Ok(report);
    }

    let remote = reconciler.remote_files().await?;
    for language in &config.reference_languages {
        let entries = read_change_list(&config.change_list_path(language))?;
        reconciler
            .refresh_reference_changes(language, &entries, &remote, &mut report)
            .await?;
    }

    info!("Context refreshed for {} files", report.context_refreshed);
    Ok(report)
}
