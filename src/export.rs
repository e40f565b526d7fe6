//! Export of translated asset documents.
//!
//! A language's documents are overlaid with the remote translations and
//! written under the export root, mirroring the remote folder layout.

use crate::assets::AssetStore;
use crate::changes::{read_change_list, TranslationPath};
use crate::config::Config;
use crate::keypath::{KeyPathCodec, TextMap};
use crate::remote::{RemoteFile, TranslationRecord, TranslationService};
use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub translated: usize,
    pub untouched: usize,
    pub missing: usize,
}

pub struct Exporter<'a, S: TranslationService> {
    service: &'a S,
    assets: &'a AssetStore,
    output_root: PathBuf,
    codec: KeyPathCodec,
    retry: RetryConfig,
}

impl<'a, S: TranslationService> Exporter<'a, S> {
    pub fn new(service: &'a S, assets: &'a AssetStore, output_root: impl Into<PathBuf>) -> Self {
        Self {
            service,
            assets,
            output_root: output_root.into(),
            codec: KeyPathCodec::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn output_path(&self, path: &TranslationPath) -> PathBuf {
        let mut file = self.output_root.clone();
        if path.folder != "." && !path.folder.is_empty() {
            file.push(&path.folder);
        }
        file.push(&path.name);
        file
    }

    /// Export one document of `language`. Without a remote file the local
    /// bytes are copied as they are.
    pub async fn export(
        &self,
        language: &str,
        path: &TranslationPath,
        remote: Option<&RemoteFile>,
        report: &mut ExportReport,
    ) -> Result<()> {
        info!("Export {}", path);

        let Some(asset) = self.assets.load_optional(language, path)? else {
            error!("Missing asset file {}", self.assets.document_path(language, path).display());
            report.missing += 1;
            return Ok(());
        };

        let target = self.output_path(path);
        let Some(file) = remote else {
            warn!("Remote file missing for {}", path);
            write_file(&target, &asset.raw)?;
            report.untouched += 1;
            return Ok(());
        };

        let records = self
            .retry
            .run("Get translations", || self.service.get_translations(file.id))
            .await
            .with_context(|| format!("Failed to fetch translations of {}", path))?;

        let patched = self.codec.patch(&asset.document, &export_translations(&records));
        let mut data = serde_json::to_vec(&patched).context("Failed to serialize document")?;
        data.push(b'\n');
        write_file(&target, &data)?;
        report.translated += 1;
        Ok(())
    }
}

/// Translation map for export. Escaped newlines become real ones.
pub fn export_translations(records: &[TranslationRecord]) -> TextMap {
    records
        .iter()
        .map(|record| (record.key.clone(), record.translation.replace("\\n", "\n")))
        .collect()
}

fn write_file(target: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(target, data).with_context(|| format!("Failed to write {}", target.display()))
}

/// Export every document listed in `language`'s change list.
pub async fn export_assets<S: TranslationService>(
    config: &Config,
    service: &S,
    language: &str,
) -> Result<ExportReport> {
    info!("Start export translation assets from lang: {}", language);

    let assets = AssetStore::new(&config.assets_root);
    let exporter = Exporter::new(service, &assets, &config.export_root)
        .with_retry(RetryConfig::rate_limit(config.rate_limit_wait));

    let remote = exporter
        .retry
        .run("List files", || service.list_files())
        .await
        .context("Failed to list remote files")?;
    let entries = read_change_list(&config.change_list_path(language))?;

    let mut report = ExportReport::default();
    for entry in &entries {
        let path = TranslationPath::from_asset_path(&entry.asset_path, language);
        exporter
            .export(language, &path, remote.get(&path.full_path()), &mut report)
            .await?;
    }

    info!(
        "Export finished: {} translated, {} untouched, {} missing",
        report.translated, report.untouched, report.missing
    );
    Ok(report)
}
