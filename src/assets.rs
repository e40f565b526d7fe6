//! Per-language asset document storage.
//!
//! Documents live at `<root>/<lang>/<folder>/<LANG>_<name>`, e.g.
//! `Assets/en/StoryData/EN_S101.json`.

use crate::changes::TranslationPath;
use crate::keypath::{AssetDocument, KeyPathCodec, TextMap};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A document together with the exact bytes it was read from.
#[derive(Debug, Clone)]
pub struct LoadedAsset {
    pub raw: Vec<u8>,
    pub document: AssetDocument,
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location of a language's copy of the document at `path`.
    pub fn document_path(&self, language: &str, path: &TranslationPath) -> PathBuf {
        let mut file = self.root.join(language);
        if path.folder != "." && !path.folder.is_empty() {
            file.push(&path.folder);
        }
        file.push(format!("{}_{}", language.to_uppercase(), path.name));
        file
    }

    /// Load a document that must exist.
    pub fn load(&self, language: &str, path: &TranslationPath) -> Result<LoadedAsset> {
        let file = self.document_path(language, path);
        let raw = std::fs::read(&file)
            .with_context(|| format!("Failed to read asset {}", file.display()))?;
        parse(raw, &file)
    }

    /// Load a document that may be absent. Read failures yield `None`;
    /// a document that exists but is not valid JSON is still an error.
    pub fn load_optional(&self, language: &str, path: &TranslationPath) -> Result<Option<LoadedAsset>> {
        let file = self.document_path(language, path);
        match std::fs::read(&file) {
            Ok(raw) => parse(raw, &file).map(Some),
            Err(e) => {
                debug!("Reference asset {} unavailable: {}", file.display(), e);
                Ok(None)
            }
        }
    }

    /// Flattened text of an optional document; a missing document maps to an
    /// empty map.
    pub fn load_text_map(
        &self,
        language: &str,
        path: &TranslationPath,
        codec: &KeyPathCodec,
    ) -> Result<TextMap> {
        Ok(self
            .load_optional(language, path)?
            .map(|asset| codec.flatten(&asset.document))
            .unwrap_or_default())
    }
}

fn parse(raw: Vec<u8>, file: &Path) -> Result<LoadedAsset> {
    let document = AssetDocument::from_slice(&raw)
        .with_context(|| format!("Failed to parse asset {}", file.display()))?;
    Ok(LoadedAsset { raw, document })
}
