//! Change lists produced from the asset repository's history.
//!
//! Each line is `TYPE<TAB>assetRelativePath`, where TYPE is `A`, `M` or `D`
//! and the path starts with the language directory (`kr/StoryData/KR_S101.json`).

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::error;

/// How an asset changed between revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Self::Added),
            "M" => Some(Self::Modified),
            "D" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One line of a change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    pub asset_path: String,
}

/// Location of a document in the translation store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationPath {
    /// Folder relative to the language directory, `.` for the top level.
    pub folder: String,
    /// File name with the language prefix removed.
    pub name: String,
}

impl TranslationPath {
    pub fn new(folder: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
        }
    }

    /// Map an asset path such as `kr/StoryData/KR_S101.json` to the store path
    /// `StoryData` / `S101.json`.
    pub fn from_asset_path(asset_path: &str, language: &str) -> Self {
        let relative = asset_path
            .split_once('/')
            .map(|(_, rest)| rest)
            .unwrap_or(asset_path);

        let (folder, file) = match relative.rsplit_once('/') {
            Some((folder, file)) if !folder.is_empty() => (folder, file),
            Some((_, file)) => (".", file),
            None => (".", relative),
        };

        let prefix = format!("{}_", language.to_uppercase());
        let name = file.strip_prefix(&prefix).unwrap_or(file);

        Self::new(folder, name)
    }

    /// Full path as the translation store reports it: `folder/name`, or just
    /// `name` for the top level.
    pub fn full_path(&self) -> String {
        if self.folder == "." || self.folder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.folder, self.name)
        }
    }
}

impl std::fmt::Display for TranslationPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_path())
    }
}

/// Parse change-list content.
///
/// Blank lines are skipped. Lines with an unknown change code are logged and
/// skipped; a line without a tab separator is an error.
pub fn parse_change_list(content: &str) -> Result<Vec<ChangeEntry>> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        let Some((code, asset_path)) = line.split_once('\t') else {
            bail!("Malformed change list line: {:?}", line);
        };

        match ChangeKind::from_code(code) {
            Some(kind) => entries.push(ChangeEntry {
                kind,
                asset_path: asset_path.to_string(),
            }),
            None => error!("Unknown change type {:?} for {}", code, asset_path),
        }
    }

    Ok(entries)
}

/// Read and parse a change list file.
pub fn read_change_list(path: &Path) -> Result<Vec<ChangeEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read change list {}", path.display()))?;
    parse_change_list(&content)
}
