//! Bulk substitution across every remote translation.

use crate::config::Config;
use crate::remote::{encode_records, TranslationRecord, TranslationService};
use crate::retry::RetryConfig;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

/// One `from|to` substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

/// Parse `from|to` lines. Only the first `|` splits; blank lines are skipped.
pub fn parse_substitutions(content: &str) -> Result<Vec<Substitution>> {
    let mut substitutions = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((from, to)) = line.split_once('|') else {
            bail!("Malformed replace line: {:?}", line);
        };
        if from.is_empty() {
            bail!("Empty search text in replace line: {:?}", line);
        }
        substitutions.push(Substitution {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(substitutions)
}

/// Apply substitutions to translations, returning only the records that changed.
pub fn apply_substitutions(records: &[TranslationRecord], substitutions: &[Substitution]) -> Vec<TranslationRecord> {
    records
        .iter()
        .filter_map(|record| {
            let mut translation = record.translation.clone();
            for substitution in substitutions {
                if translation.contains(&substitution.from) {
                    translation = translation.replace(&substitution.from, &substitution.to);
                }
            }
            (translation != record.translation).then(|| TranslationRecord {
                translation,
                ..record.clone()
            })
        })
        .collect()
}

/// Rewrite translations in every remote file. Returns the number of changed records.
pub async fn replace_translations<S: TranslationService>(
    service: &S,
    substitutions: &[Substitution],
    retry: &RetryConfig,
) -> Result<usize> {
    let files = retry
        .run("List files", || service.list_files())
        .await
        .context("Failed to list remote files")?;

    let mut total = 0;
    for file in files.values() {
        let records = retry
            .run("Get translations", || service.get_translations(file.id))
            .await
            .with_context(|| format!("Failed to fetch translations of {}", file.name))?;

        let changed = apply_substitutions(&records, substitutions);
        if changed.is_empty() {
            continue;
        }

        info!("Change translation {} ({} records)", file.name, changed.len());
        let payload = encode_records(&changed)?;
        retry
            .run("Replace translations", || {
                service.replace_translations(file.id, &payload, &file.name, true, false)
            })
            .await
            .with_context(|| format!("Failed to write translations of {}", file.name))?;
        total += changed.len();
    }

    Ok(total)
}

/// Read the substitution file and apply it to every remote file.
pub async fn replace_from_file<S: TranslationService>(config: &Config, service: &S, path: &Path) -> Result<usize> {
    info!("Start replace translation from file: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read replace file {}", path.display()))?;
    let substitutions = parse_substitutions(&content)?;

    let total = replace_translations(service, &substitutions, &RetryConfig::rate_limit(config.rate_limit_wait)).await?;
    info!("Replaced translations in {} records", total);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{Call, MemoryService};
    use std::time::Duration;

    fn record(key: &str, translation: &str) -> TranslationRecord {
        TranslationRecord {
            id: 0,
            key: key.to_string(),
            original: "orig".to_string(),
            translation: translation.to_string(),
            stage: 1,
            context: String::new(),
        }
    }

    fn substitution(from: &str, to: &str) -> Substitution {
        Substitution {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_substitutions() {
        let parsed = parse_substitutions("黑獸|黑兽\n\nLCB|邊獄公司|x\n").unwrap();
        assert_eq!(
            parsed,
            vec![substitution("黑獸", "黑兽"), substitution("LCB", "邊獄公司|x")]
        );
    }

    #[test]
    fn test_parse_rejects_line_without_separator() {
        assert!(parse_substitutions("a|b\nbroken\n").is_err());
    }

    // ==================== Apply Tests ====================

    #[test]
    fn test_apply_returns_only_changed_records() {
        let records = vec![record("k1", "foo bar"), record("k2", "baz"), record("k3", "")];
        let changed = apply_substitutions(&records, &[substitution("foo", "qux")]);

        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].key, "k1");
        assert_eq!(changed[0].translation, "qux bar");
    }

    #[test]
    fn test_apply_chains_substitutions_in_order() {
        let records = vec![record("k1", "a")];
        let changed = apply_substitutions(&records, &[substitution("a", "b"), substitution("b", "c")]);
        assert_eq!(changed[0].translation, "c");
    }

    #[test]
    fn test_apply_ignores_no_op_substitution() {
        let records = vec![record("k1", "same")];
        assert!(apply_substitutions(&records, &[substitution("same", "same")]).is_empty());
    }

    // ==================== Remote Tests ====================

    #[tokio::test]
    async fn test_replace_writes_changed_records_without_force() {
        let service = MemoryService::new();
        let file = service.insert_file("Story", "a.json", vec![record("k1", "old"), record("k2", "keep")]);
        service.insert_file(".", "b.json", vec![record("k1", "keep")]);

        let total = replace_translations(&service, &[substitution("old", "new")], &RetryConfig::new(Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(total, 1);
        let mutations = service.mutations();
        assert_eq!(mutations.len(), 1);
        match &mutations[0] {
            Call::Replace { id, name, raw_format, force, .. } => {
                assert_eq!(*id, file.id);
                assert_eq!(name, "Story/a.json");
                assert!(raw_format);
                assert!(!force);
            }
            other => panic!("expected replace, got {:?}", other),
        }
        assert_eq!(service.records(file.id)[0].translation, "new");
    }
}
