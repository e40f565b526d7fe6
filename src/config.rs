use crate::remote::DEFAULT_API_URL;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    // ParaTranz
    pub paratranz_token: String,
    pub paratranz_project_id: i64,
    pub paratranz_api_url: String,

    // Local layout
    pub assets_root: String,
    pub change_list_dir: String,
    pub export_root: String,

    // Languages
    pub source_language: String,
    pub reference_languages: Vec<String>,

    // Behavior
    pub rate_limit_wait: Duration,
    pub update_context: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            // ParaTranz
            paratranz_token: std::env::var("PARATRANZ_TOKEN")
                .context("PARATRANZ_TOKEN not set")?,
            paratranz_project_id: std::env::var("PARATRANZ_PROJECT_ID")
                .context("PARATRANZ_PROJECT_ID not set")?
                .parse()
                .context("PARATRANZ_PROJECT_ID must be an integer")?,
            paratranz_api_url: std::env::var("PARATRANZ_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),

            // Local layout
            assets_root: std::env::var("ASSETS_ROOT").unwrap_or_else(|_| "Assets".to_string()),
            change_list_dir: std::env::var("CHANGE_LIST_DIR")
                .unwrap_or_else(|_| "dump".to_string()),
            export_root: std::env::var("EXPORT_ROOT")
                .unwrap_or_else(|_| "export/LimbusCompany_Data/Lang/TW".to_string()),

            // Languages
            source_language: std::env::var("SOURCE_LANGUAGE")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|_| "kr".to_string()),
            reference_languages: parse_language_list(
                &std::env::var("REFERENCE_LANGUAGES").unwrap_or_else(|_| "en,jp".to_string()),
            ),

            // Behavior
            rate_limit_wait: Duration::from_secs(
                std::env::var("RATE_LIMIT_WAIT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            update_context: std::env::var("UPDATE_CONTEXT")
                .ok()
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        };

        if !has_two_reference_sections(&config.reference_languages) {
            warn!(
                "REFERENCE_LANGUAGES lists {} languages; context annotations expect two sections",
                config.reference_languages.len()
            );
        }

        Ok(config)
    }

    /// Path of the change list for a language: `<dir>/<lang>_files.txt`.
    pub fn change_list_path(&self, language: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.change_list_dir).join(format!("{}_files.txt", language))
    }
}

/// Split a comma-separated language list, dropping blanks.
fn parse_language_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|code| code.trim().to_lowercase())
        .filter(|code| !code.is_empty())
        .collect()
}

/// Context annotations are rendered as one section per reference language.
fn has_two_reference_sections(languages: &[String]) -> bool {
    languages.len() == 2
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "PARATRANZ_TOKEN",
        "PARATRANZ_PROJECT_ID",
        "PARATRANZ_API_URL",
        "ASSETS_ROOT",
        "CHANGE_LIST_DIR",
        "EXPORT_ROOT",
        "SOURCE_LANGUAGE",
        "REFERENCE_LANGUAGES",
        "RATE_LIMIT_WAIT_SECS",
        "UPDATE_CONTEXT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        std::env::set_var("PARATRANZ_TOKEN", "secret");
        std::env::set_var("PARATRANZ_PROJECT_ID", "6860");

        let config = Config::from_env().unwrap();

        assert_eq!(config.paratranz_token, "secret");
        assert_eq!(config.paratranz_project_id, 6860);
        assert_eq!(config.paratranz_api_url, DEFAULT_API_URL);
        assert_eq!(config.assets_root, "Assets");
        assert_eq!(config.change_list_dir, "dump");
        assert_eq!(config.source_language, "kr");
        assert_eq!(config.reference_languages, vec!["en", "jp"]);
        assert_eq!(config.rate_limit_wait, Duration::from_secs(30));
        assert!(!config.update_context);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("PARATRANZ_TOKEN", "secret");
        std::env::set_var("PARATRANZ_PROJECT_ID", "1");
        std::env::set_var("REFERENCE_LANGUAGES", " EN , ,jp,cn ");
        std::env::set_var("RATE_LIMIT_WAIT_SECS", "5");
        std::env::set_var("UPDATE_CONTEXT", "true");
        std::env::set_var("SOURCE_LANGUAGE", "KR");

        let config = Config::from_env().unwrap();

        assert_eq!(config.reference_languages, vec!["en", "jp", "cn"]);
        assert_eq!(config.rate_limit_wait, Duration::from_secs(5));
        assert!(config.update_context);
        assert_eq!(config.source_language, "kr");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_wait_falls_back() {
        clear_env();
        std::env::set_var("PARATRANZ_TOKEN", "secret");
        std::env::set_var("PARATRANZ_PROJECT_ID", "1");
        std::env::set_var("RATE_LIMIT_WAIT_SECS", "soon");

        let config = Config::from_env().unwrap();
        assert_eq!(config.rate_limit_wait, Duration::from_secs(30));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_missing_token() {
        clear_env();
        std::env::set_var("PARATRANZ_PROJECT_ID", "1");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PARATRANZ_TOKEN"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_project_id() {
        clear_env();
        std::env::set_var("PARATRANZ_TOKEN", "secret");
        std::env::set_var("PARATRANZ_PROJECT_ID", "abc");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_single_reference_language_still_loads() {
        clear_env();
        std::env::set_var("PARATRANZ_TOKEN", "secret");
        std::env::set_var("PARATRANZ_PROJECT_ID", "1");
        std::env::set_var("REFERENCE_LANGUAGES", "en");

        let config = Config::from_env().unwrap();
        assert_eq!(config.reference_languages, vec!["en"]);
        assert!(!has_two_reference_sections(&config.reference_languages));
        clear_env();
    }

    #[test]
    fn test_has_two_reference_sections() {
        assert!(has_two_reference_sections(&["en".to_string(), "jp".to_string()]));
        assert!(!has_two_reference_sections(&["en".to_string()]));
        assert!(!has_two_reference_sections(&[]));
    }

    #[test]
    fn test_change_list_path() {
        let config = Config {
            paratranz_token: "t".to_string(),
            paratranz_project_id: 1,
            paratranz_api_url: DEFAULT_API_URL.to_string(),
            assets_root: "Assets".to_string(),
            change_list_dir: "dump".to_string(),
            export_root: "export".to_string(),
            source_language: "kr".to_string(),
            reference_languages: vec![],
            rate_limit_wait: Duration::from_secs(30),
            update_context: false,
        };
        assert_eq!(
            config.change_list_path("en"),
            std::path::PathBuf::from("dump/en_files.txt")
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
