//! epub-translate configuration management.

use crate::epub::DEFAULT_EXCLUDED_KEYWORDS;
use crate::error::Error;
use crate::lang;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use translate_client::TransportConfig;

/// What to do with a single segment longer than the transport accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OversizedPolicy {
    /// Cut at sentence, clause or word boundaries and translate the pieces
    #[default]
    Split,
    /// Abort the run
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpubTranslateConfig {
    /// Source language name or code; "auto" lets the service detect it
    #[serde(default = "default_source_lang")]
    pub source_lang: String,

    /// Target language name or code
    #[serde(default = "default_target_lang")]
    pub target_lang: String,

    /// Documents whose path contains one of these are left untranslated
    #[serde(default = "default_excluded_keywords")]
    pub excluded_keywords: Vec<String>,

    #[serde(default)]
    pub oversized_policy: OversizedPolicy,

    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_source_lang() -> String {
    lang::AUTO.to_string()
}

fn default_target_lang() -> String {
    "en".to_string()
}

fn default_excluded_keywords() -> Vec<String> {
    DEFAULT_EXCLUDED_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

impl Default for EpubTranslateConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            excluded_keywords: default_excluded_keywords(),
            oversized_policy: OversizedPolicy::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl EpubTranslateConfig {
    /// Get the config file path: ~/.config/cli-programs/epub-translate.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("cli-programs")
            .join("epub-translate.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: EpubTranslateConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Languages resolved to service codes and transport limits checked.
    pub fn validate(&self) -> crate::error::Result<()> {
        lang::normalize_source(&self.source_lang)?;
        lang::normalize_target(&self.target_lang)?;
        self.transport
            .validate()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EpubTranslateConfig::default();
        assert_eq!(config.source_lang, "auto");
        assert_eq!(config.target_lang, "en");
        assert_eq!(config.oversized_policy, OversizedPolicy::Split);
        assert_eq!(config.excluded_keywords.len(), 7);
        assert_eq!(config.transport.retry_attempts, 3);
        assert_eq!(config.transport.max_input_length, 4950);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = EpubTranslateConfig::config_path();
        assert!(path.is_ok());
        let path = path.unwrap();
        assert!(path.ends_with("cli-programs/epub-translate.toml"));
    }

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
source_lang = "Korean"
target_lang = "German"
excluded_keywords = ["toc", "colophon"]
oversized_policy = "reject"

[transport]
retry_attempts = 5
cooldown_seconds = 2.5
bridge_url = "http://127.0.0.1:9515/translate"
"#;
        let config: EpubTranslateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.source_lang, "Korean");
        assert_eq!(config.excluded_keywords, vec!["toc", "colophon"]);
        assert_eq!(config.oversized_policy, OversizedPolicy::Reject);
        assert_eq!(config.transport.retry_attempts, 5);
        assert_eq!(config.transport.cooldown_seconds, 2.5);
        assert_eq!(config.transport.base_timeout_seconds, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: EpubTranslateConfig = toml::from_str("").unwrap();
        assert_eq!(config, EpubTranslateConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EpubTranslateConfig::default();
        config.target_lang = "auto".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EpubTranslateConfig::default();
        config.transport.max_input_length = 6000;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("epub-translate.toml");

        let mut config = EpubTranslateConfig::default();
        config.target_lang = "de".to_string();
        config.transport.bridge_url = Some("http://localhost:9515/translate".to_string());
        config.save_to(&path).unwrap();

        let loaded = EpubTranslateConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = EpubTranslateConfig::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(loaded, EpubTranslateConfig::default());
    }
}
