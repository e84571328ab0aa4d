//! Pipeline settings and their JSON persistence.
//!
//! Settings live in `<config dir>/sortbox/settings.json` (XDG or platform
//! equivalent). Missing fields fall back to their defaults, so a partial file
//! is valid.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::ai::OPENAI_BASE_URL;

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("could not determine a configuration directory")]
    NoConfigDir,
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// AI engine configuration.
    pub ai: AiSettings,
    /// Categorization pipeline tuning.
    pub pipeline: PipelineSettings,
    /// Database and keychain locations.
    pub storage: StorageSettings,
}

/// AI engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// OpenAI-compatible endpoint.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Keychain identifier for the API key; `None` for keyless local servers.
    pub api_key_keychain_id: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in a response.
    pub max_tokens: Option<usize>,
    /// Context window override for models the provider does not know.
    pub context_length: Option<usize>,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: OPENAI_BASE_URL.to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_keychain_id: Some("openai".to_string()),
            temperature: 0.0,
            max_tokens: Some(2048),
            context_length: None,
        }
    }
}

/// Categorization pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Messages scanned per discovery page.
    pub page_size: u32,
    /// Snippets per sender sent with the batch request.
    pub batch_snippets_per_sender: usize,
    /// Maximum characters per snippet.
    pub snippet_max_chars: usize,
    /// Recent messages fetched per sender in the fallback pass.
    pub fallback_snippet_limit: u32,
    /// Concurrent fallback classifications (clamped to 1..=5).
    pub fallback_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_snippets_per_sender: 3,
            snippet_max_chars: 300,
            fallback_snippet_limit: 3,
            fallback_concurrency: 1,
        }
    }
}

/// Database and keychain locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file; defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    /// Keychain service name; defaults to `sortbox`.
    pub keychain_service: Option<String>,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "sortbox")
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("settings.json"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Default database location.
    pub fn default_database_path() -> Result<PathBuf, SettingsError> {
        project_dirs()
            .map(|dirs| dirs.data_dir().join("sortbox.db"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Loads settings from `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Loads settings from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Writes settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Database path, falling back to the platform data directory.
    pub fn database_path(&self) -> Result<PathBuf, SettingsError> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_database_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.pipeline.page_size, 100);
        assert_eq!(settings.pipeline.fallback_snippet_limit, 3);
        assert_eq!(settings.pipeline.fallback_concurrency, 1);
        assert_eq!(settings.ai.base_url, OPENAI_BASE_URL);
        assert!(settings.storage.database_path.is_none());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let json = r#"{"pipeline": {"page_size": 25}, "ai": {"model": "llama3.1"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.pipeline.page_size, 25);
        assert_eq!(settings.pipeline.snippet_max_chars, 300);
        assert_eq!(settings.ai.model, "llama3.1");
        assert_eq!(settings.ai.base_url, OPENAI_BASE_URL);
        assert!(settings.ai.context_length.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.ai.base_url = "http://localhost:11434/v1".to_string();
        settings.ai.api_key_keychain_id = None;
        settings.ai.context_length = Some(32_768);
        settings.pipeline.fallback_concurrency = 3;
        settings.storage.database_path = Some(dir.path().join("db.sqlite"));

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();

        assert_eq!(loaded, settings);
        assert_eq!(loaded.database_path().unwrap(), dir.path().join("db.sqlite"));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::load_or_default(&path),
            Err(SettingsError::Parse(_))
        ));
    }
}
