//! Persistent settings for the codemate core.
//!
//! Settings live in `~/.codemate/settings.json` (or a custom directory) and
//! carry the active privacy mode, the exclusion lists, and the completion
//! service endpoint. The editor collaborator pushes changes through
//! [`Settings::update`]; the core never polls.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::privacy::PrivacyMode;

/// Environment variable overriding the completion service endpoint.
pub const ENDPOINT_ENV: &str = "CODEMATE_ENDPOINT";

/// Environment variable overriding the completion service API token.
pub const API_TOKEN_ENV: &str = "CODEMATE_API_TOKEN";

/// Default number of commits pulled into the history layer.
const DEFAULT_MAX_COMMITS: usize = 10;

/// Settings stored in settings.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub privacy_mode: PrivacyMode,
    /// Relative or absolute file paths that must never leave the machine.
    pub excluded_files: BTreeSet<String>,
    /// Directory prefixes excluded recursively.
    pub excluded_dirs: BTreeSet<String>,
    /// Completion service base URL.
    pub endpoint: Option<String>,
    /// Bearer token for the completion service.
    pub api_token: Option<String>,
    /// Model identifier passed through to the completion service.
    pub model: Option<String>,
    /// Commit window for the history layer.
    pub max_commits: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            privacy_mode: PrivacyMode::Balanced,
            excluded_files: BTreeSet::new(),
            excluded_dirs: BTreeSet::new(),
            endpoint: None,
            api_token: None,
            model: None,
            max_commits: DEFAULT_MAX_COMMITS,
        }
    }
}

impl Settings {
    /// Endpoint with the environment override applied.
    pub fn effective_endpoint(&self) -> Option<String> {
        match std::env::var(ENDPOINT_ENV) {
            Ok(url) if !url.is_empty() => Some(url),
            _ => self.endpoint.clone(),
        }
    }

    /// API token with the environment override applied.
    pub fn effective_api_token(&self) -> Option<String> {
        match std::env::var(API_TOKEN_ENV) {
            Ok(token) if !token.is_empty() => Some(token),
            _ => self.api_token.clone(),
        }
    }
}

/// Settings store bound to a settings.json path.
///
/// Mirrors the layout used for session data: one JSON file under the
/// cache directory, created on first save.
pub struct SettingsStore {
    settings_path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Open the store, loading existing settings or falling back to defaults.
    ///
    /// # Arguments
    /// * `cache_dir` - Optional custom cache directory. Defaults to ~/.codemate
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = match cache_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".codemate"),
        };

        std::fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", base_dir))?;

        let settings_path = base_dir.join("settings.json");
        let settings = Self::load_from(&settings_path);

        Ok(Self {
            settings_path,
            settings,
        })
    }

    fn load_from(path: &Path) -> Settings {
        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Settings::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!("Malformed settings file {}: {}", path.display(), e);
                    Settings::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file {}: {}", path.display(), e);
                Settings::default()
            }
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Path of the backing settings file.
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Apply a mutation and persist the result.
    pub fn update(&mut self, mutate: impl FnOnce(&mut Settings)) -> Result<()> {
        mutate(&mut self.settings);
        self.save()
    }

    /// Persist the current settings to disk.
    pub fn save(&self) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&self.settings).context("Failed to serialize settings")?;
        std::fs::write(&self.settings_path, content).with_context(|| {
            format!(
                "Failed to write settings to {}",
                self.settings_path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(Some(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(store.settings().privacy_mode, PrivacyMode::Balanced);
        assert_eq!(store.settings().max_commits, 10);
        assert!(store.settings().excluded_files.is_empty());
    }

    #[test]
    fn test_update_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = SettingsStore::new(Some(temp_dir.path().to_path_buf())).unwrap();
        store
            .update(|s| {
                s.privacy_mode = PrivacyMode::Strict;
                s.excluded_dirs.insert("secrets".to_string());
            })
            .unwrap();

        let reloaded = SettingsStore::new(Some(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(reloaded.settings().privacy_mode, PrivacyMode::Strict);
        assert!(reloaded.settings().excluded_dirs.contains("secrets"));
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("settings.json"), "{not json").unwrap();
        let store = SettingsStore::new(Some(temp_dir.path().to_path_buf())).unwrap();
        assert_eq!(store.settings().privacy_mode, PrivacyMode::Balanced);
    }
}
