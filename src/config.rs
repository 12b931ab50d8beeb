use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::extractor::DEFAULT_GEMINI_MODEL;
use crate::speech::RecognitionOptions;
use crate::store::{CorruptStorePolicy, DEFAULT_STORAGE_KEY};

/// Environment variable that overrides the configured Gemini key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a Gemini API key is required: set GOOGLE_API_KEY or `gemini_api_key` in {0}")]
    MissingApiKey(String),
    #[error("failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Storage slot holding the task list.
    pub storage_key: String,
    pub corrupt_store_policy: CorruptStorePolicy,
    pub speech: RecognitionOptions,
    /// Quiet period after speech that ends a non-continuous session.
    pub silence_timeout_ms: u64,
    /// Opened from the "permission denied" dialog.
    pub settings_uri: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
            corrupt_store_policy: CorruptStorePolicy::default(),
            speech: RecognitionOptions::default(),
            silence_timeout_ms: 1500,
            settings_uri: default_settings_uri(),
        }
    }
}

fn default_settings_uri() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("x-apple.systempreferences:com.apple.preference.security?Privacy_Microphone".into())
    } else {
        None
    }
}

impl Config {
    /// Directory: ~/.config/voice-tasks/
    fn dir() -> PathBuf {
        let mut p = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        p.push("voice-tasks");
        p
    }

    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from disk, returning defaults if file doesn't exist or is invalid,
    /// then apply the environment override.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::path());
        config.apply_env(std::env::var(API_KEY_ENV).ok());
        config
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    fn apply_env(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.gemini_api_key = key.trim().to_string();
        }
    }

    /// The Gemini key, required before the application may start.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.gemini_api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingApiKey(Self::path().display().to_string()));
        }
        Ok(key)
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }
}
