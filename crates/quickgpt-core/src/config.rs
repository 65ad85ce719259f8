use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const APP_NAME: &str = "QuickGPT";
pub const DEFAULT_HOTKEY: &str = "ctrl+alt+space";
pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

const BUILTIN_MODELS: [&str; 2] = ["gpt-5", "o4-mini"];

/// Startup settings. Read once by the bootstrap; the credential is not part of
/// it because the client re-reads it from the environment on every call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub hotkey: String,
    pub default_model: String,
    pub debug: bool,
    pub api_base_url: String,
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: DEFAULT_HOTKEY.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            debug: false,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            history_path: None,
        }
    }
}

impl Config {
    /// Defaults, then the optional config file, then environment overrides.
    ///
    /// A broken config file degrades to the defaults plus environment
    /// overrides; the error is handed back so the caller can show it.
    pub fn load_or_default() -> (Self, Option<anyhow::Error>) {
        let path = Self::get_config_path().ok();
        Self::load_or_default_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn load_from<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_env(lookup);
        Ok(config)
    }

    pub fn load_or_default_from<F>(path: Option<&Path>, lookup: F) -> (Self, Option<anyhow::Error>)
    where
        F: Fn(&str) -> Option<String>,
    {
        match Self::load_from(path, &lookup) {
            Ok(config) => (config, None),
            Err(e) => {
                tracing::warn!("{e:#}; using defaults");
                let mut config = Self::default();
                config.apply_env(&lookup);
                (config, Some(e))
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {:?}: {}", path, e))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Invalid config {:?}: {}", path, e))?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(hotkey) = non_empty("QUICKGPT_HOTKEY") {
            self.hotkey = hotkey;
        }
        if let Some(model) = non_empty("MODEL") {
            self.default_model = model;
        }
        if let Some(debug) = lookup("QUICKGPT_DEBUG") {
            self.debug = matches!(debug.as_str(), "1" | "true" | "True");
        }
        if let Some(base_url) = non_empty("OPENAI_BASE_URL") {
            self.api_base_url = base_url;
        }
        if let Some(path) = non_empty("QUICKGPT_HISTORY") {
            self.history_path = Some(PathBuf::from(path));
        }
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(|| app_data_dir().join("history.json"))
    }

    /// Models offered in the picker, the configured default first if it is not built in
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<String> = BUILTIN_MODELS.iter().map(|m| m.to_string()).collect();
        if !models.contains(&self.default_model) {
            models.insert(0, self.default_model.clone());
        }
        models
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_NAME).join("config.json"))
    }
}

/// Per-user data directory named after the application.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}
