//! Configuration management for aide

pub mod history;

pub use history::{ProjectHistory, ProjectHistoryEntry};

use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::utils::errors::{AideError, ConfigError};
use crate::utils::fs::default_file_types;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured assistant key
pub const API_KEY_ENV: &str = "AIDE_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote model endpoint and credentials
    pub provider: ProviderConfig,
    /// Project scanning settings
    pub scan: ScanConfig,
    /// Size and fan-out limits
    pub limits: LimitsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Configuration for the OpenAI-compatible endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Key used for chat answers
    pub api_key: Option<String>,
    /// Key used for file summaries; falls back to `api_key`
    pub summarizer_api_key: Option<String>,
    /// Base URL of the chat-completion API
    pub base_url: String,
    /// Model answering questions
    pub model: String,
    /// Model asked which files to pull into context
    pub selection_model: String,
    /// Model producing file summaries
    pub summary_model: String,
    /// HTTP request timeout (seconds)
    pub timeout_seconds: u64,
}

/// Scanning configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extensions scanned by default; `*` disables the filter
    pub file_types: Vec<String>,
}

/// Limits on prompt sizes and parallel work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Characters of one file sent for summarization
    pub max_input_chars: usize,
    /// Characters of the assembled system prompt
    pub max_system_chars: usize,
    /// Files the model may pull into one answer
    pub max_selected_files: usize,
    /// Summaries generated at once
    pub summary_concurrency: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or an EnvFilter directive
    pub level: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            summarizer_api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            selection_model: DEFAULT_MODEL.to_string(),
            summary_model: DEFAULT_MODEL.to_string(),
            timeout_seconds: 300, // 5 minutes
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            file_types: default_file_types(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 65_000,
            max_system_chars: 65_000,
            max_selected_files: 5,
            summary_concurrency: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration manager for loading and saving the application configuration
pub struct ConfigManager {
    config: Config,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load the configuration from the default location, creating it with
    /// defaults on first run
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(config_path)
    }

    /// Load the configuration from `config_path`, creating it if missing
    pub fn load_from<P: Into<PathBuf>>(config_path: P) -> Result<Self> {
        let config_path = config_path.into();
        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_path, &default_config)?;
            default_config
        };

        Ok(Self { config, config_path })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory holding aide's config file
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::FileNotFound {
            path: PathBuf::from("config directory"),
        })?;
        Ok(config_dir.join(crate::APP_NAME))
    }

    fn get_config_path() -> Result<PathBuf> {
        let app_config_dir = Self::config_dir()?;
        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir).map_err(|e| ConfigError::WriteError { source: e })?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError { source: e })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError { source: e })
            .map_err(Into::into)
    }

    fn save_config(path: &Path, config: &Config) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError { source: e })?;
            }
        }

        let content =
            toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError { source: e })?;

        fs::write(path, content).map_err(|e| ConfigError::WriteError { source: e })?;

        Ok(())
    }
}

/// Reject anything but an absolute http(s) URL
pub fn validate_base_url(field: &str, base_url: &str) -> Result<()> {
    let url = url::Url::parse(base_url).map_err(|e| {
        AideError::validation(field, format!("Invalid URL '{}': {}", base_url, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AideError::validation(
            field,
            format!("Unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(())
}

impl Config {
    /// Assistant key: `AIDE_API_KEY` wins over the config file
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_key: Option<String>) -> Option<String> {
        env_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.provider.api_key.clone().filter(|key| !key.trim().is_empty()))
    }

    /// Summarizer key from the config file. Blank counts as unset, in which
    /// case the session uses the assistant key.
    pub fn resolve_summarizer_api_key(&self) -> Option<String> {
        self.provider
            .summarizer_api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
    }

    /// Check if the configuration is valid
    pub fn validate(&self) -> Result<()> {
        validate_base_url("provider.base_url", &self.provider.base_url)?;

        for (field, value) in [
            ("provider.model", &self.provider.model),
            ("provider.selection_model", &self.provider.selection_model),
            ("provider.summary_model", &self.provider.summary_model),
        ] {
            if value.trim().is_empty() {
                return Err(AideError::validation(field, "Model name must not be empty"));
            }
        }

        if self.provider.timeout_seconds == 0 {
            return Err(AideError::validation(
                "provider.timeout_seconds",
                "Timeout must be greater than zero",
            ));
        }

        let limits = &self.limits;
        for (field, value) in [
            ("limits.max_input_chars", limits.max_input_chars),
            ("limits.max_system_chars", limits.max_system_chars),
            ("limits.max_selected_files", limits.max_selected_files),
            ("limits.summary_concurrency", limits.summary_concurrency),
        ] {
            if value == 0 {
                return Err(AideError::validation(field, "Value must be greater than zero"));
            }
        }

        Ok(())
    }
}
