//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub retry: RetryConfig,
    pub safety: SafetyConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Generation defaults applied to every request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Label of the model variant used when a request names none
    #[serde(default = "default_model_label")]
    pub default_model: String,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,
    #[serde(default = "default_aspect_ratio")]
    pub default_aspect_ratio: String,
    /// Timeout for fetching reference images given as URLs
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
}

fn default_model_label() -> String {
    "standard".to_string()
}

fn default_max_batch_size() -> u32 {
    4
}

fn default_aspect_ratio() -> String {
    "3:4".to_string()
}

fn default_fetch_timeout() -> u64 {
    15000
}

/// Retry countdown configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_countdown_ticks")]
    pub countdown_ticks: u32,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_countdown_ticks() -> u32 {
    2
}

fn default_tick_ms() -> u64 {
    1000
}

/// Moderation tracking configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetyConfig {
    /// Violations tolerated before an owner is suspended
    #[serde(default = "default_max_warnings")]
    pub max_warnings: u32,
    /// Threshold sent to the remote capability for every harm category
    #[serde(default = "default_harm_threshold")]
    pub harm_block_threshold: String,
}

fn default_max_warnings() -> u32 {
    3
}

fn default_harm_threshold() -> String {
    "BLOCK_ONLY_HIGH".to_string()
}

/// In-memory history configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize {
    200
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// A remote model variant
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    /// Label exposed to callers and recorded in history
    pub name: String,

    /// Model identifier sent to the remote capability
    pub model: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    120000
}

impl ModelConfig {
    /// Resolve the API key, preferring the environment variable
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            model: String::new(),
            endpoint: default_endpoint(),
            enabled: true,
            api_key_env: None,
            api_key: None,
            timeout_ms: default_timeout(),
        }
    }
}

/// YAML model variants file structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ModelsConfig {
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_paths("config/orchestrator.yaml", Some("config/models.yaml"))
    }

    /// Load settings from a main config file and an optional model variants file
    pub fn load_from_paths<P: AsRef<Path>>(main_config: P, models_config: Option<P>) -> Result<Self> {
        let main_path = main_config.as_ref();

        let format = if main_path
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let mut config_builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("generation.default_model", default_model_label())?
            .set_default("generation.max_batch_size", default_max_batch_size())?
            .set_default("generation.default_aspect_ratio", default_aspect_ratio())?
            .set_default("generation.fetch_timeout_ms", default_fetch_timeout())?
            .set_default("retry.countdown_ticks", default_countdown_ticks())?
            .set_default("retry.tick_ms", default_tick_ms())?
            .set_default("safety.max_warnings", default_max_warnings())?
            .set_default("safety.harm_block_threshold", default_harm_threshold())?
            .set_default("history.capacity", default_history_capacity() as u64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        if main_path.exists() {
            config_builder = config_builder.add_source(File::from(main_path).format(format));
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("FASHION_GEN")
                .separator("__")
                .try_parsing(true),
        );

        let config = config_builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;

        if let Some(models_path) = models_config {
            let models_path = models_path.as_ref();
            if models_path.exists() {
                settings.models = Self::load_models_config(models_path)?.models;
            }
        }

        Ok(settings)
    }

    /// Load model variants from a YAML file
    pub fn load_models_config<P: AsRef<Path>>(path: P) -> Result<ModelsConfig> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to read models config: {}",
                e
            )))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(config::ConfigError::Message(format!(
                "Failed to parse models config: {}",
                e
            )))
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.generation.max_batch_size == 0 {
            return Err(invalid("generation.max_batch_size must be at least 1"));
        }

        for model in &self.models {
            if model.name.is_empty() {
                return Err(invalid("Model variant name cannot be empty"));
            }
            if model.model.is_empty() {
                return Err(invalid(&format!(
                    "Model variant '{}' must name a model identifier",
                    model.name
                )));
            }
            if model.endpoint.is_empty() {
                return Err(invalid(&format!(
                    "Model variant '{}' must have an endpoint",
                    model.name
                )));
            }
        }

        if !self.models.is_empty()
            && !self
                .get_enabled_models()
                .iter()
                .any(|m| m.name == self.generation.default_model)
        {
            return Err(invalid(&format!(
                "Default model '{}' is not an enabled variant",
                self.generation.default_model
            )));
        }

        Ok(())
    }

    /// Get enabled model variants
    pub fn get_enabled_models(&self) -> Vec<&ModelConfig> {
        self.models.iter().filter(|m| m.enabled).collect()
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            generation: GenerationConfig {
                default_model: default_model_label(),
                max_batch_size: default_max_batch_size(),
                default_aspect_ratio: default_aspect_ratio(),
                fetch_timeout_ms: default_fetch_timeout(),
            },
            retry: RetryConfig {
                countdown_ticks: default_countdown_ticks(),
                tick_ms: default_tick_ms(),
            },
            safety: SafetyConfig {
                max_warnings: default_max_warnings(),
                harm_block_threshold: default_harm_threshold(),
            },
            history: HistoryConfig {
                capacity: default_history_capacity(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            models: vec![],
        }
    }
}
