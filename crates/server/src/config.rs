//! # Application Configuration
//!
//! The configuration structure for `excelqa-server` and the logic for loading it
//! from layered YAML files and environment variables.

use crate::auth::UserEntry;
use config::{
    Config as ConfigBuilder, Environment, File, FileFormat, Value as ConfigValue,
    ValueKind as ConfigValueKind,
};
use excelqa::{
    constants::{DEFAULT_DATASET_PATH, DEFAULT_DATA_DIR, DEFAULT_DB_FILE, DEFAULT_UPLOADS_DIR},
    prompts::{tasks::*, DATA_AGENT_TASK, QA_SYNTHESIS_TASK},
    settings::QaSettings,
};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use tracing::info;

/// A custom error type for configuration issues.
#[derive(Debug)]
pub enum ConfigError {
    /// Indicates an error from the underlying `config` crate.
    General(String),
    /// Indicates a required configuration file was not found.
    NotFound(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::General(msg) => write!(f, "Configuration error: {msg}"),
            ConfigError::NotFound(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::General(err.to_string())
    }
}

/// The root configuration structure, mapping directly to `config.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// The port for the server to listen on. Loaded from `PORT` env var.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The database probed for native vector search. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Directory holding the backing copy of the current dataset.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory where uploaded files are saved under their own names.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
    /// Dataset loaded on startup when no backing copy exists.
    #[serde(default = "default_dataset_path")]
    pub default_dataset_path: String,
    /// Public base URL used to build the `file_url` of uploads.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Configuration for the embedding model. Without it, retrieval is keyword-only.
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
    /// A map of named, reusable AI provider configurations.
    pub providers: HashMap<String, ProviderConfig>,
    /// A map of tasks, each specifying a provider and prompts.
    pub tasks: HashMap<String, TaskConfig>,
    /// Tunables of the question-answering core.
    #[serde(default)]
    pub qa: QaSettings,
    /// The credential table checked by `/login`.
    #[serde(default)]
    pub users: HashMap<String, UserEntry>,
}

fn default_port() -> u16 {
    8000
}
fn default_db_url() -> String {
    DEFAULT_DB_FILE.to_string()
}
fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}
fn default_uploads_dir() -> String {
    DEFAULT_UPLOADS_DIR.to_string()
}
fn default_dataset_path() -> String {
    DEFAULT_DATASET_PATH.to_string()
}
fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

/// Configuration for the embedding model provider.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Expected vector length. Rows whose vectors differ are indexed by keyword only.
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    250
}

/// A reusable configuration for a specific AI provider instance.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// The type of provider ("gemini" or "local").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it is derived from the model name.
    pub api_url: Option<String>,
    /// The API key, which can be null for local providers.
    pub api_key: Option<String>,
    pub model_name: String,
}

/// Defines the prompts and provider for a specific application task.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskConfig {
    /// The key of the provider to use from the `providers` map.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// The default tasks from the library, used as the base configuration layer.
fn build_default_tasks() -> HashMap<String, ConfigValue> {
    let tasks = [
        (
            QA_SYNTHESIS_TASK,
            (
                "default",
                QA_SYNTHESIS_SYSTEM_PROMPT,
                QA_SYNTHESIS_USER_PROMPT,
            ),
        ),
        (
            DATA_AGENT_TASK,
            (
                "default",
                DATA_AGENT_SYSTEM_PROMPT,
                DATA_AGENT_USER_PROMPT,
            ),
        ),
    ];

    tasks
        .into_iter()
        .map(|(name, (provider, sys, user))| {
            let mut table = HashMap::new();
            table.insert("provider".to_string(), ConfigValue::from(provider));
            table.insert("system_prompt".to_string(), ConfigValue::from(sys));
            table.insert("user_prompt".to_string(), ConfigValue::from(user));
            (
                name.to_string(),
                ConfigValue::new(None, ConfigValueKind::Table(table)),
            )
        })
        .collect()
}

/// Replaces `${VAR}` references with the value of the environment variable.
/// Unset variables become empty strings.
pub fn substitute_env(content: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}")
        .map_err(|e| ConfigError::General(format!("Invalid substitution pattern: {e}")))?;
    let expanded = re.replace_all(content, |caps: &regex::Captures| {
        env::var(&caps["var"]).unwrap_or_default()
    });
    Ok(expanded.into_owned())
}

// Returns Ok(None) if the file does not exist.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    substitute_env(&content).map(Some)
}

/// Loads the application configuration from files and environment variables.
///
/// Layers, lowest precedence first:
/// 1. The library's default task prompts.
/// 2. `config.yml`, or `config.<AI_PROVIDER>.yml` when it does not exist.
/// 3. An optional `prompt.yml` with prompt overrides.
/// 4. Plain environment variables for top-level keys (`PORT`, `DB_URL`, ...).
/// 5. `EXCELQA_` prefixed variables for nested keys (e.g. `EXCELQA_QA__TOP_K`).
///
/// `${VAR}` references in the YAML files are substituted from the environment.
pub fn get_config(config_path_override: Option<&str>) -> Result<AppConfig, ConfigError> {
    let base_path = env!("CARGO_MANIFEST_DIR");
    let mut builder = ConfigBuilder::builder().set_default("tasks", build_default_tasks())?;

    let main_config_path = if let Some(override_path) = config_path_override {
        override_path.to_string()
    } else {
        let user_config_path = format!("{base_path}/config.yml");
        if std::path::Path::new(&user_config_path).exists() {
            info!("Loading user-defined configuration from '{user_config_path}'.");
            user_config_path
        } else {
            let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "local".to_string());
            let fallback_path = format!("{base_path}/config.{provider}.yml");
            info!("'{user_config_path}' not found. Falling back to '{fallback_path}' based on AI_PROVIDER='{provider}'.");
            fallback_path
        }
    };

    let main_content = read_and_substitute(&main_config_path)?
        .ok_or_else(|| ConfigError::NotFound(format!("Main config file not found at '{main_config_path}'. Please ensure 'config.yml' exists or your AI_PROVIDER is set to load a valid template ('local' or 'gemini').")))?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    // Prompt overrides sit next to the main config file.
    let prompt_dir = std::path::Path::new(&main_config_path)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| base_path.to_string());
    let user_prompt_path = format!("{prompt_dir}/prompt.yml");
    if let Some(user_prompts_content) = read_and_substitute(&user_prompt_path)? {
        info!("Loading user prompt overrides from '{user_prompt_path}'.");
        builder = builder.add_source(File::from_str(&user_prompts_content, FileFormat::Yaml));
    }

    let settings = builder
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("EXCELQA")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut config: AppConfig = settings.try_deserialize()?;

    // An unset `${SERVER_URL}` substitutes to an empty string.
    if config.server_url.is_empty() {
        config.server_url = default_server_url();
    }

    Ok(config)
}
