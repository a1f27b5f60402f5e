//! # Application Configuration
//!
//! Defines the configuration structure for `salesbot` and loads it from a
//! `config.yml` file, `${VAR}` substitution and environment variables.

use config::{
    Config as ConfigBuilder, Environment, File, FileFormat, Value as ConfigValue,
    ValueKind as ConfigValueKind,
};
use regex::Regex;
use salesbot::conversation::default_continuation_phrases;
use salesbot::prompts::core::{FOLLOW_UP_PROMPT, SQL_GENERATION_SYSTEM_PROMPT};
use salesbot::types::ProviderConfig;
use salesbot::validator::{default_ambiguous_terms, default_time_keywords, AmbiguousTerm};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::LazyLock;
use tracing::info;

/// The task that turns questions into SQL.
pub const SQL_GENERATION_TASK: &str = "sql_generation";
/// The task that proposes follow-up questions.
pub const FOLLOW_UP_TASK: &str = "follow_up";
/// The provider key the built-in tasks point at.
pub const DEFAULT_PROVIDER_KEY: &str = "default";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(?P<var>[A-Z0-9_]+)\}").unwrap());

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
    /// The path to the SQLite database file. Loaded from `DB_URL` env var.
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// The schemas to introspect, in order.
    #[serde(default = "default_schema_names")]
    pub schema_names: Vec<String>,
    /// Free-form notes about the schema, appended to the prompt.
    #[serde(default)]
    pub schema_hint: Option<String>,
    /// A file holding the schema notes. Used when `schema_hint` is not set.
    #[serde(default)]
    pub schema_hint_file: Option<String>,
    /// A map of named, reusable AI provider configurations.
    pub providers: HashMap<String, ProviderConfig>,
    /// A map of tasks, each specifying a provider and prompt.
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
    #[serde(default = "default_ambiguous_terms")]
    pub ambiguous_terms: Vec<AmbiguousTerm>,
    #[serde(default = "default_time_keywords")]
    pub time_keywords: Vec<String>,
    #[serde(default = "default_continuation_phrases")]
    pub continuation_phrases: Vec<String>,
    /// Result tables longer than this get a scrolling hint.
    #[serde(default = "default_rows_before_scroll")]
    pub rows_before_scroll: usize,
}

fn default_db_url() -> String {
    "db/sales.db".to_string()
}

fn default_schema_names() -> Vec<String> {
    vec!["main".to_string()]
}

fn default_rows_before_scroll() -> usize {
    10
}

/// The provider and prompt for one application task.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskConfig {
    /// The key of the provider to use from the `providers` map.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl AppConfig {
    /// Returns the task configuration, or an empty one if it is not defined.
    pub fn task(&self, name: &str) -> TaskConfig {
        self.tasks.get(name).cloned().unwrap_or_default()
    }

    /// Resolves the provider configuration a task should run on.
    pub fn provider_for(&self, task: &str) -> Result<&ProviderConfig, ConfigError> {
        let key = self
            .task(task)
            .provider
            .unwrap_or_else(|| DEFAULT_PROVIDER_KEY.to_string());
        self.providers.get(&key).ok_or_else(|| {
            ConfigError::General(format!(
                "Provider '{key}' for task '{task}' is not defined under 'providers'."
            ))
        })
    }

    /// The schema notes, read from `schema_hint_file` when not given inline.
    pub fn resolved_schema_hint(&self) -> Result<Option<String>, ConfigError> {
        if let Some(hint) = self.schema_hint.as_ref().filter(|h| !h.trim().is_empty()) {
            return Ok(Some(hint.clone()));
        }
        match &self.schema_hint_file {
            Some(path) if !path.is_empty() => fs::read_to_string(path).map(Some).map_err(|e| {
                ConfigError::General(format!("Failed to read schema hint file '{path}': {e}"))
            }),
            _ => Ok(None),
        }
    }
}

/// Constructs a `config::Value` map of the default tasks from the library prompts.
fn build_default_tasks() -> HashMap<String, ConfigValue> {
    [
        (SQL_GENERATION_TASK, SQL_GENERATION_SYSTEM_PROMPT),
        (FOLLOW_UP_TASK, FOLLOW_UP_PROMPT),
    ]
    .into_iter()
    .map(|(name, prompt)| {
        let mut table = HashMap::new();
        table.insert(
            "provider".to_string(),
            ConfigValue::from(DEFAULT_PROVIDER_KEY),
        );
        table.insert("prompt".to_string(), ConfigValue::from(prompt));
        (
            name.to_string(),
            ConfigValue::new(None, ConfigValueKind::Table(table)),
        )
    })
    .collect()
}

/// Replaces `${VAR}` references with the value of the environment variable,
/// or with nothing when it is unset.
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            env::var(&caps["var"]).unwrap_or_default()
        })
        .into_owned()
}

// Returns Ok(None) if the file does not exist, or an error if it fails to read.
fn read_and_substitute(path: &str) -> Result<Option<String>, ConfigError> {
    if !std::path::Path::new(path).exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::General(format!("Failed to read config file '{path}': {e}")))?;

    Ok(Some(substitute_env_vars(&content)))
}

/// Loads the application configuration from a file and environment variables.
///
/// - Layer 1: the built-in tasks and prompts.
/// - Layer 2: `config_path_override`, else `config.yml` next to the CLI
///   manifest, else `config.{AI_PROVIDER}.yml`.
/// - Layer 3: top-level keys from plain variables (`DB_URL`).
/// - Layer 4: nested keys from `SALESBOT_...` variables
///   (e.g. `SALESBOT_PROVIDERS__DEFAULT__MODEL_NAME`).
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
            let provider = env::var("AI_PROVIDER").unwrap_or_else(|_| "gemini".to_string());
            let fallback_path = format!("{base_path}/config.{provider}.yml");
            info!("'{user_config_path}' not found. Falling back to '{fallback_path}' based on AI_PROVIDER='{provider}'.");
            fallback_path
        }
    };

    let main_content = read_and_substitute(&main_config_path)?.ok_or_else(|| {
        ConfigError::NotFound(format!(
            "Main config file not found at '{main_config_path}'. Please ensure 'config.yml' exists or set AI_PROVIDER to 'gemini' or 'local'."
        ))
    })?;
    builder = builder.add_source(File::from_str(&main_content, FileFormat::Yaml));

    let settings = builder
        .add_source(Environment::default())
        .add_source(
            Environment::with_prefix("SALESBOT")
                .prefix_separator("_")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
