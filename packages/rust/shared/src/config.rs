//! Application configuration for PaperLens.
//!
//! User config lives at `~/.paperlens/paperlens.toml`.
//! CLI flags (and their environment variables) override config file values,
//! which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PaperLensError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "paperlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".paperlens";

// ---------------------------------------------------------------------------
// Config structs (matching paperlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Language the analysis is written in. Also part of the output file name.
    #[serde(default = "default_language")]
    pub language: String,

    /// Maximum number of concurrent generation calls.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            max_workers: default_max_workers(),
        }
    }
}

fn default_language() -> String {
    "Chinese".into()
}
fn default_max_workers() -> usize {
    1
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "deepseek-chat".into()
}
fn default_request_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Enrich config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime enrichment configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Target language for the generated analysis.
    pub language: String,
    /// Upper bound on concurrent generation calls. Clamped to at least 1.
    pub max_workers: usize,
    /// Model identifier.
    pub model: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl From<&AppConfig> for EnrichConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            language: config.defaults.language.clone(),
            max_workers: config.defaults.max_workers,
            model: config.llm.model.clone(),
            base_url: config.llm.base_url.clone(),
            request_timeout_secs: config.llm.request_timeout_secs,
        }
    }
}

impl EnrichConfig {
    /// Reject parameter combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(PaperLensError::validation("max_workers must be at least 1"));
        }
        if self.language.trim().is_empty() {
            return Err(PaperLensError::validation("language must not be empty"));
        }
        if self.model.trim().is_empty() {
            return Err(PaperLensError::validation("model must not be empty"));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            PaperLensError::config(format!("invalid base_url '{}': {e}", self.base_url))
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.paperlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PaperLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.paperlens/paperlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PaperLensError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PaperLensError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PaperLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PaperLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PaperLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named in the config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(PaperLensError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
