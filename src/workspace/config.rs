//! Configuration primitives for the auto-apply workspace.
//!
//! Stored in a machine-readable TOML file located at
//! `<workspace>/config/config.toml`, where the workspace root is either
//! `$AUTOAPPLY_HOME` or the OS data directory (`AutoApply/`).
//!
//! The config selects the AI backend once at startup and carries the
//! navigation pacing, approval timeout and cache-key policy used by every
//! session.

use serde::{Deserialize, Serialize};

/// Root configuration persisted per installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Backend selection and prompt budgets.
    #[serde(default)]
    pub ai: AiSettings,
    /// Step budget and delays for the form navigator.
    #[serde(default)]
    pub navigation: NavigationSettings,
    /// Human-approval timeout and auto-save toggle.
    #[serde(default)]
    pub approval: ApprovalSettings,
    /// How learned answers are keyed in the question cache.
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Supported AI backends. One local-inference variant, three hosted APIs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Openai,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.2:latest",
            ProviderKind::Openai => "gpt-4o",
            ProviderKind::Anthropic => "claude-3-5-sonnet-20240620",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }
}

/// AI backend preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name; empty picks the backend default.
    #[serde(default)]
    pub model: String,
    /// Custom endpoint for the local backend (or an OpenAI-compatible proxy).
    #[serde(default)]
    pub base_url: String,
    /// API key for hosted backends. Falls back to `AUTOAPPLY_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Hard abort for local-inference calls, in seconds.
    #[serde(default = "default_local_timeout_secs")]
    pub local_timeout_secs: u64,
    /// Character budget for the serialized profile inside answer prompts.
    #[serde(default = "default_prompt_profile_budget")]
    pub prompt_profile_budget_chars: usize,
    /// Character budget for resume text inside extraction prompts.
    #[serde(default = "default_resume_budget")]
    pub resume_budget_chars: usize,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            local_timeout_secs: default_local_timeout_secs(),
            prompt_profile_budget_chars: default_prompt_profile_budget(),
            resume_budget_chars: default_resume_budget(),
        }
    }
}

impl AiSettings {
    pub fn effective_model(&self) -> String {
        if self.model.trim().is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.trim().to_string()
        }
    }

    pub fn effective_base_url(&self) -> String {
        if !self.base_url.trim().is_empty() {
            return self.base_url.trim().trim_end_matches('/').to_string();
        }
        match self.provider {
            ProviderKind::Ollama => "http://127.0.0.1:11434".to_string(),
            ProviderKind::Openai => "https://api.openai.com".to_string(),
            ProviderKind::Anthropic => "https://api.anthropic.com".to_string(),
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com".to_string(),
        }
    }

    pub fn effective_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        env::var(API_KEY_ENV).unwrap_or_default()
    }
}

const fn default_local_timeout_secs() -> u64 {
    120
}

const fn default_prompt_profile_budget() -> usize {
    20_000
}

const fn default_resume_budget() -> usize {
    15_000
}

/// Navigation pacing. Delays are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSettings {
    /// Hard cap on loop iterations per application attempt.
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,
    /// Pause before each step so the form can settle.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Pause after the form reports an inline validation error.
    #[serde(default = "default_validation_retry_delay_ms")]
    pub validation_retry_delay_ms: u64,
    /// Pause when a required field could not be answered.
    #[serde(default = "default_human_action_delay_ms")]
    pub human_action_delay_ms: u64,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            step_delay_ms: default_step_delay_ms(),
            validation_retry_delay_ms: default_validation_retry_delay_ms(),
            human_action_delay_ms: default_human_action_delay_ms(),
        }
    }
}

const fn default_step_budget() -> u32 {
    25
}

const fn default_step_delay_ms() -> u64 {
    1_500
}

const fn default_validation_retry_delay_ms() -> u64 {
    5_000
}

const fn default_human_action_delay_ms() -> u64 {
    5_000
}

/// Human-approval preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// Seconds to wait for a matching response before giving up.
    #[serde(default = "default_approval_timeout_secs")]
    pub timeout_secs: u64,
    /// Save AI answers straight into the cache without asking.
    #[serde(default)]
    pub auto_save: bool,
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_approval_timeout_secs(),
            auto_save: false,
        }
    }
}

const fn default_approval_timeout_secs() -> u64 {
    60
}

/// Cache keying policy for learned answers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSettings {
    /// When false (default) learned answers are stored under the raw
    /// question text while lookups use the normalized key.
    #[serde(default)]
    pub normalize_learned_keys: bool,
}

/// Standard relative path to the config file (resolved per OS at runtime).
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding the workspace root.
pub const HOME_ENV: &str = "AUTOAPPLY_HOME";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "AUTOAPPLY_API_KEY";

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the root directory where auto-apply stores data.
///
/// Order of precedence:
/// 1. `AUTOAPPLY_HOME` environment variable.
/// 2. OS-specific data directory via `directories::BaseDirs`.
pub fn workspace_root() -> Result<PathBuf> {
    if let Ok(path) = env::var(HOME_ENV) {
        return Ok(PathBuf::from(path));
    }
    let base_dirs = BaseDirs::new().context("Unable to determine OS data directory")?;
    Ok(base_dirs.data_dir().join("AutoApply"))
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(workspace_root()?.join("config"))
}

pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from disk or returns defaults.
pub fn load_or_default() -> Result<AppConfig> {
    load_from(&config_file_path()?)
}

/// Loads a configuration file at an explicit path, defaulting when absent.
pub fn load_from(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: AppConfig = toml::from_str(&data)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(cfg)
    } else {
        Ok(AppConfig::default())
    }
}

/// Persists the configuration to disk.
pub fn save(config: &AppConfig) -> Result<PathBuf> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)?;
    let path = config_file_path()?;
    let data = toml::to_string_pretty(config)?;
    fs::write(&path, data).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(path)
}

/// Ensures the workspace structure exists (config/ and data/ directories).
pub fn ensure_workspace_structure() -> Result<WorkspacePaths> {
    WorkspacePaths::at(workspace_root()?)
}

/// Convenience struct exposing important workspace paths.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl WorkspacePaths {
    /// Creates the directory layout under an explicit root.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config_dir = root.join("config");
        let data_dir = root.join("data");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Failed creating config directory {:?}", config_dir))?;
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed creating data directory {:?}", data_dir))?;
        Ok(Self {
            root,
            config_dir,
            data_dir,
        })
    }

    pub fn profiles_file(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }
}
