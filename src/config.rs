//! Configuration for rivalbrief.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (OPENAI_*, RIVALBRIEF_*)
//! 2. Config file (.rivalbrief/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .rivalbrief/config.yaml
//! - Falls back to ~/.rivalbrief/config.yaml
//!
//! The API key is only ever read from the environment.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::openai::{ApiMode, DEFAULT_BASE_URL};
use crate::core::run_cache::{DEFAULT_MAX_RECENT_RUNS, DEFAULT_TTL_SECONDS};
use crate::core::SafetyLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const CONFIG_DIR: &str = ".rivalbrief";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3000";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub agent: AgentFileConfig,
    #[serde(default)]
    pub cache: CacheFileConfig,
    #[serde(default)]
    pub safety: Option<SafetyLimits>,
    #[serde(default)]
    pub server: ServerFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_mode: Option<ApiMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheFileConfig {
    pub ttl_seconds: Option<u64>,
    pub max_recent_runs: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerFileConfig {
    pub address: Option<String>,
}

/// Agent runtime settings
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Base URL came from env or file rather than the default
    pub base_url_explicit: bool,
    pub model: Option<String>,
    pub api_mode: ApiMode,
}

impl AgentSettings {
    /// Credential precondition for executing roles
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.base_url_explicit
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl_seconds: u64,
    pub max_recent_runs: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL_SECONDS as u64,
            max_recent_runs: DEFAULT_MAX_RECENT_RUNS,
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub agent: AgentSettings,
    pub cache: CacheSettings,
    pub safety: SafetyLimits,
    pub address: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR).join("config.yaml");
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let home_config = dirs::home_dir()?.join(CONFIG_DIR).join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge file values with environment lookups
fn resolve(
    file: ConfigFile,
    config_file: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let env_base_url = non_empty("OPENAI_BASE_URL");
    let base_url_explicit = env_base_url.is_some() || file.agent.base_url.is_some();
    let base_url = env_base_url
        .or(file.agent.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let api_mode = match non_empty("OPENAI_API_MODE") {
        Some(raw) => raw
            .parse::<ApiMode>()
            .map_err(anyhow::Error::msg)
            .context("Invalid OPENAI_API_MODE")?,
        None => file.agent.api_mode.unwrap_or_default(),
    };

    let agent = AgentSettings {
        api_key: non_empty("OPENAI_API_KEY"),
        base_url,
        base_url_explicit,
        model: non_empty("OPENAI_MODEL").or(file.agent.model),
        api_mode,
    };

    let ttl_seconds = match non_empty("RIVALBRIEF_CACHE_TTL_SECONDS") {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid RIVALBRIEF_CACHE_TTL_SECONDS: {}", raw))?,
        None => file.cache.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS as u64),
    };
    let cache = CacheSettings {
        ttl_seconds,
        max_recent_runs: file
            .cache
            .max_recent_runs
            .unwrap_or(DEFAULT_MAX_RECENT_RUNS),
    };

    let mut safety = file.safety.unwrap_or_default();
    if let Some(raw) = non_empty("RIVALBRIEF_STAGE_TIMEOUT_SECONDS") {
        safety.stage_timeout_seconds = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid RIVALBRIEF_STAGE_TIMEOUT_SECONDS: {}", raw))?;
    }

    let address = non_empty("RIVALBRIEF_ADDRESS")
        .or(file.server.address)
        .unwrap_or_else(|| DEFAULT_ADDRESS.to_string());

    Ok(ResolvedConfig {
        agent,
        cache,
        safety,
        address,
        config_file,
    })
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    resolve(file, config_file, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
