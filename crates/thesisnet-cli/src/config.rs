//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thesisnet_core::HttpConfig;
use thesisnet_harvest::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use thesisnet_oai::{Classification, InstitutionSpec, Registry};

/// Global configuration for thesisnet
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub http: HttpSettings,
    pub harvest: HarvestSettings,
    /// Replaces the built-in repository list when non-empty
    pub institutions: Vec<InstitutionSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Prefix the url-encoded target is appended to, e.g. `https://proxy.example/?url=`.
    /// Unset fetches repositories directly.
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub page_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            page_delay_ms: defaults.page_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    /// Pages fetched per institution per harvest request
    pub max_pages: usize,
    pub page_size: usize,
    /// Drop records failing the requested type while harvesting
    pub harvest_time_type_filter: bool,
    /// Default type filter: "thesis", "dissertation" or "all"
    pub type_filter: String,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            harvest_time_type_filter: false,
            type_filter: "all".to_string(),
        }
    }
}

impl HarvestSettings {
    pub fn classification(&self) -> Option<Classification> {
        Classification::from_name(&self.type_filter)
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./thesisnet.toml (current directory)
    /// 2. ~/.config/thesisnet/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("thesisnet.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "thesisnet") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.http.timeout_secs.max(1)),
            page_delay: Duration::from_millis(self.http.page_delay_ms),
        }
    }

    /// Configured institutions, or the built-in list when none are configured.
    pub fn registry(&self) -> Result<Registry> {
        if self.institutions.is_empty() {
            return Ok(Registry::builtin());
        }
        Registry::from_specs(&self.institutions).context("Invalid [[institutions]] entry")
    }
}
