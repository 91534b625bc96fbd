//! Configuration management for providers

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Providers whose `<ID>_API_KEY` variable is read from the environment
const ENV_KEYED_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "mistral",
    "groq",
    "deepseek",
    "together",
    "cloudflare",
];

/// Top-level provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Validation defaults
    #[serde(default)]
    pub defaults: ValidationDefaults,
    /// Per-provider settings keyed by provider id
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

/// Defaults applied to every validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDefaults {
    /// Deadline for one whole validation pass
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Deadline for one model test request
    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,
    /// Print per-endpoint diagnostics
    #[serde(default)]
    pub verbose: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_model_timeout_secs() -> u64 {
    DEFAULT_MODEL_TIMEOUT_SECS
}

impl Default for ValidationDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
            verbose: false,
        }
    }
}

/// Settings for a specific provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Credential (overridden by environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override for proxies or self-hosted gateways
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Validation deadline override, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderSettings {
    fn merge(&mut self, other: ProviderSettings) {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
    }
}

/// Loads and validates provider configuration
pub struct ConfigurationManager {
    config: ProvidersConfig,
}

impl ConfigurationManager {
    /// Create a new configuration manager with built-in defaults
    pub fn new() -> Self {
        Self {
            config: ProvidersConfig::default(),
        }
    }

    /// Wrap an existing configuration
    pub fn from_config(config: ProvidersConfig) -> Self {
        Self { config }
    }

    /// Load configuration with proper precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Project config (./.apiprism/config.yaml)
    /// 3. Global config (<config dir>/apiprism/config.yaml)
    /// 4. Built-in defaults (lowest priority)
    pub fn load_with_precedence(&mut self) -> Result<(), ProviderError> {
        if let Some(global) = Self::global_config_path() {
            self.merge_from_file(&global)?;
        }
        self.merge_from_file(&Self::project_config_path())?;
        self.load_from_env()
    }

    /// Global configuration path, if the platform has a config directory
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("apiprism").join("config.yaml"))
    }

    /// Project configuration path
    pub fn project_config_path() -> PathBuf {
        PathBuf::from("./.apiprism/config.yaml")
    }

    /// Apply environment overrides
    ///
    /// Reads a `.env` file when present, then `<PROVIDER>_API_KEY`,
    /// `APIPRISM_PROVIDER_<ID>` and `APIPRISM_TIMEOUT_SECS`.
    pub fn load_from_env(&mut self) -> Result<(), ProviderError> {
        dotenv::dotenv().ok();

        for provider in ENV_KEYED_PROVIDERS {
            let env_var = format!("{}_API_KEY", provider.to_uppercase());
            if let Ok(api_key) = std::env::var(&env_var) {
                debug!("Using {} from environment", env_var);
                self.set_api_key(provider, api_key);
            }
        }

        for (key, value) in std::env::vars() {
            if let Some(provider) = key.strip_prefix("APIPRISM_PROVIDER_") {
                self.set_api_key(&provider.to_lowercase(), value);
            }
        }

        if let Ok(raw) = std::env::var("APIPRISM_TIMEOUT_SECS") {
            self.config.defaults.timeout_secs = raw.trim().parse().map_err(|_| {
                ProviderError::ConfigError(format!(
                    "APIPRISM_TIMEOUT_SECS must be a positive integer, got '{}'",
                    raw
                ))
            })?;
        }

        Ok(())
    }

    fn set_api_key(&mut self, provider: &str, api_key: String) {
        self.config
            .providers
            .entry(provider.to_string())
            .or_default()
            .api_key = Some(api_key);
    }

    /// Replace the current configuration with the contents of a YAML file
    ///
    /// A missing file is not an error.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), ProviderError> {
        if let Some(raw) = Self::read_file(path)? {
            self.config = Self::parse(raw)?;
        }
        Ok(())
    }

    /// Merge a YAML file over the current configuration
    ///
    /// Only values present in the file override existing ones.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<(), ProviderError> {
        let Some(raw) = Self::read_file(path)? else {
            return Ok(());
        };

        let present = |key: &str| {
            raw.get("defaults")
                .and_then(|defaults| defaults.get(key))
                .is_some()
        };
        let override_timeout = present("timeout_secs");
        let override_model_timeout = present("model_timeout_secs");
        let override_verbose = present("verbose");

        let new_config = Self::parse(raw)?;
        if override_timeout {
            self.config.defaults.timeout_secs = new_config.defaults.timeout_secs;
        }
        if override_model_timeout {
            self.config.defaults.model_timeout_secs = new_config.defaults.model_timeout_secs;
        }
        if override_verbose {
            self.config.defaults.verbose = new_config.defaults.verbose;
        }

        for (provider_id, settings) in new_config.providers {
            self.config
                .providers
                .entry(provider_id)
                .or_default()
                .merge(settings);
        }

        Ok(())
    }

    fn read_file(path: &Path) -> Result<Option<serde_yaml::Value>, ProviderError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let raw = serde_yaml::from_str(&content).map_err(|e| {
            ProviderError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        debug!("Loaded provider configuration from {}", path.display());
        Ok(Some(raw))
    }

    fn parse(raw: serde_yaml::Value) -> Result<ProvidersConfig, ProviderError> {
        if raw.is_null() {
            return Ok(ProvidersConfig::default());
        }
        serde_yaml::from_value(raw).map_err(|e| {
            ProviderError::ConfigError(format!("Failed to parse config file: {}", e))
        })
    }

    /// Validate the current configuration
    pub fn validate(&self) -> Result<(), ProviderError> {
        check_timeout("defaults.timeout_secs", self.config.defaults.timeout_secs)?;
        check_timeout(
            "defaults.model_timeout_secs",
            self.config.defaults.model_timeout_secs,
        )?;

        for (provider_id, settings) in &self.config.providers {
            if let Some(timeout) = settings.timeout_secs {
                check_timeout(&format!("providers.{}.timeout_secs", provider_id), timeout)?;
            }

            if let Some(base_url) = &settings.base_url {
                reqwest::Url::parse(base_url).map_err(|e| {
                    ProviderError::ConfigError(format!(
                        "Invalid base_url for provider '{}': {}",
                        provider_id, e
                    ))
                })?;
            }

            if matches!(&settings.api_key, Some(key) if key.trim().is_empty()) {
                return Err(ProviderError::ConfigError(format!(
                    "Empty api_key configured for provider '{}'",
                    provider_id
                )));
            }
        }

        Ok(())
    }

    /// Get the current configuration
    pub fn config(&self) -> &ProvidersConfig {
        &self.config
    }

    /// Get mutable configuration
    pub fn config_mut(&mut self) -> &mut ProvidersConfig {
        &mut self.config
    }

    /// Consume the manager, returning the configuration
    pub fn into_config(self) -> ProvidersConfig {
        self.config
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvidersConfig {
    /// Settings for a provider, if any were configured
    pub fn settings(&self, provider_id: &str) -> Option<&ProviderSettings> {
        self.providers.get(provider_id)
    }

    /// Configured credential for a provider
    pub fn credential_for(&self, provider_id: &str) -> Option<&str> {
        self.settings(provider_id)
            .and_then(|s| s.api_key.as_deref())
            .filter(|key| !key.trim().is_empty())
    }

    /// Base URL override for a provider
    pub fn base_url_for(&self, provider_id: &str) -> Option<&str> {
        self.settings(provider_id)
            .and_then(|s| s.base_url.as_deref())
    }

    /// Validation deadline for a provider
    pub fn timeout_for(&self, provider_id: &str) -> Duration {
        let secs = self
            .settings(provider_id)
            .and_then(|s| s.timeout_secs)
            .unwrap_or(self.defaults.timeout_secs);
        Duration::from_secs(secs)
    }

    /// Deadline for a single model test request
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.model_timeout_secs)
    }
}

fn check_timeout(field: &str, secs: u64) -> Result<(), ProviderError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(ProviderError::ConfigError(format!(
            "{} must be between 1 and {} seconds, got {}",
            field, MAX_TIMEOUT_SECS, secs
        )));
    }
    Ok(())
}
