use crate::error::{ConfigError, ProviderError};
use crate::providers::ProviderId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the JSON store - computed, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Set when this load wrote a fresh default file.
    #[serde(skip)]
    pub created: bool,

    #[serde(default = "default_provider")]
    pub provider: String,
    /// Explicit model; when unset the catalog picks one.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub on_device: OnDeviceConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

fn default_provider() -> String {
    ProviderId::OpenAi.to_string()
}

fn default_language() -> String {
    "en".into()
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            created: false,
            provider: default_provider(),
            model: None,
            language: default_language(),
            custom_prompt: None,
            log_level: default_log_level(),
            providers: ProvidersConfig::default(),
            on_device: OnDeviceConfig::default(),
            catalog: CatalogConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// One `[providers.<id>]` table per network provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnDeviceConfig {
    /// Ollama daemon URL; `http://localhost:11434` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Quiet period before a credential change triggers model discovery.
    #[serde(default = "default_refresh_debounce_ms")]
    pub refresh_debounce_ms: u64,
}

fn default_refresh_debounce_ms() -> u64 {
    1000
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            refresh_debounce_ms: default_refresh_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Config {
    pub fn provider_id(&self) -> Result<ProviderId, ProviderError> {
        ProviderId::parse(&self.provider)
    }

    /// Settings table for a network provider; `None` for on-device.
    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        match id {
            ProviderId::OpenAi => Some(&self.providers.openai),
            ProviderId::Anthropic => Some(&self.providers.anthropic),
            ProviderId::Gemini => Some(&self.providers.gemini),
            ProviderId::OnDevice => None,
        }
    }

    pub fn provider_config_mut(&mut self, id: ProviderId) -> Option<&mut ProviderConfig> {
        match id {
            ProviderId::OpenAi => Some(&mut self.providers.openai),
            ProviderId::Anthropic => Some(&mut self.providers.anthropic),
            ProviderId::Gemini => Some(&mut self.providers.gemini),
            ProviderId::OnDevice => None,
        }
    }

    pub fn credential(&self, id: ProviderId) -> Option<&str> {
        self.provider_config(id)
            .and_then(|p| p.api_key.as_deref())
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn base_url(&self, id: ProviderId) -> Option<&str> {
        match id {
            ProviderId::OnDevice => self.on_device.base_url.as_deref(),
            _ => self.provider_config(id).and_then(|p| p.base_url.as_deref()),
        }
    }

    /// Model pinned in config for `id`: the top-level `model` when `id` is
    /// the active provider, else the provider table's own `model`.
    pub fn pinned_model(&self, id: ProviderId) -> Option<&str> {
        let top_level = self
            .model
            .as_deref()
            .filter(|_| self.provider_id().is_ok_and(|active| active == id));
        top_level
            .or_else(|| self.provider_config(id).and_then(|p| p.model.as_deref()))
            .filter(|model| !model.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.provider_id()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;

        if self.language.trim().is_empty() {
            return Err(ConfigError::Validation("language must not be empty".into()));
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "http timeouts must be greater than zero".into(),
            ));
        }
        if self
            .log_level
            .parse::<tracing::level_filters::LevelFilter>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "unknown log_level `{}`",
                self.log_level
            )));
        }
        Ok(())
    }
}
