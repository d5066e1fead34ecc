use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Identifier used by the on-device provider for its single model.
pub const ON_DEVICE_MODEL: &str = "on-device";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum ProviderId {
    #[strum(to_string = "openai")]
    #[serde(rename = "openai")]
    OpenAi,
    #[strum(to_string = "anthropic", serialize = "claude")]
    Anthropic,
    #[strum(to_string = "gemini", serialize = "google")]
    Gemini,
    #[strum(to_string = "on-device", serialize = "local")]
    OnDevice,
}

impl ProviderId {
    /// Parse a configured provider name; unregistered names are a
    /// configuration error.
    pub fn parse(name: &str) -> Result<Self, ProviderError> {
        Self::from_str(name.trim()).map_err(|_| ProviderError::UnknownProvider(name.to_string()))
    }

    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn descriptor(self) -> &'static ProviderDescriptor {
        match self {
            Self::OpenAi => &OPENAI,
            Self::Anthropic => &ANTHROPIC,
            Self::Gemini => &GEMINI,
            Self::OnDevice => &ON_DEVICE,
        }
    }
}

/// Static facts about one backend, shared by every caller.
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: &'static str,
    pub requires_credential: bool,
    /// Fallback list when nothing has been discovered yet. Never empty.
    pub default_models: &'static [&'static str],
    /// Ordered preference for the default model.
    pub preferred_models: &'static [&'static str],
    /// Fast-fail format check applied before the network check.
    pub key_prefix: Option<&'static str>,
}

impl ProviderDescriptor {
    pub fn default_models(&self) -> Vec<String> {
        self.default_models.iter().map(ToString::to_string).collect()
    }
}

static OPENAI: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::OpenAi,
    display_name: "OpenAI",
    requires_credential: true,
    default_models: &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1"],
    preferred_models: &["gpt-4o-mini", "gpt-4.1-mini", "gpt-4.1-nano", "gpt-3.5-turbo"],
    key_prefix: Some("sk-"),
};

static ANTHROPIC: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Anthropic,
    display_name: "Anthropic",
    requires_credential: true,
    default_models: &[
        "claude-3-5-haiku-latest",
        "claude-3-5-sonnet-latest",
        "claude-3-haiku-20240307",
    ],
    preferred_models: &[
        "claude-3-5-haiku-latest",
        "claude-3-5-haiku-20241022",
        "claude-3-haiku-20240307",
    ],
    key_prefix: Some("sk-ant-"),
};

static GEMINI: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::Gemini,
    display_name: "Google Gemini",
    requires_credential: true,
    default_models: &["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"],
    preferred_models: &["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-flash"],
    key_prefix: None,
};

static ON_DEVICE: ProviderDescriptor = ProviderDescriptor {
    id: ProviderId::OnDevice,
    display_name: "On-device",
    requires_credential: false,
    default_models: &[ON_DEVICE_MODEL],
    preferred_models: &[ON_DEVICE_MODEL],
    key_prefix: None,
};
