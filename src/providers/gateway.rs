use super::anthropic::AnthropicProvider;
use super::gemini::GeminiProvider;
use super::http_client::build_provider_client;
use super::local::{Availability, OnDeviceProvider};
use super::openai::OpenAiProvider;
use super::{FragmentStream, ProviderId, SummaryRequest, traits::Provider};
use crate::config::Config;
use crate::error::ProviderError;
use async_trait::async_trait;

/// One registered backend. Dispatch is a plain `match`; there is no dynamic
/// registry to fall out of sync with [`ProviderId`].
pub enum ProviderGateway {
    OpenAi(OpenAiProvider),
    Anthropic(AnthropicProvider),
    Gemini(GeminiProvider),
    OnDevice(OnDeviceProvider),
}

impl ProviderGateway {
    pub fn from_config(id: ProviderId, config: &Config) -> Self {
        let client = build_provider_client(&config.http);
        let base_url = config.base_url(id);
        match id {
            ProviderId::OpenAi => Self::OpenAi(OpenAiProvider::with_base_url(client, base_url)),
            ProviderId::Anthropic => {
                Self::Anthropic(AnthropicProvider::with_base_url(client, base_url))
            }
            ProviderId::Gemini => Self::Gemini(GeminiProvider::with_base_url(client, base_url)),
            ProviderId::OnDevice => Self::OnDevice(OnDeviceProvider::ollama(
                client,
                base_url,
                config.on_device.model.as_deref(),
            )),
        }
    }

    /// Resolve a provider by name, as found in config or on the command line.
    pub fn from_name(name: &str, config: &Config) -> Result<Self, ProviderError> {
        ProviderId::parse(name).map(|id| Self::from_config(id, config))
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Self::OpenAi(p) => p,
            Self::Anthropic(p) => p,
            Self::Gemini(p) => p,
            Self::OnDevice(p) => p,
        }
    }
}

#[async_trait]
impl Provider for ProviderGateway {
    fn id(&self) -> ProviderId {
        self.inner().id()
    }

    async fn validate_key(&self, credential: &str) -> bool {
        self.inner().validate_key(credential).await
    }

    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<String>, ProviderError> {
        self.inner().list_models(credential).await
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
        self.inner().summarize(request).await
    }

    async fn availability(&self) -> Availability {
        self.inner().availability().await
    }
}
