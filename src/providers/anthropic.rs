use super::anthropic_types::{Message, MessagesRequest, ModelList};
use crate::error::ProviderError;
use crate::providers::{
    FragmentStream, ProviderId, SummaryRequest,
    decoder::{EventDialect, EventStreamDecoder},
    prompt, scrub,
    streaming::decode_chunks,
    traits::{Provider, passes_key_format, sort_model_ids},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

const NAME: &str = "Anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_SUMMARY_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, None)
    }

    pub fn with_base_url(client: Client, base_url: Option<&str>) -> Self {
        Self {
            base_url: base_url
                .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
                .to_string(),
            client,
        }
    }

    fn authorized(builder: RequestBuilder, credential: &str) -> RequestBuilder {
        builder
            .header("x-api-key", credential)
            .header("anthropic-version", API_VERSION)
    }

    fn build_request(request: &SummaryRequest) -> MessagesRequest {
        MessagesRequest {
            model: request.model.clone(),
            max_tokens: MAX_SUMMARY_TOKENS,
            system: prompt::build(request),
            messages: vec![Message {
                role: "user",
                content: request.content.clone(),
            }],
            stream: true,
        }
    }

    async fn get_models(&self, credential: &str) -> Result<reqwest::Response, ProviderError> {
        let builder = self.client.get(format!("{}/v1/models", self.base_url));
        Self::authorized(builder, credential)
            .send()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn validate_key(&self, credential: &str) -> bool {
        if !passes_key_format(self.descriptor(), credential) {
            tracing::debug!(provider = NAME, "key rejected by format check");
            return false;
        }
        match self.get_models(credential.trim()).await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::warn!(provider = NAME, "key validation failed: {err}");
                false
            }
        }
    }

    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<String>, ProviderError> {
        let credential = credential.ok_or_else(|| ProviderError::missing_credential(NAME))?;
        let response = self.get_models(credential).await?;
        if !response.status().is_success() {
            return Err(scrub::api_error(NAME, response).await);
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))?;
        let ids = list
            .data
            .into_iter()
            .map(|model| model.id)
            .filter(|id| id.starts_with("claude-"))
            .collect();
        Ok(sort_model_ids(ids))
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
        let credential = request
            .validate(self.id())?
            .ok_or_else(|| ProviderError::missing_credential(NAME))?;

        let builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&Self::build_request(request));
        let response = Self::authorized(builder, credential)
            .send()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))?;

        if !response.status().is_success() {
            return Err(scrub::api_error(NAME, response).await);
        }

        tracing::info!(provider = NAME, model = %request.model, "summary stream opened");
        Ok(decode_chunks(
            NAME,
            response.bytes_stream(),
            EventStreamDecoder::new(EventDialect::Anthropic),
        ))
    }
}
