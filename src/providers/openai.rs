use super::openai_types::{ChatRequest, Message, ModelList};
use crate::error::ProviderError;
use crate::providers::{
    FragmentStream, ProviderId, SummaryRequest,
    decoder::{EventDialect, EventStreamDecoder},
    prompt, scrub,
    streaming::decode_chunks,
    traits::{Provider, passes_key_format, sort_model_ids},
};
use async_trait::async_trait;
use reqwest::Client;

const NAME: &str = "OpenAI";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const MODEL_PREFIXES: [&str; 4] = ["gpt-", "o1", "o3", "o4"];
const EXCLUDED_MARKERS: [&str; 11] = [
    "embedding",
    "vision",
    "audio",
    "realtime",
    "tts",
    "whisper",
    "dall-e",
    "transcribe",
    "image",
    "search",
    "moderation",
];

pub struct OpenAiProvider {
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
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

    fn is_summary_model(id: &str) -> bool {
        MODEL_PREFIXES.iter().any(|prefix| id.starts_with(prefix))
            && !EXCLUDED_MARKERS.iter().any(|marker| id.contains(marker))
    }

    fn build_request(request: &SummaryRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: prompt::build(request),
                },
                Message {
                    role: "user",
                    content: request.content.clone(),
                },
            ],
            stream: true,
        }
    }

    async fn get_models(&self, credential: &str) -> Result<reqwest::Response, ProviderError> {
        self.client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
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
            .filter(|id| Self::is_summary_model(id))
            .collect();
        Ok(sort_model_ids(ids))
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
        let credential = request
            .validate(self.id())?
            .ok_or_else(|| ProviderError::missing_credential(NAME))?;

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(credential)
            .json(&Self::build_request(request))
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
            EventStreamDecoder::new(EventDialect::OpenAi),
        ))
    }
}
