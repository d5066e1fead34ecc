//! Google Gemini over the Generative Language API.
//!
//! Streaming uses `streamGenerateContent` without `alt=sse`, so the body is a
//! bare JSON array that only [`JsonArrayDecoder`] understands.

use super::gemini_types::{Content, GenerateContentRequest, ModelList};
use crate::error::ProviderError;
use crate::providers::{
    FragmentStream, ProviderId, SummaryRequest,
    decoder::JsonArrayDecoder,
    prompt, scrub,
    streaming::decode_chunks,
    traits::{Provider, passes_key_format, sort_model_ids},
};
use async_trait::async_trait;
use reqwest::Client;

const NAME: &str = "Gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const EXCLUDED_MARKERS: [&str; 5] = ["embedding", "vision", "tts", "image", "aqa"];

pub struct GeminiProvider {
    base_url: String,
    client: Client,
}

impl GeminiProvider {
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

    fn model_path(model: &str) -> String {
        if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        }
    }

    fn build_request(request: &SummaryRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content::text(Some("user"), request.content.clone())],
            system_instruction: Content::text(None, prompt::build(request)),
        }
    }

    fn summary_model_id(entry: super::gemini_types::ModelEntry) -> Option<String> {
        let can_generate = entry
            .supported_generation_methods
            .as_ref()
            .is_none_or(|methods| methods.iter().any(|m| m == "generateContent"));
        let id = entry
            .name
            .strip_prefix("models/")
            .unwrap_or(&entry.name)
            .to_string();

        (can_generate
            && id.contains("gemini")
            && !EXCLUDED_MARKERS.iter().any(|marker| id.contains(marker)))
        .then_some(id)
    }

    async fn get_models(&self, credential: &str) -> Result<reqwest::Response, ProviderError> {
        self.client
            .get(format!("{}/v1beta/models", self.base_url))
            .query(&[("pageSize", "1000")])
            .header("x-goog-api-key", credential)
            .send()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn validate_key(&self, credential: &str) -> bool {
        if !passes_key_format(self.descriptor(), credential) {
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
            .models
            .into_iter()
            .filter_map(Self::summary_model_id)
            .collect();
        Ok(sort_model_ids(ids))
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
        let credential = request
            .validate(self.id())?
            .ok_or_else(|| ProviderError::missing_credential(NAME))?;

        let url = format!(
            "{}/v1beta/{}:streamGenerateContent",
            self.base_url,
            Self::model_path(&request.model)
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", credential)
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
            JsonArrayDecoder::new(),
        ))
    }
}
