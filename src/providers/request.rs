use super::descriptor::ProviderId;
use crate::error::ProviderError;

/// Everything one summarize call needs. Built once, never mutated.
#[derive(Clone)]
pub struct SummaryRequest {
    pub content: String,
    /// Locale tag substituted into the prompt, e.g. `en` or `pt-BR`.
    pub language: String,
    pub model: String,
    pub custom_prompt: Option<String>,
    pub credential: Option<String>,
}

impl SummaryRequest {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            language: "en".to_string(),
            model: model.into(),
            custom_prompt: None,
            credential: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_custom_prompt(mut self, prompt: Option<String>) -> Self {
        self.custom_prompt = prompt;
        self
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    /// Non-blank credential, if any.
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Check the request invariants for `provider` before any I/O.
    ///
    /// Returns the credential for providers that need one.
    pub fn validate(&self, provider: ProviderId) -> Result<Option<&str>, ProviderError> {
        if self.content.trim().is_empty() {
            return Err(ProviderError::InvalidRequest(
                "content to summarize is empty".to_string(),
            ));
        }

        let descriptor = provider.descriptor();
        if !descriptor.requires_credential {
            return Ok(None);
        }
        self.credential()
            .map(Some)
            .ok_or_else(|| ProviderError::missing_credential(descriptor.display_name))
    }
}

impl std::fmt::Debug for SummaryRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryRequest")
            .field("content_len", &self.content.len())
            .field("language", &self.language)
            .field("model", &self.model)
            .field("custom_prompt", &self.custom_prompt.is_some())
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
