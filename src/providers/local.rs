//! On-device summarization through a locally resident model.
//!
//! The engine is reached through [`LocalEngine`]; the shipped implementation
//! talks to an Ollama daemon. Sessions are RAII guards: whatever path ends a
//! stream, dropping the [`LocalSession`] releases it.

use crate::error::{ProtocolParseError, ProviderError};
use crate::providers::{
    FragmentStream, ProviderId, SummaryRequest,
    decoder::TokenDecoder,
    descriptor::ON_DEVICE_MODEL,
    prompt, scrub,
    streaming::decode_chunks,
    traits::Provider,
};
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

const NAME: &str = "On-device";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3.2";

/// State of the local engine, checked on demand and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    #[strum(to_string = "engine not installed or not running")]
    ApiMissing,
    #[strum(to_string = "model not downloaded yet")]
    ModelNotReady,
    #[strum(to_string = "available")]
    Available,
}

impl Availability {
    pub fn is_available(self) -> bool {
        self == Self::Available
    }
}

pub type TokenStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send + 'static>>;

/// An open generation session yielding discrete text tokens.
pub struct LocalSession {
    tokens: TokenStream,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl LocalSession {
    pub fn new(tokens: TokenStream) -> Self {
        Self {
            tokens,
            on_release: None,
        }
    }

    /// Run `release` exactly once when the session is dropped.
    #[must_use]
    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.on_release = Some(Box::new(release));
        self
    }
}

impl Stream for LocalSession {
    type Item = anyhow::Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().tokens.as_mut().poll_next(cx)
    }
}

impl Drop for LocalSession {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
        tracing::debug!(provider = NAME, "local session released");
    }
}

#[async_trait]
pub trait LocalEngine: Send + Sync {
    async fn availability(&self) -> Availability;

    async fn open_session(&self, prompt: String) -> Result<LocalSession, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

/// Local engine backed by an Ollama daemon.
pub struct OllamaEngine {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaEngine {
    pub fn new(client: Client, base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            client,
        }
    }

    fn has_model(&self, installed: &[TagEntry]) -> bool {
        let tagged = format!("{}:latest", self.model);
        installed
            .iter()
            .any(|entry| entry.name == self.model || entry.name == tagged)
    }
}

#[async_trait]
impl LocalEngine for OllamaEngine {
    async fn availability(&self) -> Availability {
        let response = match self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "local engine rejected status check");
                return Availability::ApiMissing;
            }
            Err(err) => {
                tracing::debug!("local engine unreachable: {err}");
                return Availability::ApiMissing;
            }
        };

        match response.json::<TagList>().await {
            Ok(tags) if self.has_model(&tags.models) => Availability::Available,
            Ok(_) => Availability::ModelNotReady,
            Err(err) => {
                tracing::warn!("unexpected local engine tag list: {err}");
                Availability::ApiMissing
            }
        }
    }

    async fn open_session(&self, prompt: String) -> Result<LocalSession, ProviderError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::connection(NAME, &err))?;

        if !response.status().is_success() {
            return Err(scrub::api_error(NAME, response).await);
        }

        tracing::debug!(provider = NAME, model = %self.model, "local session opened");
        Ok(LocalSession::new(Box::pin(ndjson_tokens(
            response.bytes_stream(),
        ))))
    }
}

/// Split a newline-delimited JSON body into generation tokens.
///
/// A chunk that carries an `error` ends the stream with that error. A line
/// that does not parse is logged and skipped.
fn ndjson_tokens<S, B, E>(body: S) -> impl Stream<Item = anyhow::Result<String>> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut pending: Vec<u8> = Vec::new();
        let mut done = false;

        'read: while let Some(chunk) = body.next().await {
            pending.extend_from_slice(chunk?.as_ref());
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if let Some(parsed) = parse_line(&line) {
                    if let Some(message) = parsed.error {
                        Err::<(), _>(anyhow::anyhow!(message))?;
                    }
                    if !parsed.response.is_empty() {
                        yield parsed.response;
                    }
                    if parsed.done {
                        done = true;
                        break 'read;
                    }
                }
            }
        }

        if !done && let Some(parsed) = parse_line(&pending) {
            if let Some(message) = parsed.error {
                Err::<(), _>(anyhow::anyhow!(message))?;
            }
            if !parsed.response.is_empty() {
                yield parsed.response;
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Option<GenerateChunk> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_slice(line) {
        Ok(chunk) => Some(chunk),
        Err(source) => {
            let unit = String::from_utf8_lossy(line);
            tracing::warn!("{}", ProtocolParseError::new("ndjson", &unit, source));
            None
        }
    }
}

/// The on-device provider: no credential, one fixed model identifier.
pub struct OnDeviceProvider {
    engine: Arc<dyn LocalEngine>,
}

impl OnDeviceProvider {
    pub fn new(engine: Arc<dyn LocalEngine>) -> Self {
        Self { engine }
    }

    pub fn ollama(client: Client, base_url: Option<&str>, model: Option<&str>) -> Self {
        Self::new(Arc::new(OllamaEngine::new(
            client,
            base_url,
            model.unwrap_or(DEFAULT_LOCAL_MODEL),
        )))
    }
}

#[async_trait]
impl Provider for OnDeviceProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OnDevice
    }

    async fn validate_key(&self, _credential: &str) -> bool {
        true
    }

    async fn list_models(&self, _credential: Option<&str>) -> Result<Vec<String>, ProviderError> {
        Ok(vec![ON_DEVICE_MODEL.to_string()])
    }

    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError> {
        request.validate(self.id())?;

        let availability = self.engine.availability().await;
        if !availability.is_available() {
            return Err(ProviderError::Availability(availability));
        }

        let session = self
            .engine
            .open_session(prompt::compose_local_prompt(request))
            .await?;
        tracing::info!(provider = NAME, "summary stream opened");
        Ok(decode_chunks(NAME, session, TokenDecoder::new()))
    }

    async fn availability(&self) -> Availability {
        self.engine.availability().await
    }
}
