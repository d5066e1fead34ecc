//! Turning a file, stdin or a web page into plain text to summarize.

mod file;
#[cfg(feature = "link-extraction")]
mod html;

pub use file::FileExtractor;
#[cfg(feature = "link-extraction")]
pub use html::HtmlExtractor;

use crate::error::ExtractError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Upper bound on text handed to a provider.
pub const MAX_CONTENT_CHARS: usize = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Stdin,
    Path(PathBuf),
    Url(Url),
}

impl Source {
    /// `-` is stdin, an `http(s)` URL is a page, anything else a file path.
    pub fn parse(arg: &str) -> Self {
        let arg = arg.trim();
        if arg == "-" {
            return Self::Stdin;
        }
        match Url::parse(arg) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(url),
            _ => Self::Path(PathBuf::from(arg)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdin => f.write_str("stdin"),
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub content: String,
    pub title: String,
}

impl Extracted {
    /// Normalize `content` and reject sources with nothing to summarize.
    pub(crate) fn new(
        source: &Source,
        content: &str,
        title: Option<String>,
    ) -> Result<Self, ExtractError> {
        let content = truncate_text(content.trim(), MAX_CONTENT_CHARS);
        if content.is_empty() {
            return Err(ExtractError::Empty(source.to_string()));
        }
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| source.to_string());
        Ok(Self { content, title })
    }
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    fn supports(&self, source: &Source) -> bool;

    async fn extract(&self, source: &Source) -> Result<Extracted, ExtractError>;
}

/// Extract with the first built-in extractor that handles `source`.
pub async fn extract(source: &Source, client: &reqwest::Client) -> Result<Extracted, ExtractError> {
    let file = FileExtractor;
    if file.supports(source) {
        return file.extract(source).await;
    }

    #[cfg(feature = "link-extraction")]
    {
        let html = HtmlExtractor::new(client.clone());
        if html.supports(source) {
            return html.extract(source).await;
        }
    }
    #[cfg(not(feature = "link-extraction"))]
    let _ = client;

    Err(ExtractError::Unsupported(source.to_string()))
}

pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
