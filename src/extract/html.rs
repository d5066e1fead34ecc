use super::{ContentExtractor, Extracted, Source};
use crate::error::ExtractError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

/// Readable text from a web page: `<article>`, else `<main>`, else `<body>`.
pub struct HtmlExtractor {
    client: Client,
}

impl HtmlExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn read_error(source: &Source, message: impl ToString) -> ExtractError {
    ExtractError::Read {
        source_name: source.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl ContentExtractor for HtmlExtractor {
    fn supports(&self, source: &Source) -> bool {
        matches!(source, Source::Url(_))
    }

    async fn extract(&self, source: &Source) -> Result<Extracted, ExtractError> {
        let Source::Url(url) = source else {
            return Err(ExtractError::Unsupported(source.to_string()));
        };

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|err| read_error(source, err))?;
        if !response.status().is_success() {
            return Err(read_error(source, format!("HTTP {}", response.status())));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));
        let body = response.text().await.map_err(|err| read_error(source, err))?;

        if is_html {
            let (title, content) = extract_from_html(&body);
            Extracted::new(source, &content, title)
        } else {
            Extracted::new(source, &body, None)
        }
    }
}

fn extract_from_html(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let content = extract_element_text(&document, "article")
        .or_else(|| extract_element_text(&document, "main"))
        .or_else(|| extract_element_text(&document, "body"))
        .unwrap_or_default();

    (title, content)
}

/// Elements whose text is never page content.
const NON_CONTENT: [&str; 4] = ["script", "style", "noscript", "template"];

fn extract_element_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    let element = document.select(&sel).next()?;
    let text = element
        .descendants()
        .filter(|node| {
            !node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| NON_CONTENT.contains(&el.name()))
            })
        })
        .filter_map(|node| node.value().as_text().map(|text| &**text))
        .collect::<Vec<_>>()
        .join(" ");
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}
