use super::{ContentExtractor, Extracted, Source};
use crate::error::ExtractError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Plain text from a local file or stdin.
pub struct FileExtractor;

impl FileExtractor {
    async fn read_all(
        source: &Source,
        mut reader: impl AsyncRead + Unpin + Send,
    ) -> Result<String, ExtractError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .await
            .map_err(|err| ExtractError::Read {
                source_name: source.to_string(),
                message: err.to_string(),
            })?;
        Ok(text)
    }
}

#[async_trait]
impl ContentExtractor for FileExtractor {
    fn supports(&self, source: &Source) -> bool {
        matches!(source, Source::Stdin | Source::Path(_))
    }

    async fn extract(&self, source: &Source) -> Result<Extracted, ExtractError> {
        match source {
            Source::Stdin => {
                let text = Self::read_all(source, tokio::io::stdin()).await?;
                Extracted::new(source, &text, None)
            }
            Source::Path(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|err| ExtractError::Read {
                        source_name: source.to_string(),
                        message: err.to_string(),
                    })?;
                let text = Self::read_all(source, file).await?;
                let title = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned());
                Extracted::new(source, &text, title)
            }
            Source::Url(_) => Err(ExtractError::Unsupported(source.to_string())),
        }
    }
}
