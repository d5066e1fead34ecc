use super::decoder::{Decoder, TextFragment};
use crate::error::ProviderError;
use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;

/// Ordered fragments of one summary. Ends after the last fragment, or after
/// the first `Err`; never both.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<TextFragment, ProviderError>> + Send + 'static>>;

/// Pipe raw body chunks through `decoder`, yielding fragments as soon as they
/// decode.
///
/// A chunk error ends the stream with a connection-level transport error.
/// Reading stops as soon as the decoder reports its own terminator, which
/// drops `chunks` and releases the connection. Dropping the returned stream
/// early does the same.
pub fn decode_chunks<S, B, E, D>(provider: &'static str, chunks: S, decoder: D) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    D: Decoder + 'static,
{
    let stream = async_stream::try_stream! {
        let mut decoder = decoder;
        let mut chunks = Box::pin(chunks);
        let mut emitted = 0usize;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|err| ProviderError::connection(provider, &err))?;
            for fragment in decoder.feed(chunk.as_ref()) {
                emitted += 1;
                yield fragment;
            }
            if decoder.is_terminated() {
                break;
            }
        }
        drop(chunks);

        for fragment in decoder.finish() {
            emitted += 1;
            yield fragment;
        }

        tracing::debug!(
            provider,
            format = decoder.format(),
            fragments = emitted,
            skipped = decoder.skipped_units(),
            "stream finished"
        );
    };

    Box::pin(stream)
}

/// Drain `stream` into one string; stops at the first error.
pub async fn collect_text(mut stream: FragmentStream) -> Result<String, ProviderError> {
    let mut text = String::new();
    while let Some(fragment) = stream.next().await {
        text.push_str(fragment?.as_str());
    }
    Ok(text)
}
