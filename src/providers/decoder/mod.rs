//! Incremental byte-to-text decoders, one per wire format.
//!
//! Decoders are pure state machines: the transport pushes raw chunks in with
//! [`Decoder::feed`] and calls [`Decoder::finish`] once at end-of-stream. No
//! decoder assumes a chunk boundary lines up with anything meaningful, so a
//! line terminator, a brace, or a multi-byte character may be split across
//! any number of feeds.

mod event_stream;
mod json_array;
mod tokens;

pub use event_stream::{EventDialect, EventStreamDecoder};
pub use json_array::JsonArrayDecoder;
pub use tokens::TokenDecoder;

use std::fmt;

/// One non-empty piece of decoded output text.
///
/// The summary is the concatenation of all fragments in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFragment(String);

impl TextFragment {
    /// Returns `None` for empty text; fragments are never empty.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() { None } else { Some(Self(text)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TextFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TextFragment {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub trait Decoder: Send {
    /// Short format name used in logs.
    fn format(&self) -> &'static str;

    fn feed(&mut self, chunk: &[u8]) -> Vec<TextFragment>;

    /// Flush any complete unit still buffered. Called once.
    fn finish(&mut self) -> Vec<TextFragment>;

    /// True once the wire format signalled its own end; the transport stops
    /// reading.
    fn is_terminated(&self) -> bool {
        false
    }

    /// Units dropped because they failed to parse.
    fn skipped_units(&self) -> usize {
        0
    }
}

/// Carries an incomplete UTF-8 sequence across chunk boundaries.
///
/// Invalid sequences become U+FFFD; a truncated trailing sequence is held
/// back until the next push completes it.
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub(crate) fn push(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        let pending = std::mem::take(&mut self.pending);
        let mut input = pending.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&input[..valid]));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + bad..];
                        }
                        None => {
                            self.pending = input[valid..].to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left; a dangling partial sequence becomes U+FFFD.
    pub(crate) fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            out.push_str(&String::from_utf8_lossy(&self.pending));
            self.pending.clear();
        }
    }
}
