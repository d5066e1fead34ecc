use super::{Decoder, TextFragment, Utf8Carry};
use crate::error::ProtocolParseError;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<ChunkCandidate>,
}

#[derive(Debug, Deserialize)]
struct ChunkCandidate {
    content: Option<ChunkContent>,
}

#[derive(Debug, Deserialize)]
struct ChunkContent {
    #[serde(default)]
    parts: Vec<ChunkPart>,
}

#[derive(Debug, Deserialize)]
struct ChunkPart {
    text: Option<String>,
}

impl GenerateChunk {
    /// `candidates[0].content.parts[0].text`
    fn into_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Length of the balanced `{...}` object at the start of `input`, or `None`
/// if it is not closed yet.
///
/// Braces inside string literals are not counted. A backslash inside a string
/// escapes the next byte, so `\"` does not end the string. Scanning bytes is
/// safe for UTF-8 input because every structural character is ASCII and
/// never occurs inside a multi-byte sequence.
fn balanced_object_len(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, byte) in input.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Unterminated top-level JSON array of objects, no framing.
///
/// Each balanced object is parsed on its own as soon as its closing brace
/// arrives; separators (`[`, `,`, `]`, whitespace) are skipped over.
#[derive(Debug, Default)]
pub struct JsonArrayDecoder {
    utf8: Utf8Carry,
    buffer: String,
    skipped: usize,
}

impl JsonArrayDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn drain_objects(&mut self, out: &mut Vec<TextFragment>) {
        let mut consumed = 0;

        while let Some(rel_start) = self.buffer[consumed..].find('{') {
            let start = consumed + rel_start;
            let Some(len) = balanced_object_len(&self.buffer[start..]) else {
                break;
            };
            let end = start + len;
            self.decode_object(start, end, out);
            consumed = end;
        }

        if consumed > 0 {
            self.buffer.drain(..consumed);
        }
    }

    fn decode_object(&mut self, start: usize, end: usize, out: &mut Vec<TextFragment>) {
        let object = &self.buffer[start..end];
        match serde_json::from_str::<GenerateChunk>(object) {
            Ok(chunk) => out.extend(chunk.into_text().and_then(TextFragment::new)),
            Err(source) => {
                self.skipped += 1;
                let err = ProtocolParseError::new("json-array", object, source);
                tracing::warn!("{err}");
            }
        }
    }
}

impl Decoder for JsonArrayDecoder {
    fn format(&self) -> &'static str {
        "json-array"
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<TextFragment> {
        let mut out = Vec::new();
        self.utf8.push(chunk, &mut self.buffer);
        self.drain_objects(&mut out);
        out
    }

    fn finish(&mut self) -> Vec<TextFragment> {
        let mut out = Vec::new();
        self.utf8.finish(&mut self.buffer);
        self.drain_objects(&mut out);

        let leftover = self.buffer.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']'));
        if !leftover.is_empty() {
            tracing::debug!(bytes = leftover.len(), "discarding unterminated JSON array tail");
        }
        self.buffer.clear();
        out
    }

    fn skipped_units(&self) -> usize {
        self.skipped
    }
}
