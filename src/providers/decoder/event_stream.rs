use super::{Decoder, TextFragment, Utf8Carry};
use crate::error::ProtocolParseError;
use serde::Deserialize;

const DONE_SENTINEL: &str = "[DONE]";

/// Which JSON shape the `data:` payloads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDialect {
    /// `choices[0].delta.content`
    OpenAi,
    /// `content_block_delta` events carrying a `text_delta`.
    Anthropic,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageEvent {
    #[serde(rename = "type")]
    kind: String,
    delta: Option<MessageDelta>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(rename = "type")]
    kind: Option<String>,
    text: Option<String>,
}

/// What one `data:` payload means for the stream.
enum Payload {
    Text(Option<String>),
    End,
}

impl EventDialect {
    fn extract(self, payload: &str) -> Result<Payload, serde_json::Error> {
        match self {
            Self::OpenAi => {
                let chunk: CompletionChunk = serde_json::from_str(payload)?;
                Ok(Payload::Text(
                    chunk
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content),
                ))
            }
            Self::Anthropic => {
                let event: MessageEvent = serde_json::from_str(payload)?;
                match event.kind.as_str() {
                    "message_stop" => Ok(Payload::End),
                    "content_block_delta" => Ok(Payload::Text(
                        event
                            .delta
                            .filter(|delta| delta.kind.as_deref() == Some("text_delta"))
                            .and_then(|delta| delta.text),
                    )),
                    _ => Ok(Payload::Text(None)),
                }
            }
        }
    }
}

/// Line-delimited `data:` event stream.
///
/// Lines are split on `\n` (a trailing `\r` is dropped); the last partial line
/// stays buffered until its terminator arrives. `event:` lines, comments and
/// blank lines are ignored. `data: [DONE]`, or a `message_stop` event in the
/// Anthropic dialect, ends decoding for good.
#[derive(Debug)]
pub struct EventStreamDecoder {
    dialect: EventDialect,
    utf8: Utf8Carry,
    buffer: String,
    done: bool,
    skipped: usize,
}

impl EventStreamDecoder {
    pub fn new(dialect: EventDialect) -> Self {
        Self {
            dialect,
            utf8: Utf8Carry::default(),
            buffer: String::new(),
            done: false,
            skipped: 0,
        }
    }

    fn drain_lines(&mut self, out: &mut Vec<TextFragment>) {
        while !self.done {
            let Some(newline) = self.buffer.find('\n') else {
                break;
            };
            let line: String = self.buffer.drain(..=newline).collect();
            self.handle_line(&line, out);
        }
        if self.done {
            self.buffer.clear();
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<TextFragment>) {
        let line = line.trim_end_matches(['\n', '\r']);
        let Some(payload) = line.strip_prefix("data:") else {
            // blank, `event:`, `id:`, `retry:` and `:` comment lines
            return;
        };
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload.trim() == DONE_SENTINEL {
            self.done = true;
            return;
        }
        if payload.trim().is_empty() {
            return;
        }

        match self.dialect.extract(payload) {
            Ok(Payload::Text(text)) => out.extend(text.and_then(TextFragment::new)),
            Ok(Payload::End) => self.done = true,
            Err(source) => {
                self.skipped += 1;
                let err = ProtocolParseError::new(self.format(), payload, source);
                tracing::warn!(dialect = ?self.dialect, "{err}");
            }
        }
    }
}

impl Decoder for EventStreamDecoder {
    fn format(&self) -> &'static str {
        "event-stream"
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<TextFragment> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }
        self.utf8.push(chunk, &mut self.buffer);
        self.drain_lines(&mut out);
        out
    }

    fn finish(&mut self) -> Vec<TextFragment> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }
        self.utf8.finish(&mut self.buffer);
        self.drain_lines(&mut out);

        let tail = std::mem::take(&mut self.buffer);
        if !tail.is_empty() {
            self.handle_line(&tail, &mut out);
        }
        self.done = true;
        out
    }

    fn is_terminated(&self) -> bool {
        self.done
    }

    fn skipped_units(&self) -> usize {
        self.skipped
    }
}
