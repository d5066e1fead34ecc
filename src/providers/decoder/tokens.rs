use super::{Decoder, TextFragment, Utf8Carry};

/// Pass-through for engines that already produce discrete text tokens.
///
/// Each fed token becomes one fragment. The only state is a UTF-8 tail, kept
/// so the feed/finish contract matches the network decoders.
#[derive(Debug, Default)]
pub struct TokenDecoder {
    utf8: Utf8Carry,
}

impl TokenDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for TokenDecoder {
    fn format(&self) -> &'static str {
        "local-tokens"
    }

    fn feed(&mut self, chunk: &[u8]) -> Vec<TextFragment> {
        let mut text = String::new();
        self.utf8.push(chunk, &mut text);
        TextFragment::new(text).into_iter().collect()
    }

    fn finish(&mut self) -> Vec<TextFragment> {
        let mut text = String::new();
        self.utf8.finish(&mut text);
        TextFragment::new(text).into_iter().collect()
    }
}
