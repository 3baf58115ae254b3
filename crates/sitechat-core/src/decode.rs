//! Incremental decoding of the response body.
//!
//! The body arrives as arbitrary byte chunks. A chunk boundary may fall in the
//! middle of a multi-byte character or in the middle of a line, so both the
//! UTF-8 decoder and the line splitter carry state from one chunk to the next.

/// Streaming UTF-8 decoder.
///
/// Incomplete trailing sequences are held back until the next chunk completes
/// them. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning all text that is complete so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Sequence cut off by the chunk boundary
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// A complete line, plus how many of its leading bytes were carried over from
/// earlier chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine {
    pub text: String,
    pub carried: usize,
}

impl SplitLine {
    /// The part of the line that arrived in the chunk that completed it
    pub fn own_part(&self) -> &str {
        &self.text[self.carried..]
    }

    pub fn carried_part(&self) -> &str {
        &self.text[..self.carried]
    }
}

/// Splits decoded text on `\n`, keeping the trailing partial line for later.
#[derive(Debug, Default)]
pub struct LineSplitter {
    partial: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed text and return the complete, non-blank lines it finished
    pub fn push(&mut self, text: &str) -> Vec<SplitLine> {
        // Only the first line finished here can start with carried text
        let mut carried = self.partial.len();
        self.partial.push_str(text);

        let mut lines = Vec::new();
        while let Some(line_end) = self.partial.find('\n') {
            let mut line: String = self.partial.drain(..=line_end).collect();
            line.pop();
            let line_carried = carried.min(line.len());
            carried = 0;
            if !line.trim().is_empty() {
                lines.push(SplitLine { text: line, carried: line_carried });
            }
        }
        lines
    }

    /// Flush the unterminated last line, if it has any content
    pub fn finish(&mut self) -> Option<SplitLine> {
        let line = std::mem::take(&mut self.partial);
        if line.trim().is_empty() {
            None
        } else {
            Some(SplitLine { text: line, carried: 0 })
        }
    }
}

/// Byte chunks in, complete NDJSON lines out.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    utf8: Utf8Decoder,
    lines: LineSplitter,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SplitLine> {
        let text = self.utf8.decode(chunk);
        self.lines.push(&text)
    }

    /// Drain whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<SplitLine> {
        let tail = self.utf8.finish();
        let mut lines = self.lines.push(&tail);
        lines.extend(self.lines.finish());
        lines
    }
}
