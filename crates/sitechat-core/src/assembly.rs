use tracing::{debug, warn};

use crate::decode::{NdjsonDecoder, SplitLine};
use crate::fragment::StreamFragment;
use crate::session::MessageSink;
use crate::state::SlotId;

/// Builds the assistant message of one turn from the raw body chunks.
///
/// Owns the decoder state and the accumulated text, and pushes the full
/// buffer into the slot after every delta. Fragments are applied strictly in
/// arrival order.
pub struct TurnAssembly {
    slot: SlotId,
    decoder: NdjsonDecoder,
    buffer: String,
    deltas: usize,
    parse_failures: usize,
    done_seen: bool,
}

impl TurnAssembly {
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            decoder: NdjsonDecoder::new(),
            buffer: String::new(),
            deltas: 0,
            parse_failures: 0,
            done_seen: false,
        }
    }

    /// Feed one body chunk
    pub fn push_chunk(&mut self, chunk: &[u8], sink: &mut dyn MessageSink) {
        for line in self.decoder.push(chunk) {
            self.apply_split_line(&line, sink);
        }
    }

    /// End of body: flush carried bytes and the last unterminated line
    pub fn finish(&mut self, sink: &mut dyn MessageSink) {
        for line in self.decoder.finish() {
            self.apply_split_line(&line, sink);
        }
        debug!(
            deltas = self.deltas,
            parse_failures = self.parse_failures,
            done_seen = self.done_seen,
            "stream ended"
        );
    }

    /// A line that only parses as a whole is a fragment split across chunks.
    /// If the joined line is broken and part of it was carried over, the
    /// carried prefix counts as one malformed fragment and the completing
    /// chunk's own part is parsed on its own.
    fn apply_split_line(&mut self, line: &SplitLine, sink: &mut dyn MessageSink) {
        if let Ok(fragment) = StreamFragment::parse(&line.text) {
            self.apply_fragment(fragment, sink);
            return;
        }

        let carried = line.carried_part();
        let own = line.own_part();
        if carried.trim().is_empty() || own.trim().is_empty() {
            self.apply_line(&line.text, sink);
            return;
        }

        self.parse_failures += 1;
        warn!(line = carried, "skipping malformed stream fragment cut off by the next chunk");
        self.apply_line(own, sink);
    }

    fn apply_line(&mut self, line: &str, sink: &mut dyn MessageSink) {
        match StreamFragment::parse(line) {
            Ok(fragment) => self.apply_fragment(fragment, sink),
            Err(e) => {
                self.parse_failures += 1;
                warn!(error = %e, line, "skipping malformed stream fragment");
            }
        }
    }

    fn apply_fragment(&mut self, fragment: StreamFragment, sink: &mut dyn MessageSink) {
        if fragment.done {
            self.done_seen = true;
        }

        let Some(delta) = fragment.delta else {
            return;
        };

        if self.deltas == 0 {
            debug!(slot = self.slot.0, "first delta, replacing placeholder");
        }
        self.buffer.push_str(&delta);
        self.deltas += 1;

        sink.set_content(self.slot, &self.buffer, false);
        sink.scroll_to_latest();
    }

    pub fn into_text(self) -> String {
        self.buffer
    }

    pub fn deltas(&self) -> usize {
        self.deltas
    }

    pub fn parse_failures(&self) -> usize {
        self.parse_failures
    }
}
