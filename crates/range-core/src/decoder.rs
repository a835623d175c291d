//! Incremental line decoder for streamed job output
//!
//! Bytes are buffered until a newline arrives, so a record (or a multi-byte
//! character) split across chunks is reassembled and emitted once. Only
//! records starting with the marker are emitted, with the marker and one
//! following space removed.

/// Prefix of the record the backend sends last
pub const FIN_PREFIX: &str = "[FIN] Exit Code:";

/// Splits a byte stream into marker-prefixed records
#[derive(Debug, Clone)]
pub struct LineDecoder {
    marker: String,
    buffer: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            buffer: Vec::new(),
        }
    }

    /// Feed a chunk; returns every record it completed, in order
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(record) = self.unwrap_record(&line[..end]) {
                records.push(record);
            }
        }
        records
    }

    /// End of input: emit the unterminated tail, if it is a record
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.unwrap_record(&rest)
    }

    /// Bytes waiting for a newline
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn unwrap_record(&self, raw: &[u8]) -> Option<String> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let text = String::from_utf8_lossy(raw);
        let body = text.strip_prefix(self.marker.as_str())?;
        Some(body.strip_prefix(' ').unwrap_or(body).to_string())
    }
}

/// Exit code carried by the final `[FIN] Exit Code: <n>` record
#[must_use]
pub fn parse_exit_code(record: &str) -> Option<i32> {
    record.strip_prefix(FIN_PREFIX)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn record_split_across_chunks_is_emitted_once() {
        let mut decoder = LineDecoder::new("data:");
        let mut out = Vec::new();

        for chunk in ["data: line1\n", "data: li", "ne2\n"] {
            out.extend(decoder.push(chunk.as_bytes()));
        }
        out.extend(decoder.finish());

        assert_eq!(out, vec!["line1", "line2"]);
    }

    #[test]
    fn sse_framing_and_noise_are_dropped() {
        let mut decoder = LineDecoder::new("data:");

        let out = decoder.push(b"data: one\r\n\r\n: keepalive\nevent: x\ndata:two\n\n");

        assert_eq!(out, vec!["one", "two"]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn unterminated_tail_flushes_at_end() {
        let mut decoder = LineDecoder::new("data:");

        assert!(decoder.push(b"data: [FIN] Exit Code: 0").is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("[FIN] Exit Code: 0"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "data: instalación ✔\n".as_bytes();
        let split = text.len() - 3;
        let mut decoder = LineDecoder::new("data:");

        let mut out = decoder.push(&text[..split]);
        out.extend(decoder.push(&text[split..]));

        assert_eq!(out, vec!["instalación ✔"]);
    }

    #[test]
    fn exit_code_parsing() {
        assert_eq!(parse_exit_code("[FIN] Exit Code: 0"), Some(0));
        assert_eq!(parse_exit_code("[FIN] Exit Code: 2 "), Some(2));
        assert_eq!(parse_exit_code("installing nmap"), None);
    }

    proptest! {
        #[test]
        fn prop_chunking_never_changes_output(
            lines in proptest::collection::vec("[a-zA-Z0-9 ]{0,12}", 0..8),
            cuts in proptest::collection::vec(0..200usize, 0..6),
        ) {
            let body: String = lines.iter().map(|l| format!("data: {l}\n")).collect();
            let bytes = body.as_bytes();

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();

            let mut decoder = LineDecoder::new("data:");
            let mut out = Vec::new();
            let mut start = 0;
            for point in points {
                out.extend(decoder.push(&bytes[start..point]));
                start = point;
            }
            out.extend(decoder.push(&bytes[start..]));
            out.extend(decoder.finish());

            prop_assert_eq!(out, lines);
        }
    }
}
