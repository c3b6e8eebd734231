//! Frame decoding for the `text/event-stream` response body
//!
//! Fragments arrive at arbitrary boundaries. The decoder keeps whatever follows
//! the last blank-line separator and prepends it to the next fragment.

const SEPARATOR: &str = "\n\n";

/// Splits a chunked body into blank-line delimited frames.
///
/// One decoder belongs to one stream; it is never reused.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    partial_utf8: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text fragment, returning every frame it completes
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);
        if self.buffer.contains('\r') {
            // A lone '\r' at the end may pair with a '\n' in the next fragment
            let held = if self.buffer.ends_with('\r') {
                self.buffer.pop();
                true
            } else {
                false
            };
            self.buffer = self.buffer.replace("\r\n", "\n");
            if held {
                self.buffer.push('\r');
            }
        }

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.find(SEPARATOR) {
            let frame: String = self.buffer.drain(..pos + SEPARATOR.len()).collect();
            let frame = &frame[..pos];
            if !frame.trim().is_empty() {
                frames.push(frame.to_string());
            }
        }
        frames
    }

    /// Feed raw bytes; a multi-byte character split across fragments is
    /// carried over until its remaining bytes arrive.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut data = std::mem::take(&mut self.partial_utf8);
        data.extend_from_slice(bytes);

        let mut text = String::with_capacity(data.len());
        let mut rest = data.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.partial_utf8 = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        self.push(&text)
    }

    /// End of stream: hand back the unterminated remainder, if any
    pub fn finish(mut self) -> Option<String> {
        if !self.partial_utf8.is_empty() {
            tracing::debug!(
                "Dropping {} bytes of incomplete UTF-8 at end of stream",
                self.partial_utf8.len()
            );
        }
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches(['\r', '\n']);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "data: {\"type\":\"user_message\"}\n\n: keep-alive\n\ndata: {\"type\":\"chunk\",\"content\":\"Hel\"}\n\ndata: {\"type\":\"done\"}\n\n";

    fn decode_in_pieces(pieces: &[&str]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for piece in pieces {
            frames.extend(decoder.push(piece));
        }
        frames
    }

    #[test]
    fn test_single_fragment() {
        let frames = decode_in_pieces(&[BODY]);
        assert_eq!(
            frames,
            vec![
                "data: {\"type\":\"user_message\"}",
                ": keep-alive",
                "data: {\"type\":\"chunk\",\"content\":\"Hel\"}",
                "data: {\"type\":\"done\"}",
            ]
        );
    }

    #[test]
    fn test_every_two_way_split_matches_whole() {
        let whole = decode_in_pieces(&[BODY]);
        for split in 0..=BODY.len() {
            let (a, b) = BODY.split_at(split);
            assert_eq!(decode_in_pieces(&[a, b]), whole, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let whole = decode_in_pieces(&[BODY]);
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in BODY.as_bytes() {
            frames.extend(decoder.push_bytes(std::slice::from_ref(byte)));
        }
        assert_eq!(frames, whole);
    }

    #[test]
    fn test_remainder_kept_until_separator() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push("data: {\"type\":\"chu").is_empty());
        assert!(decoder.push("nk\"}\n").is_empty());
        assert_eq!(decoder.push("\n"), vec!["data: {\"type\":\"chunk\"}"]);
    }

    #[test]
    fn test_crlf_separators() {
        let frames = decode_in_pieces(&["data: a\r\n\r", "\ndata: b\r\n\r\n"]);
        assert_eq!(frames, vec!["data: a", "data: b"]);
    }

    #[test]
    fn test_split_multibyte_character() {
        let text = "data: {\"content\":\"héllo ✓\"}\n\n";
        let bytes = text.as_bytes();
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(3) {
            frames.extend(decoder.push_bytes(chunk));
        }
        assert_eq!(frames, vec!["data: {\"content\":\"héllo ✓\"}"]);
    }

    #[test]
    fn test_finish_returns_trailing_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.push("data: one\n\ndata: two\n");
        assert_eq!(decoder.finish().as_deref(), Some("data: two"));
    }

    #[test]
    fn test_finish_on_clean_end() {
        let mut decoder = FrameDecoder::new();
        decoder.push("data: one\n\n");
        assert_eq!(decoder.finish(), None);
        assert_eq!(FrameDecoder::new().finish(), None);
    }
}
