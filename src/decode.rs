//! Incremental UTF-8 decoding for chunked byte streams.
//!
//! The transport splits the response wherever it likes, so a multi-byte
//! character can straddle two chunks. The decoder keeps the incomplete
//! trailing sequence between calls and substitutes U+FFFD for bytes that
//! can never form a valid character.

/// Stateful decoder, one per stream session.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, yielding whatever text is complete so far.
    /// May return an empty string when the chunk only extends a pending
    /// multi-byte sequence.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::new();
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid_up_to]));
                    match err.error_len() {
                        // Invalid bytes in the interior: substitute and move on.
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &rest[valid_up_to + len..];
                        }
                        // Incomplete trailing sequence: keep it for the next chunk.
                        None => {
                            self.pending = rest[valid_up_to..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of stream. A sequence still incomplete here can never
    /// be finished, so it decodes lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&tail).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::StreamDecoder;

    #[test]
    fn decodes_plain_ascii() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(b"hello "), "hello ");
        assert_eq!(decoder.decode(b"world"), "world");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn reassembles_multibyte_char_split_across_chunks() {
        // "∑" is e2 88 91
        let bytes = "R\u{2211}".as_bytes();
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(&bytes[..2]), "R");
        assert_eq!(decoder.decode(&bytes[2..]), "\u{2211}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn split_at_every_boundary_roundtrips() {
        let text = "gᵢⱼ = δᵢⱼ + εₖ";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut acc = decoder.decode(&bytes[..split]);
            acc.push_str(&decoder.decode(&bytes[split..]));
            acc.push_str(&decoder.finish());
            assert_eq!(acc, text, "split at byte {split}");
        }
    }

    #[test]
    fn substitutes_invalid_bytes() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn truncated_sequence_is_lossy_at_finish() {
        let mut decoder = StreamDecoder::new();
        // First two bytes of a three-byte character, then the stream ends.
        assert_eq!(decoder.decode(&[0xe2, 0x88]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
