//! Incremental UTF-8 decoding of a byte stream.

/// Decodes chunks of bytes, holding back an incomplete trailing character
/// until the bytes that complete it arrive.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as possible.
    ///
    /// Invalid sequences become U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is left at the end of the stream.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character() {
        let bytes = "蒜味".as_bytes();
        let mut decoder = Utf8Decoder::new();

        assert_eq!(decoder.push(&bytes[..2]), "");
        assert_eq!(decoder.push(&bytes[2..4]), "蒜");
        assert_eq!(decoder.push(&bytes[4..]), "味");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_every_split_point_reassembles() {
        let text = "價格 280 元，供應中";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8Decoder::new();
            let mut out = decoder.push(&bytes[..split]);
            out.push_str(&decoder.push(&bytes[split..]));
            out.push_str(&decoder.finish());
            assert_eq!(out, text);
        }
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_is_flushed_lossily() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.push(&"雞".as_bytes()[..2]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }
}
