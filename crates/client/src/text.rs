/// Incremental UTF-8 decoder for a byte stream whose chunk boundaries may
/// split multi-byte sequences.
///
/// An incomplete trailing sequence is held back until the next chunk; invalid
/// bytes decode to U+FFFD rather than failing the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one chunk, prepending any bytes held back from the last call.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut decoded = String::new();
        let mut input = bytes.as_slice();

        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    return decoded;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&input[..valid_up_to]) {
                        decoded.push_str(valid);
                    }

                    match error.error_len() {
                        Some(invalid_len) => {
                            decoded.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid_up_to + invalid_len..];
                        }
                        None => {
                            // Possibly the front of a multi-byte sequence;
                            // wait for the rest.
                            self.pending = input[valid_up_to..].to_vec();
                            return decoded;
                        }
                    }
                }
            }
        }
    }

    /// Flushes at end of stream. A truncated trailing sequence becomes one
    /// replacement character.
    pub fn flush(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
