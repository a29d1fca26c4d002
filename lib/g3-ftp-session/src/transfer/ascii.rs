/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

/// Convert network CRLF to local LF, a CR not followed by LF is kept.
#[derive(Default)]
pub(super) struct AsciiDecoder {
    pending_cr: bool,
}

impl AsciiDecoder {
    pub(super) fn decode(&mut self, mut input: &[u8], out: &mut Vec<u8>) {
        if self.pending_cr && !input.is_empty() {
            self.pending_cr = false;
            if input[0] != b'\n' {
                out.push(b'\r');
            }
        }

        while let Some(i) = memchr::memchr(b'\r', input) {
            out.extend_from_slice(&input[..i]);
            match input.get(i + 1) {
                Some(b'\n') => {
                    out.push(b'\n');
                    input = &input[i + 2..];
                }
                Some(_) => {
                    out.push(b'\r');
                    input = &input[i + 1..];
                }
                None => {
                    self.pending_cr = true;
                    return;
                }
            }
        }
        out.extend_from_slice(input);
    }

    pub(super) fn finish(&mut self, out: &mut Vec<u8>) {
        if self.pending_cr {
            self.pending_cr = false;
            out.push(b'\r');
        }
    }
}

/// Convert bare LF to CRLF, existing CRLF is kept.
#[derive(Default)]
pub(super) struct AsciiEncoder {
    last_cr: bool,
}

impl AsciiEncoder {
    pub(super) fn encode(&mut self, mut input: &[u8], out: &mut Vec<u8>) {
        while let Some(i) = memchr::memchr(b'\n', input) {
            out.extend_from_slice(&input[..i]);
            let prev_cr = if i == 0 {
                self.last_cr
            } else {
                input[i - 1] == b'\r'
            };
            if !prev_cr {
                out.push(b'\r');
            }
            out.push(b'\n');
            input = &input[i + 1..];
            self.last_cr = false;
        }

        if let Some(c) = input.last() {
            self.last_cr = *c == b'\r';
        }
        out.extend_from_slice(input);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut decoder = AsciiDecoder::default();
        let mut out = Vec::new();
        for chunk in chunks {
            decoder.decode(chunk, &mut out);
        }
        decoder.finish(&mut out);
        out
    }

    fn encode_chunks(chunks: &[&[u8]]) -> Vec<u8> {
        let mut encoder = AsciiEncoder::default();
        let mut out = Vec::new();
        for chunk in chunks {
            encoder.encode(chunk, &mut out);
        }
        out
    }

    #[test]
    fn decode() {
        assert_eq!(decode_chunks(&[b"a\r\nb\r\n"]), b"a\nb\n");
        assert_eq!(decode_chunks(&[b"a\r", b"\nb"]), b"a\nb");
        assert_eq!(decode_chunks(&[b"a\rb\r", b"c"]), b"a\rb\rc");
        assert_eq!(decode_chunks(&[b"a\r", b"", b"\n"]), b"a\n");
        assert_eq!(decode_chunks(&[b"end\r"]), b"end\r");
        assert_eq!(decode_chunks(&[b"lf\nonly"]), b"lf\nonly");
    }

    #[test]
    fn encode() {
        assert_eq!(encode_chunks(&[b"a\nb\n"]), b"a\r\nb\r\n");
        assert_eq!(encode_chunks(&[b"a\r\nb"]), b"a\r\nb");
        assert_eq!(encode_chunks(&[b"a\r", b"\nb\n"]), b"a\r\nb\r\n");
        assert_eq!(encode_chunks(&[b"a\n", b"\n"]), b"a\r\n\r\n");
        assert_eq!(encode_chunks(&[b"\n"]), b"\r\n");
    }
}
