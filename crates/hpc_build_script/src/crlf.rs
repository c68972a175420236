//! Line ending normalization for build output.
//!
//! Build tools print progress with bare carriage returns. Lines are split on
//! `\n` only, so every `\r` and `\r\n` is turned into a single `\n` before the
//! output is read line by line.

use std::io;

use futures::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead};
use tokio_util::compat::FuturesAsyncReadCompatExt;

/// Wrap a reader so that CR and CRLF come out as LF.
pub fn normalize_crlf<R: AsyncRead + Unpin>(reader: R) -> impl AsyncRead + Unpin {
    FramedRead::new(reader, CrLfNormalizer::default())
        .into_async_read()
        .compat()
}

/// Codec that turns CR and CRLF into LF.
///
/// A CR at the end of one chunk followed by an LF at the start of the next
/// still counts as a single line break.
#[derive(Debug, Default)]
pub struct CrLfNormalizer {
    pending_cr: bool,
}

impl Decoder for CrLfNormalizer {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut bytes = src.split_off(0);
        let mut len = 0;
        for index in 0..bytes.len() {
            let byte = bytes[index];
            match byte {
                b'\n' if self.pending_cr => {
                    self.pending_cr = false;
                    continue;
                }
                b'\r' => {
                    bytes[len] = b'\n';
                    self.pending_cr = true;
                }
                other => {
                    bytes[len] = other;
                    self.pending_cr = false;
                }
            }
            len += 1;
        }

        if len == 0 {
            return Ok(None);
        }
        bytes.truncate(len);
        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(normalizer: &mut CrLfNormalizer, input: &str) -> Option<String> {
        let mut buffer = BytesMut::from(input);
        normalizer
            .decode(&mut buffer)
            .unwrap()
            .map(|bytes| String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let mut normalizer = CrLfNormalizer::default();
        assert_eq!(
            decode_all(&mut normalizer, "== building zlib\n").as_deref(),
            Some("== building zlib\n")
        );
    }

    #[test]
    fn test_crlf_and_cr() {
        let mut normalizer = CrLfNormalizer::default();
        assert_eq!(
            decode_all(&mut normalizer, "a\r\nb\rc\r\r").as_deref(),
            Some("a\nb\nc\n\n")
        );
        assert!(normalizer.pending_cr);
    }

    #[test]
    fn test_crlf_split_over_chunks() {
        let mut normalizer = CrLfNormalizer::default();
        assert_eq!(decode_all(&mut normalizer, "50%\r").as_deref(), Some("50%\n"));
        assert_eq!(decode_all(&mut normalizer, "\n100%").as_deref(), Some("100%"));
        assert!(!normalizer.pending_cr);
    }

    #[test]
    fn test_empty_buffer() {
        let mut normalizer = CrLfNormalizer::default();
        assert_eq!(decode_all(&mut normalizer, ""), None);
        let eof = normalizer.decode_eof(&mut BytesMut::new()).unwrap();
        assert!(eof.is_none());
    }
}
