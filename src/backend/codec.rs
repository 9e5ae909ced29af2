//! CRLF line framing for the upstream byte stream.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::connection::TransportError;

/// Longest line accepted from a server, tags included
pub const MAX_LINE_LENGTH: usize = 8192 + 512;

const DELIMITER: &[u8] = b"\r\n";

/// Splits the inbound stream on `\r\n` and writes outbound lines verbatim.
///
/// Outbound lines already carry their terminator (the session appends it),
/// so encoding is a plain copy. Inbound bytes that are not valid UTF-8
/// (latin-1 channels, for instance) are decoded lossily: invalid sequences
/// become U+FFFD rather than failing the connection.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// How far into the buffer we have already searched for a delimiter
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        let start = self.next_index.saturating_sub(DELIMITER.len() - 1);
        let found = src[start..]
            .windows(DELIMITER.len())
            .position(|w| w == DELIMITER)
            .map(|i| start + i);

        match found {
            Some(pos) => {
                let line = src.split_to(pos);
                src.advance(DELIMITER.len());
                self.next_index = 0;
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None if src.len() > MAX_LINE_LENGTH => Err(TransportError::LineTooLong(src.len())),
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, TransportError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            None => {
                // Peer closed mid-line; deliver what we have
                let line = src.split_to(src.len());
                self.next_index = 0;
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = TransportError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), TransportError> {
        dst.reserve(line.len());
        dst.put_slice(line.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_splits_on_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :a\r\nPING :b\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :a"));
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :b"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_across_chunks() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b":srv 001 me :Wel"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        // Delimiter itself split across reads
        buf.extend_from_slice(b"come\r");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\nNEXT");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(":srv 001 me :Welcome")
        );
        assert_eq!(&buf[..], b"NEXT");
    }

    #[test]
    fn test_bare_lf_is_not_a_delimiter() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"a\nb\r\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_overlong_line_is_an_error() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_LINE_LENGTH + 1].as_slice());
        assert!(matches!(
            codec.decode(&mut buf),
            Err(TransportError::LineTooLong(_))
        ));
    }

    #[test]
    fn test_decode_eof_flushes_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"ERROR :Closing link"[..]);
        assert_eq!(
            codec.decode_eof(&mut buf).unwrap().as_deref(),
            Some("ERROR :Closing link")
        );
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_latin1_bytes_decode_with_replacement_characters() {
        let mut codec = LineCodec::new();
        // "café" in latin-1, followed by a valid line
        let mut buf = BytesMut::from(&b"PRIVMSG #fr :caf\xe9\r\nPING :ok\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #fr :caf\u{FFFD}")
        );
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :ok"));
    }

    #[test]
    fn test_encode_writes_line_verbatim() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("NICK me\r\n".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"NICK me\r\n");
    }
}
