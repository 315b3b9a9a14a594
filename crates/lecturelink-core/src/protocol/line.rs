//! Line codec for the one-shot request/response exchange.
//!
//! Wire format, per direction, per TCP connection:
//! ```text
//! [utf-8 text without '\n'][0x0A]
//! ```
//! There is no length prefix, no header, and no framing beyond the single
//! terminator.  Exactly one line travels in each direction and then the
//! connection is closed.
//!
//! # The reversal contract
//!
//! The group owner answers every request with the same line reversed
//! character by character (Unicode scalar values, not bytes), so
//! `"Hello from client"` comes back as `"tneilc morf olleH"`.
//!
//! # Carriage returns
//!
//! Peers built on line readers that accept `"\r\n"` may send one.  A single
//! `'\r'` immediately before the terminator is stripped on decode; a `'\r'`
//! anywhere else is ordinary text.

use thiserror::Error;

/// Well-known TCP port the group owner listens on.
pub const DEFAULT_PORT: u16 = 8888;

/// The only framing byte in the protocol.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Upper bound on a single line, terminator included.
///
/// Readers stop consuming after this many bytes so a peer that never sends a
/// terminator cannot grow the buffer without limit.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Errors that can occur while encoding or decoding a line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The text to send contains the terminator, which would split it in two.
    #[error("line contains an embedded terminator at byte {0}")]
    EmbeddedTerminator(usize),

    /// The received bytes end before a terminator was seen.
    #[error("line is not terminated by '\\n'")]
    Unterminated,

    /// The received line is longer than the configured limit.
    #[error("line exceeds {limit} bytes")]
    TooLong { limit: usize },

    /// The received bytes are not valid UTF-8.
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `text` as one terminated line.
///
/// # Errors
///
/// Returns [`ProtocolError::EmbeddedTerminator`] if `text` contains `'\n'`.
///
/// # Examples
///
/// ```rust
/// use lecturelink_core::protocol::{decode_line, encode_line};
///
/// let frame = encode_line("Hello from client").unwrap();
/// assert_eq!(frame, b"Hello from client\n");
/// assert_eq!(decode_line(&frame).unwrap(), "Hello from client");
/// ```
pub fn encode_line(text: &str) -> Result<Vec<u8>, ProtocolError> {
    if let Some(pos) = text.bytes().position(|b| b == LINE_TERMINATOR) {
        return Err(ProtocolError::EmbeddedTerminator(pos));
    }
    let mut frame = Vec::with_capacity(text.len() + 1);
    frame.extend_from_slice(text.as_bytes());
    frame.push(LINE_TERMINATOR);
    Ok(frame)
}

/// Decodes one terminated line, returning the text without its terminator.
///
/// `frame` must end with the terminator and contain no other one; this is
/// exactly what a `read_until(b'\n')` call yields on a well-behaved stream.
///
/// # Errors
///
/// - [`ProtocolError::Unterminated`] if `frame` does not end with `'\n'`
///   (including the empty frame produced by an immediate EOF).
/// - [`ProtocolError::InvalidUtf8`] if the body is not UTF-8.
pub fn decode_line(frame: &[u8]) -> Result<String, ProtocolError> {
    let body = match frame.split_last() {
        Some((&LINE_TERMINATOR, body)) => body,
        _ => return Err(ProtocolError::Unterminated),
    };
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    String::from_utf8(body.to_vec()).map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))
}

/// Reverses `line` character by character.
///
/// Reversal works on Unicode scalar values so multi-byte characters survive
/// intact, and applying it twice yields the input again.
pub fn reverse_line(line: &str) -> String {
    line.chars().rev().collect()
}

/// The owner's answer to one received frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The decoded request, empty if the frame was malformed.
    pub request: String,
    /// The line to send back.
    pub response: String,
    /// Why the frame was rejected, if it was.
    pub fault: Option<ProtocolError>,
}

/// Computes the owner's reply to a received frame.
///
/// A well-formed request is answered with its reversal.  A malformed one is
/// answered with the empty line so the exchange still completes; the error is
/// kept in [`Reply::fault`] for logging.
pub fn reply_to(frame: &[u8]) -> Reply {
    match decode_line(frame) {
        Ok(request) => {
            let response = reverse_line(&request);
            Reply {
                request,
                response,
                fault: None,
            }
        }
        Err(e) => Reply {
            request: String::new(),
            response: String::new(),
            fault: Some(e),
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_appends_terminator() {
        assert_eq!(encode_line("abc").unwrap(), b"abc\n");
    }

    #[test]
    fn test_encode_empty_line_is_single_terminator() {
        assert_eq!(encode_line("").unwrap(), b"\n");
    }

    #[test]
    fn test_encode_line_rejects_embedded_terminator() {
        assert_eq!(
            encode_line("two\nlines"),
            Err(ProtocolError::EmbeddedTerminator(3))
        );
    }

    #[test]
    fn test_decode_line_strips_terminator() {
        assert_eq!(decode_line(b"hello\n").unwrap(), "hello");
    }

    #[test]
    fn test_decode_line_strips_single_carriage_return() {
        assert_eq!(decode_line(b"hello\r\n").unwrap(), "hello");
        assert_eq!(decode_line(b"hello\r\r\n").unwrap(), "hello\r");
    }

    #[test]
    fn test_decode_line_rejects_missing_terminator() {
        assert_eq!(decode_line(b"hello"), Err(ProtocolError::Unterminated));
    }

    #[test]
    fn test_decode_line_rejects_empty_frame() {
        // An immediate EOF yields zero bytes, which is not a line.
        assert_eq!(decode_line(b""), Err(ProtocolError::Unterminated));
    }

    #[test]
    fn test_decode_line_rejects_invalid_utf8() {
        let result = decode_line(&[0xFF, 0xFE, b'\n']);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_reverse_line_matches_reference_exchange() {
        assert_eq!(reverse_line("Hello from client"), "tneilc morf olleH");
    }

    #[test]
    fn test_reverse_line_keeps_multibyte_characters_intact() {
        assert_eq!(reverse_line("añb→c"), "c→bña");
    }

    #[test]
    fn test_reverse_line_is_an_involution() {
        for s in ["", "a", "ab", "Hello from client", "日本語のテキスト", "x y\tz\r"] {
            assert_eq!(reverse_line(&reverse_line(s)), s, "input: {s:?}");
        }
    }

    #[test]
    fn test_reply_to_empty_line_is_empty() {
        let reply = reply_to(b"\n");
        assert_eq!(reply.response, "");
        assert!(reply.fault.is_none());
    }

    #[test]
    fn test_reply_to_malformed_frame_is_empty_with_error() {
        let reply = reply_to(&[0xC3, b'\n']);
        assert_eq!(reply.request, "");
        assert_eq!(reply.response, "");
        assert!(matches!(reply.fault, Some(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_reply_to_keeps_request_next_to_response() {
        let reply = reply_to(b"abc\r\n");
        assert_eq!(reply.request, "abc");
        assert_eq!(reply.response, "cba");
        assert!(reply.fault.is_none());
    }
}
