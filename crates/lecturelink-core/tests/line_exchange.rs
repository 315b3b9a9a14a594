//! Integration tests for the lecturelink-core line protocol.
//!
//! These tests drive the public codec API the way the two ends of an exchange
//! use it: the client encodes a request, the owner decodes it and computes the
//! reply, and the client decodes the reply.

use lecturelink_core::protocol::{decode_line, encode_line, reply_to, ProtocolError};
use lecturelink_core::{reverse_line, LogEntry, MessageLog};

/// Runs one request through the owner's reply path and decodes the answer on
/// the client side.
fn exchange(request: &str) -> String {
    let request_frame = encode_line(request).expect("request must encode");
    let reply = reply_to(&request_frame);
    assert!(reply.fault.is_none(), "well-formed request must not report an error");
    assert_eq!(reply.request, request);
    let reply_frame = encode_line(&reply.response).expect("reply must encode");
    decode_line(&reply_frame).expect("reply must decode")
}

#[test]
fn test_reference_greeting_is_answered_reversed() {
    assert_eq!(exchange("Hello from client"), "tneilc morf olleH");
}

#[test]
fn test_response_reversed_again_yields_request() {
    for request in [
        "",
        "?",
        "What is on the exam?",
        "Ünïcödé ✓ works",
        "tabs\tand  spaces",
    ] {
        let response = exchange(request);
        assert_eq!(reverse_line(&response), request, "request: {request:?}");
    }
}

#[test]
fn test_empty_request_yields_empty_response() {
    assert_eq!(exchange(""), "");
}

#[test]
fn test_truncated_request_is_answered_with_empty_line() {
    // Arrange: the client's connection died before the terminator arrived.
    let truncated = b"Hello from cli";

    // Act
    let reply = reply_to(truncated);

    // Assert
    assert_eq!(reply.response, "");
    assert_eq!(reply.fault, Some(ProtocolError::Unterminated));
}

#[test]
fn test_client_log_after_reference_exchange() {
    // Arrange
    let mut log = MessageLog::new();
    let request = "Hello from client";

    // Act
    log.append(LogEntry::sent(request));
    log.append(LogEntry::received(exchange(request)));

    // Assert
    assert_eq!(
        log.tail(2),
        &[
            LogEntry::sent("Hello from client"),
            LogEntry::received("tneilc morf olleH"),
        ]
    );
}
