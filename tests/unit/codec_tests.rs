//! Unit tests for the JSON-lines codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use modelwar_bridge::protocol::codec::{BridgeCodec, InboundFrame, MAX_LINE_BYTES};

/// A complete JSON object on a newline-terminated line is decoded without
/// error and returned without the trailing `\n`.
#[test]
fn single_line_decodes_without_newline() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::from("{\"command\":\"start_session\"}\n");

    let result = codec.decode(&mut buf).expect("valid line must decode");

    assert_eq!(
        result,
        Some(InboundFrame::Line("{\"command\":\"start_session\"}".to_owned()))
    );
}

/// Two lines delivered in one buffer decode as two separate items.
#[test]
fn batched_lines_decode_individually() {
    let mut codec = BridgeCodec::new();
    let raw = concat!(
        "{\"command\":\"start_session\"}\n",
        "{\"command\":\"shutdown\"}\n",
    );
    let mut buf = BytesMut::from(raw);

    assert!(codec.decode(&mut buf).expect("first decode").is_some());
    assert!(codec.decode(&mut buf).expect("second decode").is_some());
    assert!(codec.decode(&mut buf).expect("drained buffer").is_none());
}

/// A fragment without its terminating newline is buffered, not emitted.
#[test]
fn partial_line_is_buffered_until_newline() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::from("{\"command\":\"shut");

    let early = codec.decode(&mut buf).expect("fragment must buffer");
    assert!(early.is_none(), "no line before the newline arrives");

    buf.extend_from_slice(b"down\"}\n");
    let full = codec.decode(&mut buf).expect("completed line must decode");
    assert_eq!(
        full,
        Some(InboundFrame::Line("{\"command\":\"shutdown\"}".to_owned()))
    );
}

/// A line exceeding the limit yields an in-band `Oversize` frame instead
/// of a decode error, so the framed stream never fuses itself shut.
#[test]
fn oversized_line_yields_oversize_frame() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::from("x".repeat(MAX_LINE_BYTES + 2).as_str());
    buf.extend_from_slice(b"\n");

    let frame = codec.decode(&mut buf).expect("oversize must not error");
    assert_eq!(frame, Some(InboundFrame::Oversize));
}

/// After an oversized line the codec discards to the next newline and the
/// following line decodes normally.
#[test]
fn decoding_resumes_after_oversized_line() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::from("x".repeat(MAX_LINE_BYTES + 2).as_str());
    buf.extend_from_slice(b"\n{\"command\":\"start_session\"}\n");

    assert_eq!(
        codec.decode(&mut buf).expect("oversize frame"),
        Some(InboundFrame::Oversize)
    );

    // Drain the discarding state, then the next intact line.
    let mut next = None;
    for _ in 0..4 {
        if let Some(frame) = codec.decode(&mut buf).expect("post-oversize decode") {
            next = Some(frame);
            break;
        }
    }
    assert_eq!(
        next,
        Some(InboundFrame::Line("{\"command\":\"start_session\"}".to_owned()))
    );
}

/// Encoding appends the newline delimiter.
#[test]
fn encode_appends_newline() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::new();

    codec
        .encode("{\"type\":\"turn_ended\"}".to_owned(), &mut buf)
        .expect("encode must succeed");

    assert_eq!(&buf[..], b"{\"type\":\"turn_ended\"}\n");
}

/// A final unterminated line is still yielded at EOF.
#[test]
fn decode_eof_flushes_last_line() {
    let mut codec = BridgeCodec::new();
    let mut buf = BytesMut::from("{\"command\":\"shutdown\"}");

    let result = codec.decode_eof(&mut buf).expect("eof decode");
    assert_eq!(
        result,
        Some(InboundFrame::Line("{\"command\":\"shutdown\"}".to_owned()))
    );
}
