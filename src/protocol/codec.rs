//! JSON-lines codec for the host channel.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so an
//! unterminated or runaway line from the host cannot exhaust memory. Use as
//! the codec parameter for [`tokio_util::codec::FramedRead`].
//!
//! An over-limit line is reported as [`InboundFrame::Oversize`] rather than
//! a decode error: `FramedRead` fuses itself after the first `Err`, and one
//! bad line must not terminate the stream. The inner codec discards the
//! rest of the offending line and resynchronizes on the next newline.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// One decoded item from the host's input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A complete line, without its trailing newline.
    Line(String),
    /// A line that exceeded [`MAX_LINE_BYTES`] and was discarded.
    Oversize,
}

/// Newline-delimited UTF-8 codec for the host channel.
///
/// Encoding appends the `\n` delimiter and enforces no limit.
#[derive(Debug)]
pub struct BridgeCodec(LinesCodec);

impl BridgeCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = InboundFrame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        map_decoded(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        map_decoded(self.0.decode_eof(src))
    }
}

impl Encoder<String> for BridgeCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        match self.0.encode(item, dst) {
            Ok(()) => Ok(()),
            Err(LinesCodecError::MaxLineLengthExceeded) => Err(AppError::Protocol(
                "outbound line exceeded the length limit".into(),
            )),
            Err(LinesCodecError::Io(io_err)) => Err(AppError::Io(io_err.to_string())),
        }
    }
}

fn map_decoded(
    decoded: std::result::Result<Option<String>, LinesCodecError>,
) -> Result<Option<InboundFrame>> {
    match decoded {
        Ok(Some(line)) => Ok(Some(InboundFrame::Line(line))),
        Ok(None) => Ok(None),
        // LinesCodec enters its discarding state and picks up again after
        // the next newline; surfacing an item keeps FramedRead unfused.
        Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(InboundFrame::Oversize)),
        Err(LinesCodecError::Io(io_err)) => Err(AppError::Io(io_err.to_string())),
    }
}
