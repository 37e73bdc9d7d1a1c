//! Line framing for the worker's byte streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! worker emitting an unterminated or absurdly large message cannot force
//! unbounded buffering. Used as the codec parameter for
//! [`tokio_util::codec::FramedRead`] on the worker's stdout; a trailing
//! partial line stays in the codec's buffer until the next chunk arrives.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted line length: 4 MiB.
///
/// Inbound lines exceeding this limit cause [`WireCodec::decode`] to return
/// [`AppError::Framing`] instead of allocating further.
pub const MAX_LINE_BYTES: usize = 4 * 1_048_576;

/// Newline-delimited JSON codec for the worker streams.
///
/// Each `\n`-terminated UTF-8 string is one complete message. Oversized
/// inbound lines surface as [`AppError::Framing`]; the reader logs and skips
/// them, so a single bad line never tears down the stream.
#[derive(Debug)]
pub struct WireCodec(LinesCodec);

impl WireCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }

    /// Create a codec with a custom line-length limit.
    #[must_use]
    pub fn with_max_length(max_bytes: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_bytes))
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for WireCodec {
    type Item = String;
    type Error = AppError;

    /// Decode the next newline-terminated line from `src`.
    ///
    /// Returns `Ok(None)` when `src` holds no complete line yet.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode(src).map_err(map_codec_error)
    }

    /// Decode the final line when the stream reaches EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        self.0.decode_eof(src).map_err(map_codec_error)
    }
}

impl Encoder<String> for WireCodec {
    type Error = AppError;

    /// Encode `item` as a `\n`-terminated line into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Io`] on underlying I/O failures. The line-length
    /// limit is a decoder-side concern and is not enforced here.
    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        self.0.encode(item, dst).map_err(map_codec_error)
    }
}

// ── Private helper ────────────────────────────────────────────────────────────

/// Map a [`LinesCodecError`] to an [`AppError`].
fn map_codec_error(e: LinesCodecError) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Framing("line too long: exceeded codec limit".into())
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
