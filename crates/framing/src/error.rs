use std::io;

use thiserror::Error;

/// Errors produced while reading or writing length-prefixed frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream ended before a complete length prefix was read.
    #[error("end of stream")]
    Eof,

    /// The bytes before `:` are not a decimal length.
    #[error("invalid length prefix: {0:?}")]
    BadPrefix(String),

    /// The announced payload is larger than [`crate::MAX_FRAME_LEN`].
    #[error("message too large: {0} bytes")]
    TooLarge(usize),

    /// The payload is not valid UTF-8.
    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    /// I/O failure on the underlying stream, including end of stream inside a payload.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// True when the peer closed the stream cleanly between frames.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}
