//! Length-prefixed message framing for byte streams.
//!
//! Wire format: the payload length in ASCII decimal, a single `:`, then exactly
//! that many payload bytes.
//!
//! ```text
//! 13:hello, world!
//! 0:
//! ```
//!
//! An empty frame (`0:`) carries no payload; the token server uses it to mark the
//! end of a response. Frames larger than [`MAX_FRAME_LEN`] are rejected before any
//! payload byte is consumed.

#![deny(missing_docs)]

mod error;

use std::fmt::Write as _;

use bytes::{Buf, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};

pub use error::FrameError;

/// Largest payload accepted on the wire: 1 MiB.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Upper bound on the number of bytes scanned for the `:` delimiter.
const MAX_PREFIX_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Default)]
enum State {
    #[default]
    Prefix,
    Payload(usize),
}

/// Codec for `<length>:<payload>` frames.
///
/// Decodes into `String` payloads and encodes anything that is `AsRef<[u8]>`.
/// Each encoded frame lands in the write buffer as one contiguous run of bytes.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    state: State,
}

impl FrameCodec {
    /// Creates a codec positioned at a frame boundary.
    pub fn new() -> Self {
        Self::default()
    }

    fn decode_prefix(&mut self, src: &mut BytesMut) -> Result<Option<usize>, FrameError> {
        let scan = &src[..src.len().min(MAX_PREFIX_LEN + 1)];

        let Some(colon) = scan.iter().position(|&b| b == b':') else {
            if src.len() > MAX_PREFIX_LEN {
                return Err(FrameError::BadPrefix(String::from_utf8_lossy(scan).into_owned()));
            }

            return Ok(None);
        };

        let prefix = &src[..colon];

        if prefix.is_empty() || !prefix.iter().all(u8::is_ascii_digit) {
            return Err(FrameError::BadPrefix(String::from_utf8_lossy(prefix).into_owned()));
        }

        let length = prefix
            .iter()
            .try_fold(0usize, |acc, digit| {
                acc.checked_mul(10)?.checked_add(usize::from(digit - b'0'))
            })
            .unwrap_or(usize::MAX);

        if length > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(length));
        }

        src.advance(colon + 1);

        Ok(Some(length))
    }
}

impl Decoder for FrameCodec {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        let length = match self.state {
            State::Payload(length) => length,
            State::Prefix => match self.decode_prefix(src)? {
                Some(length) => {
                    self.state = State::Payload(length);
                    length
                }
                None => return Ok(None),
            },
        };

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        let payload = src.split_to(length);
        self.state = State::Prefix;

        String::from_utf8(payload.to_vec())
            .map(Some)
            .map_err(|_| FrameError::InvalidUtf8)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, FrameError> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }

        match self.state {
            // A partial prefix at end of stream is a clean close, not a protocol error.
            State::Prefix => {
                src.clear();
                Ok(None)
            }
            State::Payload(length) => Err(FrameError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("stream ended after {} of {length} payload bytes", src.len()),
            ))),
        }
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), FrameError> {
        let payload = item.as_ref();

        if payload.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLarge(payload.len()));
        }

        dst.reserve(MAX_PREFIX_LEN + payload.len());
        write!(dst, "{}:", payload.len()).map_err(|_| FrameError::Io(std::io::ErrorKind::OutOfMemory.into()))?;
        dst.extend_from_slice(payload);

        Ok(())
    }
}

/// Reads the next frame, mapping a clean end of stream to [`FrameError::Eof`].
pub async fn read_message<R>(reader: &mut FramedRead<R, FrameCodec>) -> Result<String, FrameError>
where
    R: AsyncRead + Unpin,
{
    reader.next().await.unwrap_or(Err(FrameError::Eof))
}

/// Writes one frame and flushes it to the underlying stream.
pub async fn write_message<W>(writer: &mut FramedWrite<W, FrameCodec>, message: &str) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    writer.send(message).await
}
