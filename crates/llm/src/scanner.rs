use bytes::{Buf, BytesMut};

use crate::{
    LlmError, Stats, TokenSink,
    messages::{DataLine, parse_data_line},
};

/// Splits an arbitrarily chunked byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without `\n` and without a trailing `\r`.
    pub fn next_line(&mut self) -> Option<BytesMut> {
        let newline = self.buffer.iter().position(|&b| b == b'\n')?;

        let mut line = self.buffer.split_to(newline);
        self.buffer.advance(1);

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        Some(line)
    }

    /// Whatever is left once the body ended without a final newline.
    pub fn finish(&mut self) -> Option<BytesMut> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut line = self.buffer.split();

        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }

        Some(line)
    }
}

/// Turns upstream body bytes into token callbacks, accumulating [`Stats`].
#[derive(Debug, Default)]
pub(crate) struct ChunkScanner {
    lines: LineSplitter,
    stats: Stats,
}

impl ChunkScanner {
    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub async fn feed<S>(&mut self, bytes: &[u8], sink: &mut S) -> crate::Result<()>
    where
        S: TokenSink + ?Sized,
    {
        self.lines.push(bytes);

        while let Some(line) = self.lines.next_line() {
            self.line(&line, sink).await?;
        }

        Ok(())
    }

    pub async fn finish<S>(&mut self, sink: &mut S) -> crate::Result<()>
    where
        S: TokenSink + ?Sized,
    {
        match self.lines.finish() {
            Some(line) => self.line(&line, sink).await,
            None => Ok(()),
        }
    }

    async fn line<S>(&mut self, line: &[u8], sink: &mut S) -> crate::Result<()>
    where
        S: TokenSink + ?Sized,
    {
        let Ok(line) = std::str::from_utf8(line) else {
            log::debug!("Skipping upstream line with invalid UTF-8");
            return Ok(());
        };

        let DataLine::Chunk(chunk) = parse_data_line(line) else {
            return Ok(());
        };

        if let Some(usage) = chunk.usage {
            self.stats.prompt_tokens = usage.prompt_tokens;
            self.stats.completion_tokens = usage.completion_tokens;
        }

        if let Some(token) = chunk.content() {
            // Only content-bearing lines count toward the received bytes.
            self.stats.bytes_received += line.len() + 1;
            self.stats.bytes_sent += token.len();

            sink.send_token(token).await.map_err(LlmError::Sink)?;
        }

        Ok(())
    }
}
