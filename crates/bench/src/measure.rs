use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, ReadBuf},
    time::Instant,
};

/// Counts every byte read through it.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    bytes: usize,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, bytes: 0 }
    }

    /// Bytes read so far.
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for CountingReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(())) = poll {
            self.bytes += buf.filled().len() - before;
        }

        poll
    }
}

/// Measurements of one prompt on one transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    pub bytes_received: usize,
    /// Request issued to first token event.
    pub ttft: Duration,
    pub token_count: usize,
    /// Sum of the gaps between consecutive token events.
    pub total_inter_token_time: Duration,
    pub total_time: Duration,
}

impl RunResult {
    /// Mean time between tokens, zero with fewer than two tokens.
    pub fn avg_tbt(&self) -> Duration {
        match u32::try_from(self.token_count) {
            Ok(count) if count > 1 => self.total_inter_token_time / (count - 1),
            _ => Duration::ZERO,
        }
    }

    pub fn bytes_per_token(&self) -> f64 {
        if self.token_count == 0 {
            return 0.0;
        }

        self.bytes_received as f64 / self.token_count as f64
    }
}

/// Turns token arrivals into a [`RunResult`].
///
/// Start it right before the request goes out and call [`Stopwatch::token`] the moment
/// a token event has been fully decoded.
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    last_token: Option<Instant>,
    result: RunResult,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            last_token: None,
            result: RunResult::default(),
        }
    }

    pub fn token(&mut self) {
        let now = Instant::now();

        match self.last_token {
            None => self.result.ttft = now - self.start,
            Some(last) => self.result.total_inter_token_time += now - last,
        }

        self.last_token = Some(now);
        self.result.token_count += 1;
    }

    pub fn finish(self, bytes_received: usize) -> RunResult {
        RunResult {
            bytes_received,
            total_time: self.start.elapsed(),
            ..self.result
        }
    }
}
