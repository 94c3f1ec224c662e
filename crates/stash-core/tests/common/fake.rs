//! Scriptable in-memory downloader for cache tests: counts invocations,
//! optionally delays, fails the first N opens, or truncates the body stream.

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use stash_core::downloader::{ByteStream, Download, DownloadError, Downloader};
use tokio::io::{AsyncRead, ReadBuf};
use url::Url;

pub struct FakeDownloader {
    body: Vec<u8>,
    status: u32,
    delay: Option<Duration>,
    fail_first_opens: usize,
    truncate_stream: bool,
    calls: AtomicUsize,
}

impl FakeDownloader {
    pub fn serving(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            status: 200,
            delay: None,
            fail_first_opens: 0,
            truncate_stream: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_status(mut self, status: u32) -> Self {
        self.status = status;
        self
    }

    /// Hold each open for a while so concurrent callers overlap reliably.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the first `n` opens with a transport error, then succeed.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first_opens = n;
        self
    }

    /// Serve the body, then break the stream mid-read.
    pub fn with_truncated_stream(mut self) -> Self {
        self.truncate_stream = true;
        self
    }

    /// How many times `open` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn open(&self, _url: &Url) -> Result<Download, DownloadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.fail_first_opens {
            return Err(DownloadError::Transport("simulated outage".into()));
        }
        let stream: ByteStream = if self.truncate_stream {
            Box::new(TruncatedReader {
                body: Some(self.body.clone()),
            })
        } else {
            Box::new(io::Cursor::new(self.body.clone()))
        };
        Ok(Download {
            status: self.status,
            stream,
        })
    }
}

/// Yields the whole body in one read, then errors instead of EOF.
struct TruncatedReader {
    body: Option<Vec<u8>>,
}

impl AsyncRead for TruncatedReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.body.take() {
            Some(bytes) => {
                buf.put_slice(&bytes);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated mid-stream failure",
            ))),
        }
    }
}
