//! curl-backed downloader.
//!
//! The blocking curl easy transfer runs on a `spawn_blocking` worker; body
//! chunks cross into async land over a bounded channel (backpressure keeps the
//! worker from outrunning the disk). `open` resolves once the status line of
//! the final response is known, before the body has been consumed.

use std::cell::{Cell, RefCell};
use std::io;
use std::pin::Pin;
use std::str;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::{mpsc, oneshot};
use url::Url;

use super::{Download, DownloadError, Downloader};
use crate::config::StashConfig;

/// Bounded chunk channel depth between the curl worker and the reader.
const CHANNEL_DEPTH: usize = 8;

/// Transport tuning for the curl transfer.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub connect_timeout: Duration,
    pub transfer_timeout: Duration,
    pub max_redirects: u32,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(3600),
            max_redirects: 10,
        }
    }
}

/// Production `Downloader` over HTTP/HTTPS.
pub struct HttpDownloader {
    options: HttpOptions,
}

impl HttpDownloader {
    pub fn new(options: HttpOptions) -> Self {
        Self { options }
    }

    pub fn from_config(cfg: &StashConfig) -> Self {
        Self::new(HttpOptions {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            transfer_timeout: Duration::from_secs(cfg.transfer_timeout_secs),
            max_redirects: cfg.max_redirects,
        })
    }
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn open(&self, url: &Url) -> Result<Download, DownloadError> {
        let (status_tx, status_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_DEPTH);
        let target = url.to_string();
        let options = self.options.clone();

        let _worker =
            tokio::task::spawn_blocking(move || run_transfer(&target, &options, status_tx, chunk_tx));

        match status_rx.await {
            Ok(Ok(status)) => Ok(Download {
                status,
                stream: Box::new(ChannelReader::new(chunk_rx)),
            }),
            Ok(Err(msg)) => Err(DownloadError::Transport(msg)),
            Err(_) => Err(DownloadError::Transport(
                "transfer worker exited before a response".into(),
            )),
        }
    }
}

type StatusSender = oneshot::Sender<Result<u32, String>>;

fn run_transfer(
    url: &str,
    options: &HttpOptions,
    status_tx: StatusSender,
    chunk_tx: mpsc::Sender<io::Result<Vec<u8>>>,
) {
    let status_tx = RefCell::new(Some(status_tx));
    if let Err(e) = perform(url, options, &status_tx, &chunk_tx) {
        match status_tx.borrow_mut().take() {
            // Failed before any body byte: report through the open() path.
            Some(tx) => {
                let _ = tx.send(Err(e.to_string()));
            }
            // Failed mid-body: surface as a stream read error.
            None => {
                let _ = chunk_tx.blocking_send(Err(io::Error::new(io::ErrorKind::Other, e.to_string())));
            }
        }
    }
    // Dropping chunk_tx ends the stream.
}

fn perform(
    url: &str,
    options: &HttpOptions,
    status_tx: &RefCell<Option<StatusSender>>,
    chunk_tx: &mpsc::Sender<io::Result<Vec<u8>>>,
) -> Result<(), curl::Error> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(options.max_redirects)?;
    easy.connect_timeout(options.connect_timeout)?;
    easy.timeout(options.transfer_timeout)?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;

    // Tracks the status line of the most recent response, so after redirects
    // the final one wins.
    let status = Cell::new(0u32);
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = str::from_utf8(line).ok().and_then(parse_status_line) {
                status.set(code);
            }
            true
        })?;
        transfer.write_function(|data| {
            if let Some(tx) = status_tx.borrow_mut().take() {
                let _ = tx.send(Ok(status.get()));
            }
            match chunk_tx.blocking_send(Ok(data.to_vec())) {
                Ok(()) => Ok(data.len()),
                // Reader went away; short write aborts the transfer.
                Err(_) => Ok(0),
            }
        })?;
        transfer.perform()?;
    }

    // Empty body: the write callback never ran, report the final code now.
    if let Some(tx) = status_tx.borrow_mut().take() {
        let code = easy.response_code().unwrap_or_else(|_| status.get());
        let _ = tx.send(Ok(code));
    }
    Ok(())
}

/// Parse `HTTP/1.1 200 OK` (or the HTTP/2 form) into the status code.
fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// `AsyncRead` over the chunk channel. Buffers the current chunk so callers
/// may read with any buffer size.
struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    offset: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<io::Result<Vec<u8>>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
        }
    }
}

impl AsyncRead for ChannelReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            if this.offset < this.pending.len() {
                let n = (this.pending.len() - this.offset).min(buf.remaining());
                buf.put_slice(&this.pending[this.offset..this.offset + n]);
                this.offset += n;
                return Poll::Ready(Ok(()));
            }
            match this.rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending = chunk;
                    this.offset = 0;
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
