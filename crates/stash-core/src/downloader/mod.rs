//! Download boundary: a trait the cache consumes, plus the curl-backed
//! production implementation in `http`.
//!
//! The downloader owns no caching logic. It opens a URL and hands back the
//! response status with a readable byte stream; everything else (dedup,
//! validation, atomic persistence) happens above it.

mod http;

pub use http::{HttpDownloader, HttpOptions};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;
use url::Url;

/// Readable body stream. Errors surfaced while reading are transport errors.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// An opened response: the final status code and the body stream.
pub struct Download {
    pub status: u32,
    pub stream: ByteStream,
}

impl Download {
    pub fn status_is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to open a URL at all (DNS, TLS, connect, malformed response).
/// Failures after the body started streaming surface as stream read errors.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("transport: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Open `url` and return the response status and body stream. Returns as
    /// soon as the status is known; the body is consumed by the caller.
    async fn open(&self, url: &Url) -> Result<Download, DownloadError>;
}
