//! Error taxonomy for the asset cache.
//!
//! `CacheError` is the only error type callers of the cache see. It is `Clone`
//! (I/O sources are wrapped in `Arc`) so one outcome can be handed to every
//! waiter joined on a shared in-flight fetch.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use url::Url;

/// Why a fetch failed: the server answered with a non-success status, or the
/// transport broke before/while the body streamed.
#[derive(Debug, Clone)]
pub enum FetchFailure {
    Status(u32),
    Transport(String),
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Status(code) => write!(f, "HTTP {}", code),
            FetchFailure::Transport(msg) => write!(f, "transport: {}", msg),
        }
    }
}

/// Errors surfaced by `AssetCache::resolve_or_fetch`. Nothing is retried
/// internally; callers decide whether to call again.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache directory could not be created.
    #[error("cache directory unavailable: {path}: {source}")]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Non-success status or transport error. A later call starts a fresh
    /// fetch (failed in-flight entries are evicted).
    #[error("fetch failed for {url}: {reason}")]
    FetchFailed { url: Url, reason: FetchFailure },

    /// Downloaded bytes did not match the expected digest. The destination
    /// file is guaranteed untouched.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Disk I/O failure while writing or publishing the file.
    #[error("persist failed at {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

/// Errors from the atomic writer. Kept separate from `CacheError` so the
/// facade can attribute a failed stream read to the transport and a failed
/// disk write to persistence.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Reading from the byte source failed (the network side of the stream).
    #[error("source read failed: {0}")]
    Source(#[source] io::Error),

    /// Accumulated digest did not match the expected checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Creating, writing, syncing, or renaming the file failed.
    #[error("write failed: {0}")]
    Io(#[source] io::Error),
}
