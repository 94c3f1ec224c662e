//! Asset cache facade: "return cached path if present, else
//! fetch-validate-store-then-return", plus best-effort prefetch.
//!
//! Composition: hit check via the content addressor, misses funneled through
//! the single-flight store so concurrent callers for one key share one fetch,
//! bytes persisted by the atomic writer. Cheap to clone; clones share state.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::addressor::{AssetKey, ContentAddressor};
use crate::checksum::Checksum;
use crate::downloader::Downloader;
use crate::error::{CacheError, FetchFailure, WriteError};
use crate::single_flight::SingleFlightStore;
use crate::writer;

#[derive(Clone)]
pub struct AssetCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    addressor: ContentAddressor,
    downloader: Arc<dyn Downloader>,
    inflight: SingleFlightStore<AssetKey, PathBuf, CacheError>,
}

impl AssetCache {
    pub fn new(cache_dir: impl Into<PathBuf>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                addressor: ContentAddressor::new(cache_dir),
                downloader,
                inflight: SingleFlightStore::new(),
            }),
        }
    }

    /// Return the local path for `(url, checksum)`, fetching and persisting
    /// the asset first if it is not cached yet. A cache hit touches only the
    /// filesystem. Concurrent calls for the same key share one fetch; a
    /// failed fetch is not replayed, the next call starts fresh.
    pub async fn resolve_or_fetch(
        &self,
        url: Url,
        checksum: Option<Checksum>,
    ) -> Result<PathBuf, CacheError> {
        let key = AssetKey::new(url, checksum);
        let destination = self.inner.addressor.locate(&key);
        if ContentAddressor::exists(&destination) {
            return Ok(destination);
        }

        let inner = Arc::clone(&self.inner);
        self.inner
            .inflight
            .get_or_start(key.clone(), move || fetch_and_store(inner, key, destination))
            .await
    }

    /// Path if the asset is already cached, `None` otherwise. Never performs
    /// network I/O.
    pub fn peek(&self, url: &Url, checksum: Option<&Checksum>) -> Option<PathBuf> {
        let key = AssetKey::new(url.clone(), checksum.cloned());
        let path = self.inner.addressor.locate(&key);
        ContentAddressor::exists(&path).then_some(path)
    }

    /// Fire-and-forget cache population. Each item runs as a detached task
    /// scoped to the runtime, not to the caller, so dropping the caller does
    /// not abort it; failures are logged and swallowed per item. Shares the
    /// in-flight store with `resolve_or_fetch`, so a prefetch and a
    /// concurrent explicit resolve for the same key collapse into one fetch.
    pub fn prefetch(&self, items: impl IntoIterator<Item = (Url, Option<Checksum>)>) {
        for (url, checksum) in items {
            let cache = self.clone();
            tokio::spawn(async move {
                if let Err(err) = cache.resolve_or_fetch(url.clone(), checksum).await {
                    tracing::debug!(%url, error = %err, "prefetch failed");
                }
            });
        }
    }

    /// Directory the cache writes into.
    pub fn cache_dir(&self) -> &std::path::Path {
        self.inner.addressor.root()
    }
}

async fn fetch_and_store(
    inner: Arc<CacheInner>,
    key: AssetKey,
    destination: PathBuf,
) -> Result<PathBuf, CacheError> {
    // A fetch for this key may have finished between the caller's hit check
    // and joining the flight; content per key is immutable, so done is done.
    if ContentAddressor::exists(&destination) {
        return Ok(destination);
    }

    inner
        .addressor
        .ensure_root()
        .map_err(|e| CacheError::DirectoryUnavailable {
            path: inner.addressor.root().to_path_buf(),
            source: Arc::new(e),
        })?;

    let download = inner
        .downloader
        .open(&key.url)
        .await
        .map_err(|e| CacheError::FetchFailed {
            url: key.url.clone(),
            reason: FetchFailure::Transport(e.to_string()),
        })?;
    if !download.status_is_success() {
        return Err(CacheError::FetchFailed {
            url: key.url.clone(),
            reason: FetchFailure::Status(download.status),
        });
    }

    writer::write_atomic(download.stream, &destination, key.checksum.as_ref())
        .await
        .map_err(|e| match e {
            WriteError::Source(e) => CacheError::FetchFailed {
                url: key.url.clone(),
                reason: FetchFailure::Transport(e.to_string()),
            },
            WriteError::ChecksumMismatch { expected, actual } => {
                CacheError::ChecksumMismatch { expected, actual }
            }
            WriteError::Io(e) => CacheError::PersistFailed {
                path: destination.clone(),
                source: Arc::new(e),
            },
        })?;

    tracing::debug!(url = %key.url, path = %destination.display(), "asset cached");
    Ok(destination)
}
