//! Content addressing: deterministic mapping from asset key to cache path.
//!
//! The filename is `<xxh3 of url, hex>[_<digest>].<extension>`. The URL hash
//! only needs a low collision rate over realistic cardinalities, so xxh3 is
//! used instead of a cryptographic hash. The original URL's file extension is
//! preserved because downstream consumers (e.g. video players) branch on it,
//! and the expected-content digest is embedded so the same URL with two
//! different checksums never collides.

use std::path::{Path, PathBuf};

use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use crate::checksum::Checksum;

/// Extensions longer than this are treated as noise and dropped.
const MAX_EXTENSION_LEN: usize = 16;

/// Identity of a cacheable asset. A URL without a checksum and the same URL
/// with a checksum are distinct keys: the expected content differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetKey {
    pub url: Url,
    pub checksum: Option<Checksum>,
}

impl AssetKey {
    pub fn new(url: Url, checksum: Option<Checksum>) -> Self {
        Self { url, checksum }
    }
}

/// Maps asset keys to paths under a fixed cache directory.
#[derive(Debug, Clone)]
pub struct ContentAddressor {
    root: PathBuf,
}

impl ContentAddressor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the cache directory if missing.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Pure mapping from key to local path. Same key, same path, for the
    /// lifetime of the cache directory.
    pub fn locate(&self, key: &AssetKey) -> PathBuf {
        self.root.join(file_name_for(key))
    }

    /// Filesystem probe; no network, no side effects.
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }
}

fn file_name_for(key: &AssetKey) -> String {
    let mut name = format!("{:016x}", xxh3_64(key.url.as_str().as_bytes()));
    if let Some(checksum) = &key.checksum {
        name.push('_');
        name.push_str(checksum.hex_digest());
    }
    if let Some(ext) = extension_from_url(&key.url) {
        name.push('.');
        name.push_str(&ext);
    }
    name
}

/// Extension of the last URL path segment, sanitized for Linux filesystems.
/// The query string never contributes (`Url::path` excludes it).
fn extension_from_url(url: &Url) -> Option<String> {
    let segment = url.path().split('/').filter(|s| !s.is_empty()).last()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    let clean: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if clean.is_empty() || clean.len() > MAX_EXTENSION_LEN {
        None
    } else {
        Some(clean)
    }
}
