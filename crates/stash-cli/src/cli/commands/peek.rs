//! Peek command: probe the cache without network I/O.

use anyhow::Result;
use stash_core::AssetCache;

use super::{parse_sha256, parse_url};

/// Print the cached path, or report a miss via exit code 2.
pub fn run_peek(cache: &AssetCache, url: &str, sha256: Option<&str>) -> Result<()> {
    let url = parse_url(url)?;
    let checksum = parse_sha256(sha256)?;
    match cache.peek(&url, checksum.as_ref()) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => {
            eprintln!("not cached: {url}");
            std::process::exit(2);
        }
    }
}
