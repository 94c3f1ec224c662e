//! Fetch command: resolve an asset through the cache and print its path.

use anyhow::Result;
use stash_core::AssetCache;

use super::{parse_sha256, parse_url};

/// Resolve (fetching if needed) and print the cached path.
pub async fn run_fetch(cache: &AssetCache, url: &str, sha256: Option<&str>) -> Result<()> {
    let url = parse_url(url)?;
    let checksum = parse_sha256(sha256)?;
    let path = cache.resolve_or_fetch(url, checksum).await?;
    println!("{}", path.display());
    Ok(())
}
