//! Prefetch command: warm the cache for several assets.
//!
//! The library's `prefetch` is fire-and-forget, which would race `main`
//! exiting; the command therefore awaits all items concurrently while keeping
//! the same per-item swallow-and-log failure policy.

use anyhow::Result;
use futures::future::join_all;
use stash_core::AssetCache;

use super::parse_url;

pub async fn run_prefetch(cache: &AssetCache, urls: &[String]) -> Result<()> {
    let mut tasks = Vec::with_capacity(urls.len());
    for raw in urls {
        let url = parse_url(raw)?;
        let cache = cache.clone();
        tasks.push(async move {
            match cache.resolve_or_fetch(url.clone(), None).await {
                Ok(path) => println!("{}  {}", url, path.display()),
                Err(err) => {
                    tracing::warn!(%url, error = %err, "prefetch failed");
                    eprintln!("{url}  failed: {err}");
                }
            }
        });
    }
    join_all(tasks).await;
    Ok(())
}
