//! CLI command handlers. Each command is in its own file for clarity.

mod checksum;
mod fetch;
mod peek;
mod prefetch;

pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use peek::run_peek;
pub use prefetch::run_prefetch;

use anyhow::{Context, Result};
use stash_core::Checksum;
use url::Url;

/// Parse a URL argument with a readable error.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid URL: {raw}"))
}

/// Turn an optional `--sha256 HEX` argument into a checksum, rejecting
/// anything that is not a 64-character hex digest.
pub(crate) fn parse_sha256(hex_digest: Option<&str>) -> Result<Option<Checksum>> {
    hex_digest
        .map(Checksum::sha256)
        .transpose()
        .context("invalid --sha256 digest")
}
