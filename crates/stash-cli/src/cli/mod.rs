//! CLI for the stash asset cache.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use stash_core::config;
use stash_core::downloader::HttpDownloader;
use stash_core::AssetCache;

use commands::{run_checksum, run_fetch, run_peek, run_prefetch};

/// Top-level CLI for the stash asset cache.
#[derive(Debug, Parser)]
#[command(name = "stash")]
#[command(about = "stash: deduplicated, checksum-validated remote asset cache", long_about = None)]
pub struct Cli {
    /// Cache directory (overrides config and the XDG default).
    #[arg(long, global = true, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch an asset into the cache (or return its cached path) and print it.
    Fetch {
        /// HTTP/HTTPS URL of the asset.
        url: String,

        /// Expected SHA-256 of the asset body, as hex. Content failing
        /// validation is never cached.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Print the cached path for an asset without any network access.
    Peek {
        /// HTTP/HTTPS URL of the asset.
        url: String,

        /// Expected SHA-256 used when the asset was fetched, if any.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,
    },

    /// Warm the cache for several assets; individual failures are logged,
    /// not fatal.
    Prefetch {
        /// HTTP/HTTPS URLs of the assets.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Compute SHA-256 of a local file (e.g. to pin an asset's checksum).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let cache_dir = match cli.dir {
            Some(dir) => dir,
            None => cfg.resolved_cache_dir()?,
        };
        let cache = AssetCache::new(cache_dir, Arc::new(HttpDownloader::from_config(&cfg)));

        match cli.command {
            CliCommand::Fetch { url, sha256 } => {
                run_fetch(&cache, &url, sha256.as_deref()).await?
            }
            CliCommand::Peek { url, sha256 } => run_peek(&cache, &url, sha256.as_deref())?,
            CliCommand::Prefetch { urls } => run_prefetch(&cache, &urls).await?,
            CliCommand::Checksum { path } => run_checksum(std::path::Path::new(&path))?,
        }

        Ok(())
    }
}
