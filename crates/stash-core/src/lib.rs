pub mod config;
pub mod logging;

pub mod addressor;
pub mod cache;
pub mod checksum;
pub mod downloader;
pub mod error;
pub mod single_flight;
pub mod writer;

pub use addressor::{AssetKey, ContentAddressor};
pub use cache::AssetCache;
pub use checksum::{Checksum, ChecksumAlgorithm, InvalidDigest};
pub use error::CacheError;
