//! Checksum value types and digest computation.
//!
//! `StreamingDigest` accumulates a digest chunk by chunk so large assets never
//! need to be held in memory; `sha256_path` computes a digest of an existing
//! file (used by the CLI and for post-download audits).

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithm for asset validation.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Sha256,
}

impl ChecksumAlgorithm {
    /// Length of this algorithm's digest in hex characters.
    pub fn hex_digest_len(self) -> usize {
        match self {
            ChecksumAlgorithm::Sha256 => 64,
        }
    }
}

/// A digest string that is not hex of the algorithm's length. Rejected at
/// construction: digests end up embedded in cache filenames, so arbitrary
/// strings must never get that far.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {algorithm:?} digest: expected {expected_len} hex characters")]
pub struct InvalidDigest {
    algorithm: ChecksumAlgorithm,
    expected_len: usize,
}

/// Expected digest of an asset. Immutable value type; equality is structural.
/// The hex digest is validated and normalized to lowercase at construction,
/// so two spellings of the same digest compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    hex_digest: String,
}

impl Checksum {
    pub fn new(
        algorithm: ChecksumAlgorithm,
        hex_digest: impl Into<String>,
    ) -> Result<Self, InvalidDigest> {
        let hex_digest = hex_digest.into().to_ascii_lowercase();
        if hex_digest.len() != algorithm.hex_digest_len()
            || !hex_digest.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(InvalidDigest {
                algorithm,
                expected_len: algorithm.hex_digest_len(),
            });
        }
        Ok(Self {
            algorithm,
            hex_digest,
        })
    }

    /// Convenience constructor for the common case.
    pub fn sha256(hex_digest: impl Into<String>) -> Result<Self, InvalidDigest> {
        Self::new(ChecksumAlgorithm::Sha256, hex_digest)
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex digest.
    pub fn hex_digest(&self) -> &str {
        &self.hex_digest
    }

    /// Whether an accumulated digest matches this expectation.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex_digest == actual_hex
    }
}

/// Incremental digest accumulator fed one chunk at a time.
pub struct StreamingDigest {
    state: DigestState,
}

enum DigestState {
    Sha256(Sha256),
}

impl StreamingDigest {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
        };
        Self { state }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match &mut self.state {
            DigestState::Sha256(hasher) => hasher.update(bytes),
        }
    }

    /// Consume the accumulator and return the digest as lowercase hex.
    pub fn finalize_hex(self) -> String {
        match self.state {
            DigestState::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut digest = StreamingDigest::new(ChecksumAlgorithm::Sha256);
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        digest.update(&buf[..n]);
    }
    Ok(digest.finalize_hex())
}
