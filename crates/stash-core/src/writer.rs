//! Atomic streaming file writer.
//!
//! Streams a byte source into a `.part` temp file created in the destination
//! directory (same directory so the final publish is a same-filesystem atomic
//! rename, not a cross-device copy), feeding an incremental digest when a
//! checksum is expected. On success the temp file is renamed over the
//! destination; on mismatch or I/O error it is removed best-effort, so no
//! partial or incorrect file is ever visible at the destination.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::checksum::{Checksum, StreamingDigest};
use crate::downloader::ByteStream;
use crate::error::WriteError;

/// Temporary file suffix used before atomic rename. Leftovers from a crash
/// are recognizable by this suffix and can be swept by external maintenance.
pub const TEMP_SUFFIX: &str = ".part";

const CHUNK_SIZE: usize = 64 * 1024;

/// Path for the temp file: appends `.part` to the destination path.
pub fn temp_path(destination: &Path) -> PathBuf {
    let mut o = destination.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Stream `source` to `destination`, validating `checksum` incrementally when
/// present. After a successful return the destination exists and its bytes
/// exactly match the source; after any failure no temp file remains and the
/// destination is untouched.
pub async fn write_atomic(
    mut source: ByteStream,
    destination: &Path,
    checksum: Option<&Checksum>,
) -> Result<(), WriteError> {
    let tmp = temp_path(destination);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(WriteError::Io)?;

    let mut digest = checksum.map(|c| StreamingDigest::new(c.algorithm()));
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                drop(file);
                remove_quietly(&tmp).await;
                return Err(WriteError::Source(e));
            }
        };
        if let Some(d) = digest.as_mut() {
            d.update(&buf[..n]);
        }
        if let Err(e) = file.write_all(&buf[..n]).await {
            drop(file);
            remove_quietly(&tmp).await;
            return Err(WriteError::Io(e));
        }
    }

    if let (Some(expected), Some(d)) = (checksum, digest) {
        let actual = d.finalize_hex();
        if !expected.matches(&actual) {
            drop(file);
            remove_quietly(&tmp).await;
            return Err(WriteError::ChecksumMismatch {
                expected: expected.hex_digest().to_string(),
                actual,
            });
        }
    }

    if let Err(e) = finalize(file, &tmp, destination).await {
        remove_quietly(&tmp).await;
        return Err(WriteError::Io(e));
    }
    Ok(())
}

/// Flush, sync, close, then atomically publish the temp file.
async fn finalize(
    mut file: tokio::fs::File,
    tmp: &Path,
    destination: &Path,
) -> std::io::Result<()> {
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, destination).await
}

async fn remove_quietly(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        tracing::debug!("failed to remove temp file {}: {}", tmp.display(), e);
    }
}
