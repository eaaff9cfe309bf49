use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use filer_types::ContentDigest;
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobReader, BlobStore, BlobWriter, StoreOutcome};

/// Staging directory name, relative to the content root.
pub const STAGING_DIR: &str = ".staging";

/// Filesystem blob store.
///
/// Layout:
/// ```text
/// <root>/<64 hex chars>      one file per blob
/// <root>/.staging/upload-*   in-flight writes
/// ```
///
/// Staging lives under the root so the final link never crosses a
/// filesystem boundary.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    staging: PathBuf,
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Staging files left behind by a previous process are removed.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let staging = root.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;

        let store = Self { root, staging };
        let purged = store.purge_staging().await?;
        info!(path = %store.root.display(), purged, "opened blob store");
        Ok(store)
    }

    /// The content root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob file for `digest`.
    pub fn blob_path(&self, digest: &ContentDigest) -> PathBuf {
        self.root.join(digest.to_hex())
    }

    async fn purge_staging(&self) -> StoreResult<usize> {
        let mut purged = 0;
        let mut entries = fs::read_dir(&self.staging).await?;
        while let Some(entry) = entries.next_entry().await? {
            match fs::remove_file(entry.path()).await {
                Ok(()) => purged += 1,
                Err(e) => warn!(path = %entry.path().display(), error = %e, "could not purge staging file"),
            }
        }
        Ok(purged)
    }
}

fn not_found_as(digest: &ContentDigest, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(*digest)
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>> {
        let staged = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.staging)?;
        let (file, path) = staged.into_parts();
        debug!(path = %path.display(), "staging upload");
        Ok(Box::new(FsBlobWriter {
            file: fs::File::from_std(file),
            path,
            root: self.root.clone(),
            bytes: 0,
        }))
    }

    async fn exists(&self, digest: &ContentDigest) -> StoreResult<bool> {
        Ok(fs::try_exists(self.blob_path(digest)).await?)
    }

    async fn delete(&self, digest: &ContentDigest) -> StoreResult<()> {
        fs::remove_file(self.blob_path(digest))
            .await
            .map_err(|e| not_found_as(digest, e))?;
        debug!(digest = %digest, "deleted blob");
        Ok(())
    }

    async fn open_for_read(&self, digest: &ContentDigest) -> StoreResult<BlobReader> {
        let file = fs::File::open(self.blob_path(digest))
            .await
            .map_err(|e| not_found_as(digest, e))?;
        let size = file.metadata().await?.len();
        Ok(BlobReader {
            size,
            reader: Box::pin(file),
        })
    }

    async fn list_digests(&self) -> StoreResult<Vec<ContentDigest>> {
        let mut digests = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            // Only the canonical lowercase spelling addresses a blob.
            let name = entry.file_name();
            match name.to_str().map(|s| (s, ContentDigest::from_hex(s))) {
                Some((s, Ok(digest))) if s == digest.to_hex() => digests.push(digest),
                _ => debug!(name = ?name, "skipping non-blob entry"),
            }
        }
        digests.sort();
        Ok(digests)
    }
}

/// Staging writer backed by a temp file under `<root>/.staging`.
///
/// The temp path deletes itself when dropped, which covers both explicit
/// aborts and cancelled uploads.
struct FsBlobWriter {
    file: fs::File,
    path: TempPath,
    root: PathBuf,
    bytes: u64,
}

#[async_trait]
impl BlobWriter for FsBlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> StoreResult<()> {
        self.file.write_all(chunk).await?;
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }

    async fn commit(self: Box<Self>, digest: &ContentDigest) -> StoreResult<StoreOutcome> {
        let FsBlobWriter {
            mut file,
            path,
            root,
            bytes,
        } = *self;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let target = root.join(digest.to_hex());
        let linked = tokio::task::spawn_blocking(move || path.persist_noclobber(&target))
            .await
            .map_err(io::Error::other)?;

        match linked {
            Ok(()) => {
                info!(digest = %digest, bytes, "stored blob");
                Ok(StoreOutcome::Created)
            }
            // The rejected temp path is dropped here, removing the staged copy.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(digest = %digest, "blob already present, discarding staged copy");
                Ok(StoreOutcome::AlreadyExisted)
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        let FsBlobWriter { file, path, .. } = *self;
        drop(file);
        path.close()?;
        Ok(())
    }
}
