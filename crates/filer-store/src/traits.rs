use std::fmt;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use filer_crypto::DigestPipeline;
use filer_types::ContentDigest;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::AsyncRead;

use crate::error::{StoreError, StoreResult};

/// Whether a commit created the blob or found it already present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    AlreadyExisted,
}

/// An open blob: its size and a reader over its bytes.
pub struct BlobReader {
    pub size: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReader").field("size", &self.size).finish()
    }
}

/// A pending write into a staging area.
///
/// Dropping a writer without committing discards the staged bytes.
#[async_trait]
pub trait BlobWriter: Send {
    /// Append one chunk to the staged bytes.
    async fn write_chunk(&mut self, chunk: &[u8]) -> StoreResult<()>;

    /// Number of bytes staged so far.
    fn bytes_written(&self) -> u64;

    /// Durably move the staged bytes into place under `digest`.
    ///
    /// If a blob already exists for `digest` the staged copy is discarded
    /// and [`StoreOutcome::AlreadyExisted`] is returned.
    async fn commit(self: Box<Self>, digest: &ContentDigest) -> StoreResult<StoreOutcome>;

    /// Discard the staged bytes.
    async fn abort(self: Box<Self>) -> StoreResult<()>;
}

/// Write-once, content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - A blob is created at most once per digest; existing bytes are never
///   overwritten.
/// - Concurrent writers of the same digest both observe success.
/// - Addressing is a deterministic function of the hex digest.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a staging writer for bytes whose digest is not yet known.
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>>;

    /// Check whether a blob exists.
    async fn exists(&self, digest: &ContentDigest) -> StoreResult<bool>;

    /// Delete a blob. Fails with [`StoreError::NotFound`] if absent.
    ///
    /// Intended for the orphan reconciler only.
    async fn delete(&self, digest: &ContentDigest) -> StoreResult<()>;

    /// Open a blob for reading. Fails with [`StoreError::NotFound`] if absent.
    async fn open_for_read(&self, digest: &ContentDigest) -> StoreResult<BlobReader>;

    /// Enumerate the digests of every stored blob, sorted.
    async fn list_digests(&self) -> StoreResult<Vec<ContentDigest>>;

    /// Store a byte stream under a known digest.
    ///
    /// Returns immediately with [`StoreOutcome::AlreadyExisted`] when the blob
    /// is present, without reading the stream. Otherwise the stream is staged,
    /// checked against `digest`, and committed.
    async fn put(
        &self,
        digest: &ContentDigest,
        mut stream: BoxStream<'_, io::Result<Bytes>>,
    ) -> StoreResult<StoreOutcome> {
        if self.exists(digest).await? {
            return Ok(StoreOutcome::AlreadyExisted);
        }

        let mut writer = self.begin_write().await?;
        let staged = async {
            let mut pipeline = DigestPipeline::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                pipeline.update(&chunk);
                writer.write_chunk(&chunk).await?;
            }
            let computed = pipeline.finalize().map_err(|_| StoreError::EmptyBlob)?;
            if computed != *digest {
                return Err(StoreError::DigestMismatch {
                    expected: *digest,
                    computed,
                });
            }
            Ok::<(), StoreError>(())
        }
        .await;

        match staged {
            Ok(()) => writer.commit(digest).await,
            Err(e) => {
                let _ = writer.abort().await;
                Err(e)
            }
        }
    }
}
