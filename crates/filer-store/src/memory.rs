use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use filer_types::ContentDigest;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobReader, BlobStore, BlobWriter, StoreOutcome};

type BlobMap = Arc<RwLock<HashMap<ContentDigest, Bytes>>>;

/// In-memory, HashMap-based blob store.
///
/// Intended for tests and embedding. Staged writes are buffered in the
/// writer and inserted on commit.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: BlobMap,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>> {
        Ok(Box::new(InMemoryBlobWriter {
            blobs: Arc::clone(&self.blobs),
            buf: Vec::new(),
        }))
    }

    async fn exists(&self, digest: &ContentDigest) -> StoreResult<bool> {
        Ok(self.blobs.read().expect("lock poisoned").contains_key(digest))
    }

    async fn delete(&self, digest: &ContentDigest) -> StoreResult<()> {
        let mut map = self.blobs.write().expect("lock poisoned");
        map.remove(digest)
            .map(|_| ())
            .ok_or(StoreError::NotFound(*digest))
    }

    async fn open_for_read(&self, digest: &ContentDigest) -> StoreResult<BlobReader> {
        let data = self
            .blobs
            .read()
            .expect("lock poisoned")
            .get(digest)
            .cloned()
            .ok_or(StoreError::NotFound(*digest))?;
        Ok(BlobReader {
            size: data.len() as u64,
            reader: Box::pin(Cursor::new(data)),
        })
    }

    async fn list_digests(&self) -> StoreResult<Vec<ContentDigest>> {
        let map = self.blobs.read().expect("lock poisoned");
        let mut digests: Vec<ContentDigest> = map.keys().copied().collect();
        digests.sort();
        Ok(digests)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}

struct InMemoryBlobWriter {
    blobs: BlobMap,
    buf: Vec<u8>,
}

#[async_trait]
impl BlobWriter for InMemoryBlobWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> StoreResult<()> {
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buf.len() as u64
    }

    async fn commit(self: Box<Self>, digest: &ContentDigest) -> StoreResult<StoreOutcome> {
        let mut map = self.blobs.write().expect("lock poisoned");
        if map.contains_key(digest) {
            return Ok(StoreOutcome::AlreadyExisted);
        }
        map.insert(*digest, Bytes::from(self.buf));
        Ok(StoreOutcome::Created)
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
