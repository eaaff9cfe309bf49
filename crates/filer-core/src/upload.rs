use std::io;

use bytes::Bytes;
use filer_crypto::DigestPipeline;
use filer_registry::PutOutcome;
use filer_store::{BlobWriter, StoreOutcome};
use filer_types::{InstanceId, InstanceMetadata, InstanceRef};
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{FilerError, FilerResult};
use crate::filer::Filer;

/// Result of a successful upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stored {
    /// Handle for later retrieval and deletion.
    pub instance: InstanceRef,
    /// Blob size in bytes.
    pub size: u64,
    /// Whether this upload created the blob or reused an existing one.
    pub outcome: StoreOutcome,
}

/// One file of a batch upload.
pub struct UploadFile<S> {
    pub name: String,
    pub content_type: String,
    pub content: S,
}

impl<S> UploadFile<S> {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: S) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }
}

impl Filer {
    /// Store one file.
    ///
    /// 1. Reject a blank `name`.
    /// 2. Hash and stage the stream in a single pass; reject empty content.
    /// 3. Commit the staged bytes under the digest (idempotent).
    /// 4. Register a fresh instance, only after step 3 is durable.
    ///
    /// A failure before step 4 leaves no registry entry and discards the
    /// staged bytes. A failure in step 4 leaves the committed blob in place
    /// for the reconciler.
    pub async fn store<S>(&self, name: &str, content_type: &str, content: S) -> FilerResult<Stored>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut pipeline = DigestPipeline::for_upload(name)?;

        let mut writer = self.blobs.begin_write().await?;
        let staged = self
            .stage(&mut pipeline, &mut *writer, content)
            .await
            .and_then(|()| pipeline.finalize().map_err(FilerError::from));
        let digest = match staged {
            Ok(digest) => digest,
            Err(e) => {
                if let Err(abort) = writer.abort().await {
                    warn!(file = name, error = %abort, "could not discard staged upload");
                }
                return Err(e);
            }
        };
        let size = writer.bytes_written();
        let outcome = writer.commit(&digest).await?;

        let instance = InstanceRef::new(digest, InstanceId::new());
        let metadata = InstanceMetadata::new(name, content_type);
        match self
            .registry
            .conditional_put(&instance.digest, &instance.instance, &metadata)
            .await?
        {
            PutOutcome::Inserted => {}
            PutOutcome::AlreadyExists => return Err(FilerError::DuplicateInstance(instance)),
        }

        info!(
            file = name,
            digest = %instance.digest,
            instance = %instance.instance,
            size,
            outcome = ?outcome,
            "stored file"
        );
        Ok(Stored {
            instance,
            size,
            outcome,
        })
    }

    /// Store several files independently.
    ///
    /// Every file gets its own result; one failure never affects the others.
    pub async fn store_batch<S>(
        &self,
        files: Vec<UploadFile<S>>,
    ) -> Vec<(String, FilerResult<Stored>)>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            let result = self.store(&file.name, &file.content_type, file.content).await;
            if let Err(e) = &result {
                debug!(file = %file.name, error = %e, "batch entry rejected");
            }
            results.push((file.name, result));
        }
        results
    }

    async fn stage<S>(
        &self,
        pipeline: &mut DigestPipeline,
        writer: &mut dyn BlobWriter,
        content: S,
    ) -> FilerResult<()>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        futures::pin_mut!(content);
        while let Some(chunk) = content.next().await {
            let chunk = chunk?;
            pipeline.update(&chunk);
            if let Some(limit) = self.max_upload_bytes {
                if pipeline.bytes_seen() > limit {
                    return Err(FilerError::TooLarge { limit });
                }
            }
            writer.write_chunk(&chunk).await?;
        }
        Ok(())
    }
}
