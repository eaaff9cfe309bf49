use filer_store::{BlobReader, StoreError};
use filer_types::{InstanceMetadata, InstanceRef};
use tracing::{error, info};

use crate::error::{FilerError, FilerResult};
use crate::filer::Filer;

/// An instance ready to be streamed back to a client.
#[derive(Debug)]
pub struct Retrieved {
    pub metadata: InstanceMetadata,
    pub blob: BlobReader,
}

impl Filer {
    /// Open an instance for reading.
    ///
    /// Fails with [`FilerError::NotFound`] if the instance is not registered
    /// and with [`FilerError::CorruptState`] if it is registered but its blob
    /// is gone.
    pub async fn retrieve(&self, instance: &InstanceRef) -> FilerResult<Retrieved> {
        let metadata = self
            .registry
            .get(&instance.digest, &instance.instance)
            .await?
            .ok_or(FilerError::NotFound(*instance))?;

        match self.blobs.open_for_read(&instance.digest).await {
            Ok(blob) => Ok(Retrieved { metadata, blob }),
            Err(StoreError::NotFound(_)) => {
                error!(
                    digest = %instance.digest,
                    instance = %instance.instance,
                    "registered instance has no blob; reconciler race or external tampering"
                );
                Err(FilerError::CorruptState(*instance))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove an instance's registry entry.
    ///
    /// The blob is left for the reconciler; other instances may share it.
    pub async fn delete(&self, instance: &InstanceRef) -> FilerResult<()> {
        let removed = self
            .registry
            .delete(&instance.digest, &instance.instance)
            .await?;
        if removed == 0 {
            return Err(FilerError::NotFound(*instance));
        }
        info!(digest = %instance.digest, instance = %instance.instance, "deleted instance");
        Ok(())
    }
}
