use std::sync::Arc;

use filer_registry::InstanceRegistry;
use filer_store::BlobStore;

use crate::reconciler::Reconciler;

/// The store protocol over a blob store and an instance registry.
///
/// All operations take `&self` and hold no locks of their own, so one
/// `Filer` (or clones of it) serves any number of concurrent requests.
#[derive(Clone)]
pub struct Filer {
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) registry: Arc<dyn InstanceRegistry>,
    pub(crate) max_upload_bytes: Option<u64>,
}

impl Filer {
    pub fn new(blobs: Arc<dyn BlobStore>, registry: Arc<dyn InstanceRegistry>) -> Self {
        Self {
            blobs,
            registry,
            max_upload_bytes: None,
        }
    }

    /// Cap the size of a single uploaded file. `0` disables the cap.
    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = (limit > 0).then_some(limit);
        self
    }

    pub fn max_upload_bytes(&self) -> Option<u64> {
        self.max_upload_bytes
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn registry(&self) -> &Arc<dyn InstanceRegistry> {
        &self.registry
    }

    /// A reconciler sweeping the same blob store and registry.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(Arc::clone(&self.blobs), Arc::clone(&self.registry))
    }
}

impl std::fmt::Debug for Filer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filer")
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}
