//! The filer store protocol.
//!
//! [`Filer`] composes the digest pipeline, the blob store, and the instance
//! registry into upload, retrieval, and deletion. [`Reconciler`] is the
//! background sweep that removes blobs no instance references any more.
//!
//! # Ordering
//!
//! Within one upload the blob is durable before the instance is
//! registered, so a registry entry never precedes its blob. Blob removal is
//! eventual: deleting an instance only removes its registry entry.

pub mod error;
pub mod filer;
pub mod reconciler;
pub mod retrieval;
pub mod upload;

pub use error::{FilerError, FilerResult};
pub use filer::Filer;
pub use reconciler::{orphaned_digests, spawn_reconciler, Reconciler, SweepReport};
pub use retrieval::Retrieved;
pub use upload::{Stored, UploadFile};

// Re-export key types
pub use filer_store::{BlobStore, StoreOutcome};
pub use filer_registry::InstanceRegistry;
pub use filer_types::{ContentDigest, InstanceId, InstanceMetadata, InstanceRef};
