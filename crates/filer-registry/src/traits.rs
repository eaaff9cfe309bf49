//! The [`InstanceRegistry`] trait defining the registry contract.

use async_trait::async_trait;
use filer_types::{ContentDigest, InstanceId, InstanceMetadata};

use crate::error::RegistryResult;

/// Result of a conditional put.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    AlreadyExists,
}

/// Atomic map from `(digest, instance)` to metadata.
///
/// Implementations must be thread-safe and provide these guarantees:
///
/// - `conditional_put` is atomic: exactly one of several racing callers for
///   the same pair observes [`PutOutcome::Inserted`].
/// - `has_any_instance(d)` is true iff at least one instance is registered
///   under `d`.
/// - No client-side locking is required beyond these primitives.
#[async_trait]
pub trait InstanceRegistry: Send + Sync {
    /// Register `metadata` under `(digest, instance)` unless the pair exists.
    async fn conditional_put(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
        metadata: &InstanceMetadata,
    ) -> RegistryResult<PutOutcome>;

    /// Look up the metadata for one instance.
    async fn get(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
    ) -> RegistryResult<Option<InstanceMetadata>>;

    /// Remove one instance. Returns the number of entries removed (0 or 1).
    async fn delete(&self, digest: &ContentDigest, instance: &InstanceId) -> RegistryResult<u64>;

    /// Whether any instance is registered under `digest`.
    async fn has_any_instance(&self, digest: &ContentDigest) -> RegistryResult<bool>;

    /// Every digest with at least one registered instance.
    async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>>;
}
