//! In-memory instance registry for testing and embedding.
//!
//! [`InMemoryRegistry`] keeps the nested map in a `HashMap` protected by a
//! `RwLock`. Each operation takes the lock once, which makes
//! `conditional_put` atomic.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use filer_types::{ContentDigest, InstanceId, InstanceMetadata};

use crate::error::{RegistryError, RegistryResult};
use crate::traits::{InstanceRegistry, PutOutcome};

type Instances = HashMap<InstanceId, InstanceMetadata>;

/// An in-memory implementation of [`InstanceRegistry`].
///
/// Data is lost when the registry is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    entries: RwLock<HashMap<ContentDigest, Instances>>,
}

impl InMemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of registered instances across all digests.
    pub fn instance_count(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }
}

fn poisoned<T>(e: PoisonError<T>) -> RegistryError {
    RegistryError::Backend(format!("lock poisoned: {e}"))
}

#[async_trait]
impl InstanceRegistry for InMemoryRegistry {
    async fn conditional_put(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
        metadata: &InstanceMetadata,
    ) -> RegistryResult<PutOutcome> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let instances = entries.entry(*digest).or_default();
        if instances.contains_key(instance) {
            return Ok(PutOutcome::AlreadyExists);
        }
        instances.insert(*instance, metadata.clone());
        Ok(PutOutcome::Inserted)
    }

    async fn get(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
    ) -> RegistryResult<Option<InstanceMetadata>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(digest).and_then(|i| i.get(instance)).cloned())
    }

    async fn delete(&self, digest: &ContentDigest, instance: &InstanceId) -> RegistryResult<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let Some(instances) = entries.get_mut(digest) else {
            return Ok(0);
        };
        let removed = instances.remove(instance).is_some();
        // Mirror Redis: a hash with no fields ceases to exist.
        if instances.is_empty() {
            entries.remove(digest);
        }
        Ok(u64::from(removed))
    }

    async fn has_any_instance(&self, digest: &ContentDigest) -> RegistryResult<bool> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(digest).is_some_and(|i| !i.is_empty()))
    }

    async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut digests: Vec<ContentDigest> = entries
            .iter()
            .filter(|(_, i)| !i.is_empty())
            .map(|(d, _)| *d)
            .collect();
        digests.sort();
        Ok(digests)
    }
}
