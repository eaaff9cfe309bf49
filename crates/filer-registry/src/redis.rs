//! Redis-backed instance registry.
//!
//! Layout: one Redis hash per digest.
//!
//! ```text
//! key   = <prefix><64 hex chars>
//! field = <instance uuid>
//! value = {"name": "...", "contentType": "..."}   (JSON)
//! ```
//!
//! Redis removes a hash when its last field is deleted, so `EXISTS key`
//! answers "does any instance reference this digest".

use async_trait::async_trait;
use filer_types::{ContentDigest, InstanceId, InstanceMetadata};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::traits::{InstanceRegistry, PutOutcome};

/// Default key prefix for registry hashes.
pub const DEFAULT_PREFIX: &str = "filer:";

/// [`InstanceRegistry`] over a Redis server.
///
/// Holds a reconnecting [`ConnectionManager`]; cloning the registry shares
/// the underlying connection.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisRegistry {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// `prefix` must not contain glob metacharacters; it is used verbatim in
    /// the `SCAN MATCH` pattern of [`list_registered_digests`](InstanceRegistry::list_registered_digests).
    pub async fn connect(url: &str, prefix: impl Into<String>) -> RegistryResult<Self> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        let prefix = prefix.into();
        info!(url, prefix = %prefix, "connected to registry backend");
        Ok(Self { conn, prefix })
    }

    fn digest_key(&self, digest: &ContentDigest) -> String {
        digest_key(&self.prefix, digest)
    }
}

impl std::fmt::Debug for RedisRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRegistry")
            .field("prefix", &self.prefix)
            .finish()
    }
}

fn backend(e: redis::RedisError) -> RegistryError {
    RegistryError::Backend(e.to_string())
}

/// Hash key for a digest.
pub fn digest_key(prefix: &str, digest: &ContentDigest) -> String {
    format!("{prefix}{}", digest.to_hex())
}

/// Recover the digest from a hash key; `None` for foreign keys.
pub fn digest_from_key(prefix: &str, key: &str) -> Option<ContentDigest> {
    key.strip_prefix(prefix)
        .and_then(|hex| ContentDigest::from_hex(hex).ok())
}

/// Sorted, deduplicated digests from scanned keys. SCAN may return a key
/// more than once.
pub fn digests_from_keys(prefix: &str, keys: impl IntoIterator<Item = String>) -> Vec<ContentDigest> {
    let mut digests: Vec<ContentDigest> = keys
        .into_iter()
        .filter_map(|k| digest_from_key(prefix, &k))
        .collect();
    digests.sort();
    digests.dedup();
    digests
}

/// Encode metadata as the stored hash value.
pub fn encode_metadata(metadata: &InstanceMetadata) -> RegistryResult<String> {
    serde_json::to_string(metadata).map_err(|e| RegistryError::Codec(e.to_string()))
}

/// Decode a stored hash value.
pub fn decode_metadata(raw: &str) -> RegistryResult<InstanceMetadata> {
    serde_json::from_str(raw).map_err(|e| RegistryError::Codec(e.to_string()))
}

#[async_trait]
impl InstanceRegistry for RedisRegistry {
    async fn conditional_put(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
        metadata: &InstanceMetadata,
    ) -> RegistryResult<PutOutcome> {
        let value = encode_metadata(metadata)?;
        let mut conn = self.conn.clone();
        let inserted: bool = conn
            .hset_nx(self.digest_key(digest), instance.to_string(), value)
            .await
            .map_err(backend)?;
        debug!(digest = %digest, instance = %instance, inserted, "HSETNX");
        Ok(if inserted {
            PutOutcome::Inserted
        } else {
            PutOutcome::AlreadyExists
        })
    }

    async fn get(
        &self,
        digest: &ContentDigest,
        instance: &InstanceId,
    ) -> RegistryResult<Option<InstanceMetadata>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .hget(self.digest_key(digest), instance.to_string())
            .await
            .map_err(backend)?;
        raw.as_deref().map(decode_metadata).transpose()
    }

    async fn delete(&self, digest: &ContentDigest, instance: &InstanceId) -> RegistryResult<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn
            .hdel(self.digest_key(digest), instance.to_string())
            .await
            .map_err(backend)?;
        Ok(removed)
    }

    async fn has_any_instance(&self, digest: &ContentDigest) -> RegistryResult<bool> {
        let mut conn = self.conn.clone();
        conn.exists(self.digest_key(digest))
            .await
            .map_err(backend)
    }

    async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(format!("{}*", self.prefix))
            .await
            .map_err(backend)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(digests_from_keys(&self.prefix, keys))
    }
}
