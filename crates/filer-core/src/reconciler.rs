//! Background removal of orphaned blobs.
//!
//! A blob is orphaned when no registry entry references its digest. Deleting
//! an instance never touches blobs, so the reconciler is the only path by
//! which blob storage shrinks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use filer_registry::InstanceRegistry;
use filer_store::{BlobStore, StoreError};
use filer_types::ContentDigest;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::FilerResult;

/// Digests present in `on_disk` but absent from `registered`, in the order
/// they appear in `on_disk`.
pub fn orphaned_digests(
    on_disk: &[ContentDigest],
    registered: &[ContentDigest],
) -> Vec<ContentDigest> {
    let registered: HashSet<&ContentDigest> = registered.iter().collect();
    on_disk
        .iter()
        .filter(|d| !registered.contains(d))
        .copied()
        .collect()
}

/// Outcome of a single sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Blobs found in the store.
    pub scanned: usize,
    /// Orphans removed.
    pub deleted: usize,
    /// Candidates that gained an instance between the scan and the recheck.
    pub spared: usize,
    /// Candidates that could not be checked or removed; retried next sweep.
    pub failed: usize,
}

/// Sweeps a blob store for digests without any registered instance.
#[derive(Clone)]
pub struct Reconciler {
    blobs: Arc<dyn BlobStore>,
    registry: Arc<dyn InstanceRegistry>,
}

impl Reconciler {
    pub fn new(blobs: Arc<dyn BlobStore>, registry: Arc<dyn InstanceRegistry>) -> Self {
        Self { blobs, registry }
    }

    /// Run one pass.
    ///
    /// Listing failures abort the pass. Failures on an individual digest are
    /// logged and counted, and the pass moves on.
    pub async fn sweep(&self) -> FilerResult<SweepReport> {
        let on_disk = self.blobs.list_digests().await?;
        let registered = self.registry.list_registered_digests().await?;
        let candidates = orphaned_digests(&on_disk, &registered);

        let mut report = SweepReport {
            scanned: on_disk.len(),
            ..SweepReport::default()
        };

        for digest in candidates {
            // An upload may have registered this digest after the bulk scan.
            match self.registry.has_any_instance(&digest).await {
                Ok(true) => {
                    debug!(%digest, "orphan candidate gained an instance, keeping");
                    report.spared += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(%digest, error = %e, "could not recheck orphan candidate");
                    report.failed += 1;
                    continue;
                }
            }

            match self.blobs.delete(&digest).await {
                Ok(()) => {
                    debug!(%digest, "removed orphaned blob");
                    report.deleted += 1;
                }
                Err(StoreError::NotFound(_)) => {
                    debug!(%digest, "orphaned blob already gone");
                }
                Err(e) => {
                    warn!(%digest, error = %e, "could not remove orphaned blob");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            deleted = report.deleted,
            spared = report.spared,
            failed = report.failed,
            "reconcile sweep finished"
        );
        Ok(report)
    }

    /// Sweep every `period` until `shutdown` flips to `true` or its sender
    /// is dropped. The first sweep runs immediately.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "reconcile sweep aborted");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reconciler stopped");
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

/// Spawn [`Reconciler::run`] on the current runtime.
pub fn spawn_reconciler(
    reconciler: Reconciler,
    period: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "starting reconciler");
    tokio::spawn(reconciler.run(period, shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use async_trait::async_trait;
    use bytes::Bytes;
    use filer_registry::{InMemoryRegistry, PutOutcome, RegistryError, RegistryResult};
    use filer_store::{BlobReader, BlobWriter, InMemoryBlobStore, StoreResult};
    use filer_types::{InstanceId, InstanceMetadata};
    use futures::stream;

    use crate::Filer;

    fn digests(data: &[&[u8]]) -> Vec<ContentDigest> {
        data.iter().map(|d| ContentDigest::of(d)).collect()
    }

    #[test]
    fn orphans_are_the_set_difference() {
        let on_disk = digests(&[b"a", b"b", b"c"]);
        let registered = digests(&[b"b", b"z"]);
        let orphans = orphaned_digests(&on_disk, &registered);
        assert_eq!(orphans, vec![on_disk[0], on_disk[2]]);
    }

    #[test]
    fn no_orphans_when_everything_is_registered() {
        let on_disk = digests(&[b"a", b"b"]);
        assert!(orphaned_digests(&on_disk, &on_disk).is_empty());
        assert!(orphaned_digests(&[], &on_disk).is_empty());
    }

    fn setup() -> (Filer, InMemoryBlobStore, Arc<InMemoryRegistry>) {
        let blobs = InMemoryBlobStore::new();
        let registry = Arc::new(InMemoryRegistry::new());
        let filer = Filer::new(Arc::new(blobs.clone()), registry.clone());
        (filer, blobs, registry)
    }

    async fn upload(filer: &Filer, name: &str, data: &'static [u8]) -> filer_types::InstanceRef {
        let content = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(data))]);
        filer.store(name, "text/plain", content).await.unwrap().instance
    }

    #[tokio::test]
    async fn sweep_keeps_referenced_and_removes_orphans() {
        let (filer, blobs, _) = setup();
        let kept = upload(&filer, "keep.txt", b"keep").await;
        let dropped = upload(&filer, "drop.txt", b"drop").await;
        filer.delete(&dropped).await.unwrap();

        let report = filer.reconciler().sweep().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                deleted: 1,
                spared: 0,
                failed: 0
            }
        );
        assert!(blobs.exists(&kept.digest).await.unwrap());
        assert!(!blobs.exists(&dropped.digest).await.unwrap());
    }

    #[tokio::test]
    async fn sweep_on_empty_store() {
        let (filer, _, _) = setup();
        let report = filer.reconciler().sweep().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn blob_shared_by_instances_survives_until_last_delete() {
        let (filer, blobs, _) = setup();
        let a = upload(&filer, "a.txt", b"hello").await;
        let b = upload(&filer, "b.txt", b"hello").await;
        let reconciler = filer.reconciler();

        filer.delete(&a).await.unwrap();
        assert_eq!(reconciler.sweep().await.unwrap().deleted, 0);
        assert!(blobs.exists(&b.digest).await.unwrap());

        filer.delete(&b).await.unwrap();
        assert_eq!(reconciler.sweep().await.unwrap().deleted, 1);
        assert!(blobs.is_empty());
    }

    /// Reports nothing in the bulk listing but answers the recheck from the
    /// inner registry, as if an upload registered between the two calls.
    struct LateRegistration(InMemoryRegistry);

    #[async_trait]
    impl InstanceRegistry for LateRegistration {
        async fn conditional_put(
            &self,
            digest: &ContentDigest,
            instance: &InstanceId,
            metadata: &InstanceMetadata,
        ) -> RegistryResult<PutOutcome> {
            self.0.conditional_put(digest, instance, metadata).await
        }

        async fn get(
            &self,
            digest: &ContentDigest,
            instance: &InstanceId,
        ) -> RegistryResult<Option<InstanceMetadata>> {
            self.0.get(digest, instance).await
        }

        async fn delete(&self, digest: &ContentDigest, instance: &InstanceId) -> RegistryResult<u64> {
            self.0.delete(digest, instance).await
        }

        async fn has_any_instance(&self, digest: &ContentDigest) -> RegistryResult<bool> {
            self.0.has_any_instance(digest).await
        }

        async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn recheck_spares_a_freshly_registered_digest() {
        let blobs = InMemoryBlobStore::new();
        let filer = Filer::new(
            Arc::new(blobs.clone()),
            Arc::new(LateRegistration(InMemoryRegistry::new())),
        );
        let r = upload(&filer, "a.txt", b"hello").await;

        let report = filer.reconciler().sweep().await.unwrap();
        assert_eq!(report.spared, 1);
        assert_eq!(report.deleted, 0);
        assert!(blobs.exists(&r.digest).await.unwrap());
    }

    struct Unreachable;

    #[async_trait]
    impl InstanceRegistry for Unreachable {
        async fn conditional_put(
            &self,
            _: &ContentDigest,
            _: &InstanceId,
            _: &InstanceMetadata,
        ) -> RegistryResult<PutOutcome> {
            Err(RegistryError::Backend("down".into()))
        }

        async fn get(
            &self,
            _: &ContentDigest,
            _: &InstanceId,
        ) -> RegistryResult<Option<InstanceMetadata>> {
            Err(RegistryError::Backend("down".into()))
        }

        async fn delete(&self, _: &ContentDigest, _: &InstanceId) -> RegistryResult<u64> {
            Err(RegistryError::Backend("down".into()))
        }

        async fn has_any_instance(&self, _: &ContentDigest) -> RegistryResult<bool> {
            Err(RegistryError::Backend("down".into()))
        }

        async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>> {
            Err(RegistryError::Backend("down".into()))
        }
    }

    #[tokio::test]
    async fn unreachable_registry_aborts_sweep_without_deleting() {
        let blobs = InMemoryBlobStore::new();
        let data = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(b"hello"))]);
        let digest = ContentDigest::of(b"hello");
        blobs.put(&digest, Box::pin(data)).await.unwrap();

        let reconciler = Reconciler::new(Arc::new(blobs.clone()), Arc::new(Unreachable));
        assert!(reconciler.sweep().await.is_err());
        assert!(blobs.exists(&digest).await.unwrap());
    }

    async fn put_blob(blobs: &InMemoryBlobStore, data: &'static [u8]) -> ContentDigest {
        let digest = ContentDigest::of(data);
        let content = stream::iter(vec![Ok::<_, io::Error>(Bytes::from_static(data))]);
        blobs.put(&digest, Box::pin(content)).await.unwrap();
        digest
    }

    /// Blob store whose `delete` fails for one digest.
    struct StuckBlob {
        inner: InMemoryBlobStore,
        stuck: ContentDigest,
    }

    #[async_trait]
    impl BlobStore for StuckBlob {
        async fn begin_write(&self) -> StoreResult<Box<dyn BlobWriter>> {
            self.inner.begin_write().await
        }

        async fn exists(&self, digest: &ContentDigest) -> StoreResult<bool> {
            self.inner.exists(digest).await
        }

        async fn delete(&self, digest: &ContentDigest) -> StoreResult<()> {
            if *digest == self.stuck {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.delete(digest).await
        }

        async fn open_for_read(&self, digest: &ContentDigest) -> StoreResult<BlobReader> {
            self.inner.open_for_read(digest).await
        }

        async fn list_digests(&self) -> StoreResult<Vec<ContentDigest>> {
            self.inner.list_digests().await
        }
    }

    #[tokio::test]
    async fn failed_delete_is_counted_and_sweep_continues() {
        let blobs = InMemoryBlobStore::new();
        let a = put_blob(&blobs, b"one").await;
        let b = put_blob(&blobs, b"two").await;
        let c = put_blob(&blobs, b"three").await;

        let store = StuckBlob {
            inner: blobs.clone(),
            stuck: b,
        };
        let reconciler = Reconciler::new(Arc::new(store), Arc::new(InMemoryRegistry::new()));
        let report = reconciler.sweep().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 3,
                deleted: 2,
                spared: 0,
                failed: 1
            }
        );
        assert!(!blobs.exists(&a).await.unwrap());
        assert!(blobs.exists(&b).await.unwrap());
        assert!(!blobs.exists(&c).await.unwrap());
    }

    /// Registry whose recheck fails for one digest.
    struct FlakyRecheck {
        inner: InMemoryRegistry,
        flaky: ContentDigest,
    }

    #[async_trait]
    impl InstanceRegistry for FlakyRecheck {
        async fn conditional_put(
            &self,
            digest: &ContentDigest,
            instance: &InstanceId,
            metadata: &InstanceMetadata,
        ) -> RegistryResult<PutOutcome> {
            self.inner.conditional_put(digest, instance, metadata).await
        }

        async fn get(
            &self,
            digest: &ContentDigest,
            instance: &InstanceId,
        ) -> RegistryResult<Option<InstanceMetadata>> {
            self.inner.get(digest, instance).await
        }

        async fn delete(&self, digest: &ContentDigest, instance: &InstanceId) -> RegistryResult<u64> {
            self.inner.delete(digest, instance).await
        }

        async fn has_any_instance(&self, digest: &ContentDigest) -> RegistryResult<bool> {
            if *digest == self.flaky {
                return Err(RegistryError::Backend("timeout".into()));
            }
            self.inner.has_any_instance(digest).await
        }

        async fn list_registered_digests(&self) -> RegistryResult<Vec<ContentDigest>> {
            self.inner.list_registered_digests().await
        }
    }

    #[tokio::test]
    async fn failed_recheck_keeps_blob_and_sweep_continues() {
        let blobs = InMemoryBlobStore::new();
        let a = put_blob(&blobs, b"one").await;
        let b = put_blob(&blobs, b"two").await;

        let registry = FlakyRecheck {
            inner: InMemoryRegistry::new(),
            flaky: a,
        };
        let reconciler = Reconciler::new(Arc::new(blobs.clone()), Arc::new(registry));
        let report = reconciler.sweep().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert!(blobs.exists(&a).await.unwrap());
        assert!(!blobs.exists(&b).await.unwrap());
    }

    #[tokio::test]
    async fn run_sweeps_and_stops_on_shutdown() {
        let (filer, blobs, _) = setup();
        let r = upload(&filer, "a.txt", b"hello").await;
        filer.delete(&r).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = spawn_reconciler(filer.reconciler(), Duration::from_millis(10), rx);

        for _ in 0..100 {
            if blobs.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(blobs.is_empty());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
