//! Content-addressed blob storage for filer.
//!
//! Every blob is stored exactly once under the hex encoding of its SHA-256
//! [`ContentDigest`]. Blobs are never modified in place; they are only
//! created (once) and eventually removed by the orphan reconciler.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`FsBlobStore`] -- one flat file per digest under a content root
//! - [`InMemoryBlobStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Blobs are immutable once written (content-addressing guarantees this).
//! 2. Stage-then-link: bytes land in a staging file first and are linked
//!    into place only once the digest is known.
//! 3. Writes are idempotent: committing an existing digest discards the
//!    staged copy and reports [`StoreOutcome::AlreadyExisted`].
//! 4. The store never interprets blob contents.
//! 5. All I/O errors are propagated, never silently ignored.
//!
//! [`ContentDigest`]: filer_types::ContentDigest

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::{BlobReader, BlobStore, BlobWriter, StoreOutcome};
