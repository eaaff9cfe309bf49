//! Foundation types for filer, a content-addressed file store.
//!
//! Every other filer crate depends on `filer-types`.
//!
//! # Key Types
//!
//! - [`ContentDigest`]: SHA-256 digest of a file's bytes, the blob address
//! - [`InstanceId`]: random identifier of one upload event (UUID v4)
//! - [`InstanceRef`]: composite `(digest, instance)` handle returned to clients
//! - [`InstanceMetadata`]: original filename and declared content type

pub mod digest;
pub mod error;
pub mod instance;

pub use digest::ContentDigest;
pub use error::TypeError;
pub use instance::{InstanceId, InstanceMetadata, InstanceRef};
