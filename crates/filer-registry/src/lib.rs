//! Instance registry for filer.
//!
//! The registry maps `ContentDigest -> (InstanceId -> InstanceMetadata)`.
//! It is an external atomic key-value service accessed through a narrow
//! contract; this crate defines that contract and its adapters.
//!
//! # Modules
//!
//! - [`error`]: Error types for registry operations
//! - [`traits`]: The [`InstanceRegistry`] trait
//! - [`memory`]: In-memory [`InMemoryRegistry`] for tests and embedding
//! - [`redis`]: [`RedisRegistry`], one Redis hash per digest

pub mod error;
pub mod memory;
pub mod redis;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use memory::InMemoryRegistry;
pub use self::redis::RedisRegistry;
pub use traits::{InstanceRegistry, PutOutcome};
