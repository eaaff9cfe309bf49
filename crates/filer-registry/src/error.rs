//! Error types for registry operations.

use thiserror::Error;

/// Errors that can occur while talking to the registry backend.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backend could not be reached or rejected the command.
    #[error("registry backend error: {0}")]
    Backend(String),

    /// A stored value could not be encoded or decoded.
    #[error("registry codec error: {0}")]
    Codec(String),
}

/// Convenience type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
