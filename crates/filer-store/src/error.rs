use filer_types::ContentDigest;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No blob is stored under the digest.
    #[error("blob not found: {0}")]
    NotFound(ContentDigest),

    /// The bytes handed to `put` do not hash to the digest they were filed under.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        expected: ContentDigest,
        computed: ContentDigest,
    },

    /// Attempted to store a zero-length blob.
    #[error("cannot store an empty blob")]
    EmptyBlob,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
