use filer_types::ContentDigest;
use sha2::{Digest, Sha256};

/// Incremental SHA-256 digest over a chunked byte stream.
///
/// Chunks are folded into the running hash state as they arrive, so memory
/// use is independent of the total content length. The digest is only
/// exposed by [`finalize`](Self::finalize), which consumes the pipeline.
#[derive(Clone, Debug)]
pub struct DigestPipeline {
    hasher: Sha256,
    bytes: u64,
}

impl DigestPipeline {
    /// Start a pipeline with no validation.
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            bytes: 0,
        }
    }

    /// Start a pipeline for an upload, rejecting blank filenames.
    pub fn for_upload(filename: &str) -> Result<Self, DigestError> {
        validate_filename(filename)?;
        Ok(Self::new())
    }

    /// Fold one chunk into the running digest.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Total number of bytes observed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes
    }

    /// Finish the stream and produce its digest.
    ///
    /// Zero-byte streams are rejected with [`DigestError::EmptyContent`].
    pub fn finalize(self) -> Result<ContentDigest, DigestError> {
        if self.bytes == 0 {
            return Err(DigestError::EmptyContent);
        }
        Ok(ContentDigest::from_hash(self.hasher.finalize().into()))
    }
}

impl Default for DigestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject filenames that are empty or whitespace-only.
pub fn validate_filename(filename: &str) -> Result<(), DigestError> {
    if filename.trim().is_empty() {
        return Err(DigestError::EmptyName);
    }
    Ok(())
}

/// Errors from the digest pipeline.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    #[error("file name is blank")]
    EmptyName,

    #[error("file content is empty")]
    EmptyContent,
}
