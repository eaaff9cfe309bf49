use filer_crypto::DigestError;
use filer_types::InstanceRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilerError {
    #[error("file name is blank")]
    EmptyName,

    #[error("file content is empty")]
    EmptyContent,

    #[error("upload exceeds the {limit} byte limit")]
    TooLarge { limit: u64 },

    #[error("instance already registered: {0}")]
    DuplicateInstance(InstanceRef),

    #[error("instance not found: {0}")]
    NotFound(InstanceRef),

    #[error("instance {0} is registered but its blob is missing")]
    CorruptState(InstanceRef),

    #[error("store error: {0}")]
    Store(#[from] filer_store::StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] filer_registry::RegistryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DigestError> for FilerError {
    fn from(e: DigestError) -> Self {
        match e {
            DigestError::EmptyName => Self::EmptyName,
            DigestError::EmptyContent => Self::EmptyContent,
        }
    }
}

pub type FilerResult<T> = Result<T, FilerError>;
