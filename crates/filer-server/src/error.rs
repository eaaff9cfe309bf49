use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use filer_core::FilerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Filer(#[from] FilerError),

    #[error("store error: {0}")]
    Store(#[from] filer_store::StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] filer_registry::RegistryError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Filer(e) => filer_status(e),
            Self::Store(_) | Self::Registry(_) | Self::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status code for a failed store operation.
pub fn filer_status(e: &FilerError) -> StatusCode {
    match e {
        FilerError::EmptyName | FilerError::EmptyContent => StatusCode::BAD_REQUEST,
        FilerError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        FilerError::DuplicateInstance(_) => StatusCode::CONFLICT,
        FilerError::NotFound(_) => StatusCode::NOT_FOUND,
        FilerError::CorruptState(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FilerError::Store(_) | FilerError::Registry(_) | FilerError::Io(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
