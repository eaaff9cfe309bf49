use std::collections::BTreeMap;
use std::io;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use filer_core::{Filer, InstanceRef};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::{ServerError, ServerResult};

/// Content type recorded for parts that do not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Rejection reason for a repeated file name within one request.
pub const DUPLICATE_NAME: &str = "duplicate file name in request";

#[derive(Clone)]
pub struct AppState {
    pub filer: Filer,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Result of a multipart upload, keyed by client file name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// File name to `<digest>/<instance>`.
    pub stored: BTreeMap<String, String>,
    /// File name to the reason it was not stored.
    pub rejected: BTreeMap<String, String>,
    /// Set when the multipart body was malformed; parts after the error
    /// were not read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    fn has_seen(&self, name: &str) -> bool {
        self.stored.contains_key(name) || self.rejected.contains_key(name)
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Store every file part of a multipart body.
///
/// Parts are stored one at a time as they arrive. A failing part lands in
/// `rejected` and does not affect the others. Only the first part with a
/// given file name is stored, so every registered instance is reported.
/// A malformed body ends the loop but keeps what was already stored.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Json<UploadResponse> {
    let mut response = UploadResponse::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, stored = response.stored.len(), "malformed multipart body");
                response.error = Some(e.to_string());
                break;
            }
        };

        let Some(name) = field.file_name().map(str::to_owned) else {
            debug!(field = ?field.name(), "skipping non-file part");
            continue;
        };
        if response.has_seen(&name) {
            debug!(file = %name, "duplicate file name in request");
            response
                .rejected
                .entry(name)
                .or_insert_with(|| DUPLICATE_NAME.to_string());
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_owned();

        let content = field.map_err(io::Error::other);
        match state.filer.store(&name, &content_type, content).await {
            Ok(stored) => {
                response.stored.insert(name, stored.instance.to_string());
            }
            Err(e) => {
                response.rejected.insert(name, e.to_string());
            }
        }
    }

    Json(response)
}

pub async fn retrieve_handler(
    State(state): State<AppState>,
    Path((digest, instance)): Path<(String, String)>,
) -> ServerResult<Response> {
    let instance = parse_ref(&digest, &instance)?;
    let retrieved = state.filer.retrieve(&instance).await?;

    let content_type = HeaderValue::from_str(&retrieved.metadata.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    let disposition = content_disposition(&retrieved.metadata.name);
    let body = Body::from_stream(ReaderStream::new(retrieved.blob.reader));

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(retrieved.blob.size)),
        ],
        body,
    )
        .into_response())
}

pub async fn delete_handler(
    State(state): State<AppState>,
    Path((digest, instance)): Path<(String, String)>,
) -> ServerResult<StatusCode> {
    let instance = parse_ref(&digest, &instance)?;
    state.filer.delete(&instance).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_ref(digest: &str, instance: &str) -> ServerResult<InstanceRef> {
    InstanceRef::from_parts(digest, instance).map_err(|e| ServerError::BadRequest(e.to_string()))
}

/// `attachment; filename="..."` with the name reduced to printable ASCII.
fn content_disposition(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
