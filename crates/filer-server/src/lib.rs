//! HTTP server for filer.
//!
//! Exposes upload, download, and deletion of file instances over HTTP and
//! runs the orphan reconciler alongside the listener.
//!
//! | Method   | Path                    | Result                                |
//! |----------|-------------------------|---------------------------------------|
//! | `POST`   | `/`                     | multipart upload, `{stored, rejected}` |
//! | `GET`    | `/{digest}/{instance}`  | streamed file body                    |
//! | `DELETE` | `/{digest}/{instance}`  | `204`, or `404` if unknown            |
//! | `GET`    | `/health`               | `{"status": "ok"}`                    |

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, HealthResponse, UploadResponse, DUPLICATE_NAME};
pub use router::build_router;
pub use server::FilerServer;
