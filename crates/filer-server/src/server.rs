use std::future::Future;
use std::sync::Arc;

use filer_core::{spawn_reconciler, Filer};
use filer_registry::RedisRegistry;
use filer_store::FsBlobStore;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Filer HTTP server.
pub struct FilerServer {
    config: ServerConfig,
}

impl FilerServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the content root and connect to the registry.
    pub async fn open_filer(config: &ServerConfig) -> ServerResult<Filer> {
        let blobs = FsBlobStore::open(&config.content_root).await?;
        let registry = RedisRegistry::connect(&config.redis_url, config.key_prefix.clone()).await?;
        Ok(Filer::new(Arc::new(blobs), Arc::new(registry))
            .with_max_upload_bytes(config.max_upload_bytes))
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `signal` resolves, then stop the reconciler.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let filer = Self::open_filer(&self.config).await?;
        self.run(filer, signal).await
    }

    /// Serve an already-built [`Filer`].
    pub async fn run<F>(self, filer: Filer, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "filer server listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let reconciler = spawn_reconciler(
            filer.reconciler(),
            self.config.reconcile_interval(),
            stop_rx,
        );

        let app = build_router(AppState { filer });

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        let _ = stop_tx.send(true);
        if let Err(e) = reconciler.await {
            warn!(error = %e, "reconciler task failed");
        }
        info!("filer server stopped");
        served
    }
}
