use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use filer_registry::redis::DEFAULT_PREFIX;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server settings. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory holding one file per stored blob.
    pub content_root: PathBuf,
    pub redis_url: String,
    pub key_prefix: String,
    pub reconcile_interval_secs: u64,
    /// Per-file upload cap in bytes; `0` disables it.
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            content_root: PathBuf::from("files"),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: DEFAULT_PREFIX.to_string(),
            reconcile_interval_secs: 60 * 60,
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Read a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        if config.reconcile_interval_secs == 0 {
            return Err(ServerError::Config(
                "reconcile_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.content_root, PathBuf::from("files"));
        assert_eq!(c.key_prefix, "filer:");
        assert_eq!(c.reconcile_interval(), Duration::from_secs(3600));
        assert_eq!(c.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let c = ServerConfig::from_toml(
            r#"
            content_root = "/var/lib/filer"
            max_upload_bytes = 0
            "#,
        )
        .unwrap();
        assert_eq!(c.content_root, PathBuf::from("/var/lib/filer"));
        assert_eq!(c.max_upload_bytes, 0);
        assert_eq!(c.redis_url, ServerConfig::default().redis_url);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = ServerConfig::from_toml("reconcile_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filer.toml");
        std::fs::write(&path, "bind_addr = \"0.0.0.0:9000\"\n").unwrap();

        let c = ServerConfig::load(&path).unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = ServerConfig::load("/nonexistent/filer.toml").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
