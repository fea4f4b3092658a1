//! Client configuration: optional TOML file with environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ApiConfig;
use crate::error::ClientError;

/// Settings for one client session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL.
    pub base_url: String,
    /// Where the session record is persisted. Defaults to the user config
    /// directory.
    pub credentials_path: Option<PathBuf>,
    /// Page size for history fetches.
    pub history_page_size: u32,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://181.50.68.46:3940".to_string(),
            credentials_path: None,
            history_page_size: 100,
            connect_timeout_secs: 3,
            request_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    /// Default config file location (`<config dir>/arys/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("arys")
            .join("config.toml")
    }

    /// Load from `path` if it exists, fall back to defaults otherwise, then
    /// apply environment overrides (`ARYS_SERVER`).
    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw).map_err(|e| ClientError::Parse {
                context: format!("config file {}", path.display()),
                detail: e.to_string(),
            })?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        if let Ok(server) = std::env::var("ARYS_SERVER") {
            config.base_url = server;
        }
        Ok(config)
    }

    pub fn api_config(&self) -> ApiConfig {
        let mut api = ApiConfig::new(self.base_url.clone());
        api.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        api.request_timeout = Duration::from_secs(self.request_timeout_secs);
        api
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_path
            .clone()
            .unwrap_or_else(crate::auth::FileCredentialStore::default_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.history_page_size, 100);
        assert_eq!(config.api_config().request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ClientConfig::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.base_url, ClientConfig::default().base_url);
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://localhost:3940\"\n").expect("write");
        let config = ClientConfig::load(&path).expect("load");
        assert_eq!(config.base_url, "http://localhost:3940");
        assert_eq!(config.history_page_size, 100);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "base_url = [not toml").expect("write");
        assert!(matches!(
            ClientConfig::load(&path),
            Err(ClientError::Parse { .. })
        ));
    }
}
