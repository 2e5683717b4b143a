//! Client configuration
//!
//! Where the query service lives and which headers to forward to it. The configuration
//! is an explicit value handed to each [`QueryClient`](crate::QueryClient); it is read
//! from a JSON file and can be overridden from the command line.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{NetvizError, Result};

/// Default address of a locally running query service
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// User-Agent forwarded to SPARQL endpoints; some (Wikidata) reject requests without one
pub const DEFAULT_USER_AGENT: &str =
    "OpenAnything/1.0 +http://diveintopython.org/http_web_services/";

/// Default filename for the configuration
const CONFIG_FILENAME: &str = "config.json";

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_user_agent() -> Option<String> {
    Some(DEFAULT_USER_AGENT.to_string())
}

fn default_timeout_secs() -> u64 {
    60
}

/// Settings for talking to the query service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `http://127.0.0.1:5000`
    #[serde(default = "default_server")]
    pub server: String,
    /// Value forwarded as `customHttpHeaders.Authorization`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    /// Value forwarded as `customHttpHeaders.User-Agent`
    #[serde(default = "default_user_agent")]
    pub user_agent: Option<String>,
    /// Request timeout; the service runs SPARQL queries so this is generous
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            authorization: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Configuration pointing at `server` with every other field defaulted
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Platform location of the configuration file, e.g. `~/.config/netviz/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            NetvizError::Config("could not determine configuration directory".to_string())
        })?;
        Ok(config_dir.join("netviz").join(CONFIG_FILENAME))
    }

    /// Load the configuration from `path`, falling back to defaults if the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("no configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        log::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply command-line overrides; empty strings are ignored like blank form fields
    pub fn merge_overrides(&mut self, server: Option<String>, authorization: Option<String>) {
        if let Some(server) = server.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            self.server = server;
        }
        if let Some(auth) = authorization
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
        {
            self.authorization = Some(auth);
        }
    }

    /// Parsed server URL; only `http` and `https` are accepted
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(self.server.trim())
            .map_err(|e| NetvizError::InvalidServer(format!("{}: {}", self.server, e)))?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(NetvizError::InvalidServer(format!(
                "{}: unsupported scheme '{}'",
                self.server, other
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.server_url()?;
        if self.timeout_secs == 0 {
            return Err(NetvizError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.server, "http://127.0.0.1:5000");
        assert_eq!(config.authorization, None);
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ClientConfig::load_or_default(dir.path().join("absent.json")).unwrap();

        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = ClientConfig::with_server("https://sparql-network.demo.seco.cs.aalto.fi");
        config.authorization = Some("Bearer abc".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = ClientConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server": "http://localhost:8080"}"#).unwrap();

        let config = ClientConfig::load_or_default(&path).unwrap();
        assert_eq!(config.server, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.user_agent.as_deref(), Some(DEFAULT_USER_AGENT));
    }

    #[test]
    fn test_invalid_file_server_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server": "not a url"}"#).unwrap();

        assert!(matches!(
            ClientConfig::load_or_default(&path),
            Err(NetvizError::InvalidServer(_))
        ));
    }

    #[test]
    fn test_merge_overrides_ignores_blank_values() {
        let mut config = ClientConfig::default();
        config.merge_overrides(Some("  ".to_string()), Some(" token ".to_string()));

        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.authorization.as_deref(), Some("token"));

        config.merge_overrides(Some("http://example.org".to_string()), None);
        assert_eq!(config.server, "http://example.org");
        assert_eq!(config.authorization.as_deref(), Some("token"));
    }

    #[test]
    fn test_server_scheme_is_checked() {
        assert!(ClientConfig::with_server("ftp://example.org").server_url().is_err());
        assert!(ClientConfig::with_server("https://example.org").server_url().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = ClientConfig::default();
        config.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(NetvizError::Config(_))));
    }
}
