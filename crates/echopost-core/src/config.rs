//! Runtime configuration for the agent.

use crate::{AgentPaths, CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default base directory, relative to the working directory.
pub const DEFAULT_BASE_DIR: &str = "./.datanadhi";
/// Default remote ingestion server.
pub const DEFAULT_SERVER: &str = "http://data-nadhi-server:5000";
/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Per-call bound for the health check and each delivery.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Sleep after a successful replay pass.
pub const DEFAULT_HEALTHY_CADENCE: Duration = Duration::from_secs(10);
/// Sleep while the remote is unreachable.
pub const DEFAULT_UNHEALTHY_CADENCE: Duration = Duration::from_secs(5);
/// Background flusher period.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
/// Pause between a flush and the emptiness check.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
/// Rows fetched per page while a replay snapshot is walked.
pub const DEFAULT_SNAPSHOT_PAGE_SIZE: usize = 256;

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub base_dir: PathBuf,
    /// Credential sent in the `DATANADHI-API-KEY` header.
    pub api_key: String,
    /// Remote base address, without a trailing slash.
    pub server: String,
    pub log_level: String,
    pub request_timeout: Duration,
    pub healthy_cadence: Duration,
    pub unhealthy_cadence: Duration,
    pub flush_interval: Duration,
    pub settle_delay: Duration,
    pub snapshot_page_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            api_key: String::new(),
            server: DEFAULT_SERVER.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            healthy_cadence: DEFAULT_HEALTHY_CADENCE,
            unhealthy_cadence: DEFAULT_UNHEALTHY_CADENCE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            snapshot_page_size: DEFAULT_SNAPSHOT_PAGE_SIZE,
        }
    }
}

impl AgentConfig {
    /// Create a config for the given startup parameters, with default tunables.
    pub fn new(base_dir: impl Into<PathBuf>, api_key: impl Into<String>, server: &str) -> Self {
        Self {
            base_dir: base_dir.into(),
            api_key: api_key.into(),
            server: normalize_server(server),
            ..Self::default()
        }
    }

    /// Path layout rooted at the configured base directory.
    pub fn paths(&self) -> AgentPaths {
        AgentPaths::with_base_dir(self.base_dir.clone())
    }

    /// Get the remote address as a parsed URL.
    pub fn server_url(&self) -> CoreResult<Url> {
        Url::parse(&self.server).map_err(CoreError::from)
    }

    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        let url = self.server_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::Config(format!(
                "server must be http or https, got {}",
                url.scheme()
            )));
        }

        let durations = [
            ("request_timeout", self.request_timeout),
            ("healthy_cadence", self.healthy_cadence),
            ("unhealthy_cadence", self.unhealthy_cadence),
            ("flush_interval", self.flush_interval),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(CoreError::Config(format!("{name} must be non-zero")));
            }
        }

        if self.snapshot_page_size == 0 {
            return Err(CoreError::Config(
                "snapshot_page_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn normalize_server(server: &str) -> String {
    server.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.healthy_cadence, Duration::from_secs(10));
        assert_eq!(config.unhealthy_cadence, Duration::from_secs(5));
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = AgentConfig::new("/tmp/a", "key", "http://remote:5000/");
        assert_eq!(config.server, "http://remote:5000");
        assert_eq!(config.api_key, "key");
        assert_eq!(config.paths().base_dir(), std::path::Path::new("/tmp/a"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = AgentConfig::new("/tmp/a", "", "not a url");
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let config = AgentConfig::new("/tmp/a", "", "ftp://remote");
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = AgentConfig::default();
        config.flush_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.snapshot_page_size = 0;
        assert!(config.validate().is_err());
    }
}
