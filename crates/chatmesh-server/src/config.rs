//! Server configuration.
//!
//! Loaded from an optional TOML file; command-line flags override it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chatmesh_core::Limits;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::ipc::DirectoryId;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory to attach to. A new one is created when absent.
    pub directory: Option<DirectoryId>,
    /// File every log line is appended to.
    pub log_file: PathBuf,
    /// Seconds between heartbeat monitor cycles.
    pub heartbeat_secs: u64,
    /// Dispatcher back-off, in milliseconds, after a cycle with no messages.
    pub idle_poll_ms: u64,
    /// Queued messages per kind in each mailbox.
    pub mailbox_capacity: usize,
    /// Capacities used when this instance creates a directory.
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            directory: None,
            log_file: PathBuf::from("chatmesh.log"),
            heartbeat_secs: 2,
            idle_poll_ms: 10,
            mailbox_capacity: chatmesh_core::DEFAULT_CAPACITY,
            limits: Limits::default(),
        }
    }
}

impl ServerConfig {
    /// Read a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(2));
    }

    #[test]
    fn partial_limits_keep_other_defaults() {
        let config = ServerConfig::from_toml(
            r#"
            directory = 1025
            log_file = "/tmp/chat.log"

            [limits]
            max_clients_per_server = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.directory, Some(DirectoryId(1025)));
        assert_eq!(config.log_file, PathBuf::from("/tmp/chat.log"));
        assert_eq!(config.limits.max_clients_per_server, 3);
        assert_eq!(config.limits.max_servers, Limits::default().max_servers);
    }

    #[test]
    fn unknown_types_are_rejected() {
        let err = ServerConfig::from_toml("heartbeat_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ServerConfig::load(Path::new("/nonexistent/chatmesh.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chatmesh.toml"));
    }
}
