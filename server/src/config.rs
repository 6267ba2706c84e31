//! Server settings read from a JSON file. Every field has a default, so a partial file or no
//! file at all is fine.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// The settings of the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Where the server listens, `host:port`.
    pub bind_address: String,
    /// A session without any event for this long gets shut down.
    pub idle_timeout_secs: u64,
    /// How often the watchdog sweeps rooms whose session task is gone.
    pub watchdog_interval_secs: u64,
    /// Upper bound for concurrently open rooms.
    pub max_rooms: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 300,
            watchdog_interval_secs: 1200,
            max_rooms: 64,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs.max(1))
    }
}

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[display("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads and parses the config file.
pub async fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let json_content = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&json_content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load_config`], but a missing file yields the defaults.
pub async fn load_or_default(path: &Path) -> Result<ServerConfig, ConfigError> {
    match load_config(path).await {
        Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "No config file found, using defaults.");
            Ok(ServerConfig::default())
        }
        other => other,
    }
}
