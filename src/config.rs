//! Node configuration.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::client::NodeType;

/// Tunables fixed at node creation.
///
/// Fields use serde defaults, so a partial (or empty) JSON document
/// yields a fully populated config.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Seconds between polling cycles. Constant per connection; the
    /// loop applies no adaptive backoff.
    #[serde(default = "config_defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Backend dispatch mode.
    #[serde(default)]
    pub node_type: NodeType,
}

mod config_defaults {
    pub fn poll_interval_secs() -> u64 {
        15
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            poll_interval_secs: config_defaults::poll_interval_secs(),
            node_type: NodeType::default(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl NodeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Load the config from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
