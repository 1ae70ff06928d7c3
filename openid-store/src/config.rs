//! Store configuration

use openid_core::{Result, DEFAULT_NONCE_WINDOW};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables shared by the stateful backends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Nonces older than this many seconds are treated as consumed
    pub nonce_window_secs: u64,
}

impl StoreConfig {
    pub fn nonce_window(&self) -> Duration {
        Duration::from_secs(self.nonce_window_secs)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            nonce_window_secs: DEFAULT_NONCE_WINDOW.as_secs(),
        }
    }
}
