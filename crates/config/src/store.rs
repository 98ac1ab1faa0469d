//! Credential store backend selection

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where issued credentials are persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Process-local store. Credentials are lost on restart.
    Memory,
    /// One directory per credential under `path`
    Filesystem {
        #[serde(default = "default_storage_path")]
        path: PathBuf,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("/var/lib/certsync")
}
