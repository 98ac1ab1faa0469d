//! Controller settings: resync cadence, concurrency, validation policy.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ControllerConfig {
    /// Seconds between full resync cycles
    #[serde(default = "default_resync_interval_secs")]
    #[validate(range(min = 1, message = "resync interval must be at least one second"))]
    pub resync_interval_secs: u64,

    /// Upper bound on reconciliation passes running at the same time
    #[serde(default = "default_max_concurrent_passes")]
    #[validate(range(min = 1, max = 1024))]
    pub max_concurrent_passes: usize,

    /// Also accept PKCS#8 (`PRIVATE KEY`) RSA keys in stored credentials.
    /// Stored keys are expected to be PKCS#1 otherwise.
    #[serde(default)]
    pub accept_pkcs8_keys: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval_secs(),
            max_concurrent_passes: default_max_concurrent_passes(),
            accept_pkcs8_keys: false,
        }
    }
}

// 5 minutes
fn default_resync_interval_secs() -> u64 {
    300
}

fn default_max_concurrent_passes() -> usize {
    8
}
