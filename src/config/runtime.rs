use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Runtime-configurable settings. Changes via PUT /api/admin/config take effect
/// immediately without restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub polling_interval_ms: u64,
}

impl RuntimeConfig {
    pub fn new(polling_interval_ms: u64) -> Self {
        Self { polling_interval_ms }
    }
}

pub type SharedRuntimeConfig = Arc<RwLock<RuntimeConfig>>;

pub fn new_runtime_config(polling_interval_ms: u64) -> SharedRuntimeConfig {
    Arc::new(RwLock::new(RuntimeConfig::new(polling_interval_ms)))
}
