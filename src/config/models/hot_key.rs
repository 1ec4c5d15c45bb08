//! Hot-key detection and batching configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Configuration for hot-key detection and micro-batching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotKeyConfig {
    /// Master switch for detector and batcher
    #[serde(default)]
    pub enabled: bool,
    /// Memory budget for the Count-Min Sketch, in bytes
    #[serde(default = "default_sketch_memory_bytes")]
    pub sketch_memory_bytes: usize,
    /// Number of sketch rows (independent hash functions)
    #[serde(default = "default_sketch_depth")]
    pub sketch_depth: usize,
    /// Estimated frequency a key must reach to be classified hot
    #[serde(default = "default_hot_threshold")]
    pub threshold: u32,
    /// Cap on the hot set; LRU eviction beyond
    #[serde(default = "default_max_hot_keys")]
    pub max_keys: usize,
    /// Batcher flush tick, in microseconds
    #[serde(default = "default_flush_window_micros")]
    pub flush_window_micros: u64,
    /// Interval between sketch decays, in seconds
    #[serde(default = "default_decay_interval_seconds")]
    pub decay_interval_seconds: u64,
    /// Factor applied to every sketch cell on decay
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f64,
}

impl Default for HotKeyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sketch_memory_bytes: default_sketch_memory_bytes(),
            sketch_depth: default_sketch_depth(),
            threshold: default_hot_threshold(),
            max_keys: default_max_hot_keys(),
            flush_window_micros: default_flush_window_micros(),
            decay_interval_seconds: default_decay_interval_seconds(),
            decay_factor: default_decay_factor(),
        }
    }
}

impl HotKeyConfig {
    /// Validate the hot-key configuration
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(crate::utils::error::Error::Config(format!(
                "hot_key.decay_factor must be in (0, 1), got {}",
                self.decay_factor
            )));
        }
        if self.threshold == 0 {
            return Err(crate::utils::error::Error::Config(
                "hot_key.threshold must be at least 1".to_string(),
            ));
        }
        if self.max_keys == 0 {
            return Err(crate::utils::error::Error::Config(
                "hot_key.max_keys must be at least 1".to_string(),
            ));
        }
        if self.flush_window_micros == 0 {
            return Err(crate::utils::error::Error::Config(
                "hot_key.flush_window_micros must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
